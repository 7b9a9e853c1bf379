//! In-memory network security groups

use crate::client::{NetworkSecurityGroup, NsgApi, SecurityRule, NOT_FOUND};
use async_trait::async_trait;
use peering_core::{Fault, FaultInjector, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NsgOperation {
    GetSecurityGroup,
    CreateOrUpdateRule,
    DeleteRule,
}

/// (resource group, security group name)
type Key = (String, String);

fn key(resource_group: &str, group_name: &str) -> Key {
    (resource_group.to_string(), group_name.to_string())
}

fn group_not_found(group_name: &str) -> TransportError {
    TransportError::with_code(
        NOT_FOUND,
        format!("The Resource 'Microsoft.Network/networkSecurityGroups/{}' was not found", group_name),
    )
}

#[derive(Clone, Debug, Default)]
pub struct NsgSandbox {
    groups: Arc<RwLock<HashMap<Key, Vec<SecurityRule>>>>,
}

impl NsgSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> SandboxNsgClient {
        SandboxNsgClient {
            groups: self.groups.clone(),
            faults: FaultInjector::new(),
        }
    }

    /// Provision `<infra_id>-nsg` in resource group `<infra_id>-rg`
    pub async fn add_security_group(&self, infra_id: &str) {
        self.groups
            .write()
            .await
            .entry(key(&format!("{}-rg", infra_id), &format!("{}-nsg", infra_id)))
            .or_default();
    }

    pub async fn add_rule(&self, resource_group: &str, group_name: &str, rule: SecurityRule) {
        self.groups
            .write()
            .await
            .entry(key(resource_group, group_name))
            .or_default()
            .push(rule);
    }

    pub async fn rules(&self, resource_group: &str, group_name: &str) -> Vec<SecurityRule> {
        self.groups
            .read()
            .await
            .get(&key(resource_group, group_name))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct SandboxNsgClient {
    groups: Arc<RwLock<HashMap<Key, Vec<SecurityRule>>>>,
    faults: FaultInjector<NsgOperation>,
}

impl SandboxNsgClient {
    pub fn inject(&self, op: NsgOperation, fault: Fault) {
        self.faults.inject(op, fault);
    }

    pub fn calls(&self) -> Vec<NsgOperation> {
        self.faults.calls()
    }
}

#[async_trait]
impl NsgApi for SandboxNsgClient {
    async fn get_security_group(
        &self,
        resource_group: &str,
        group_name: &str,
    ) -> Result<NetworkSecurityGroup, TransportError> {
        self.faults.check(NsgOperation::GetSecurityGroup)?;
        let groups = self.groups.read().await;

        let rules = groups
            .get(&key(resource_group, group_name))
            .ok_or_else(|| group_not_found(group_name))?;
        Ok(NetworkSecurityGroup {
            name: group_name.to_string(),
            rules: rules.clone(),
        })
    }

    async fn create_or_update_rule(
        &self,
        resource_group: &str,
        group_name: &str,
        rule: &SecurityRule,
    ) -> Result<(), TransportError> {
        self.faults.check(NsgOperation::CreateOrUpdateRule)?;
        let mut groups = self.groups.write().await;

        let rules = groups
            .get_mut(&key(resource_group, group_name))
            .ok_or_else(|| group_not_found(group_name))?;

        if let Some(conflict) = rules.iter().find(|existing| {
            existing.name != rule.name && existing.direction == rule.direction && existing.priority == rule.priority
        }) {
            return Err(TransportError::with_code(
                "SecurityRuleConflict",
                format!(
                    "Rule {} has the same priority {} as rule {}",
                    rule.name, rule.priority, conflict.name
                ),
            ));
        }

        match rules.iter_mut().find(|existing| existing.name == rule.name) {
            Some(existing) => *existing = rule.clone(),
            None => rules.push(rule.clone()),
        }
        Ok(())
    }

    async fn delete_rule(&self, resource_group: &str, group_name: &str, rule_name: &str) -> Result<(), TransportError> {
        self.faults.check(NsgOperation::DeleteRule)?;
        let mut groups = self.groups.write().await;

        let rules = groups
            .get_mut(&key(resource_group, group_name))
            .ok_or_else(|| group_not_found(group_name))?;
        let before = rules.len();
        rules.retain(|rule| rule.name != rule_name);
        if rules.len() == before {
            return Err(TransportError::with_code(
                NOT_FOUND,
                format!("Security rule {} was not found", rule_name),
            ));
        }
        Ok(())
    }
}
