//! Network security group operations consumed by the Azure backend

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use peering_api::Protocol;
use peering_core::TransportError;

/// Error code returned for missing resources
pub const NOT_FOUND: &str = "NotFound";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RuleDirection {
    Inbound,
    Outbound,
}

impl RuleDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleDirection::Inbound => "Inbound",
            RuleDirection::Outbound => "Outbound",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityRule {
    pub name: String,
    pub direction: RuleDirection,
    pub protocol: Protocol,
    pub priority: u32,
    pub source_address_prefix: String,
    pub destination_address_prefix: String,
    pub destination_port_range: String,
    pub allow: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkSecurityGroup {
    pub name: String,
    pub rules: Vec<SecurityRule>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait NsgApi: Send + Sync {
    async fn get_security_group(
        &self,
        resource_group: &str,
        group_name: &str,
    ) -> Result<NetworkSecurityGroup, TransportError>;

    async fn create_or_update_rule(
        &self,
        resource_group: &str,
        group_name: &str,
        rule: &SecurityRule,
    ) -> Result<(), TransportError>;

    async fn delete_rule(&self, resource_group: &str, group_name: &str, rule_name: &str) -> Result<(), TransportError>;
}
