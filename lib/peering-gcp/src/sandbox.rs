//! In-memory Compute Engine networks and firewall rules

use crate::client::{
    AddPeeringRequest, ComputeApi, Firewall, NetworkPeering, NetworkPeeringState, ALREADY_EXISTS, NOT_FOUND,
};
use async_trait::async_trait;
use peering_core::{Fault, FaultInjector, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputeOperation {
    GetFirewallRule,
    InsertFirewallRule,
    UpdateFirewallRule,
    DeleteFirewallRule,
    AddPeering,
    RemovePeering,
}

/// (project, resource name)
type Key = (String, String);

fn key(project_id: &str, name: &str) -> Key {
    (project_id.to_string(), name.to_string())
}

#[derive(Debug, Default)]
struct World {
    networks: HashMap<Key, Vec<NetworkPeering>>,
    firewalls: HashMap<Key, Firewall>,
}

fn not_found(what: &str, name: &str) -> TransportError {
    TransportError::with_code(NOT_FOUND, format!("The resource '{}' {} was not found", name, what))
}

/// Split `projects/<project>/global/networks/<name>`
fn parse_network_url(url: &str) -> Option<Key> {
    let mut parts = url.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("projects"), Some(project), Some("global"), Some("networks"), Some(name), None) => {
            Some(key(project, name))
        }
        _ => None,
    }
}

#[derive(Clone, Debug, Default)]
pub struct ComputeSandbox {
    world: Arc<RwLock<World>>,
}

impl ComputeSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> SandboxComputeClient {
        SandboxComputeClient {
            world: self.world.clone(),
            faults: FaultInjector::new(),
        }
    }

    /// Provision the `<infra_id>-network` network in `project_id`
    pub async fn add_network(&self, project_id: &str, infra_id: &str) {
        let name = format!("{}-network", infra_id);
        debug!(project = %project_id, network = %name, "Sandbox network added");
        self.world
            .write()
            .await
            .networks
            .entry(key(project_id, &name))
            .or_default();
    }

    pub async fn peerings(&self, project_id: &str, network: &str) -> Vec<NetworkPeering> {
        self.world
            .read()
            .await
            .networks
            .get(&key(project_id, network))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn firewall_rule(&self, project_id: &str, name: &str) -> Option<Firewall> {
        self.world.read().await.firewalls.get(&key(project_id, name)).cloned()
    }
}

/// Compute client of a [`ComputeSandbox`]; one client may act on every project
#[derive(Clone, Debug)]
pub struct SandboxComputeClient {
    world: Arc<RwLock<World>>,
    faults: FaultInjector<ComputeOperation>,
}

impl SandboxComputeClient {
    pub fn inject(&self, op: ComputeOperation, fault: Fault) {
        self.faults.inject(op, fault);
    }

    pub fn calls(&self) -> Vec<ComputeOperation> {
        self.faults.calls()
    }

    pub fn count(&self, op: ComputeOperation) -> usize {
        self.faults.count(op)
    }
}

#[async_trait]
impl ComputeApi for SandboxComputeClient {
    async fn get_firewall_rule(&self, project_id: &str, name: &str) -> Result<Firewall, TransportError> {
        self.faults.check(ComputeOperation::GetFirewallRule)?;
        self.world
            .read()
            .await
            .firewalls
            .get(&key(project_id, name))
            .cloned()
            .ok_or_else(|| not_found("firewall", name))
    }

    async fn insert_firewall_rule(&self, project_id: &str, rule: &Firewall) -> Result<(), TransportError> {
        self.faults.check(ComputeOperation::InsertFirewallRule)?;
        let mut world = self.world.write().await;

        let rule_key = key(project_id, &rule.name);
        if world.firewalls.contains_key(&rule_key) {
            return Err(TransportError::with_code(
                ALREADY_EXISTS,
                format!("The resource '{}' already exists", rule.name),
            ));
        }
        world.firewalls.insert(rule_key, rule.clone());
        Ok(())
    }

    async fn update_firewall_rule(&self, project_id: &str, name: &str, rule: &Firewall) -> Result<(), TransportError> {
        self.faults.check(ComputeOperation::UpdateFirewallRule)?;
        let mut world = self.world.write().await;

        let existing = world
            .firewalls
            .get_mut(&key(project_id, name))
            .ok_or_else(|| not_found("firewall", name))?;
        *existing = rule.clone();
        Ok(())
    }

    async fn delete_firewall_rule(&self, project_id: &str, name: &str) -> Result<(), TransportError> {
        self.faults.check(ComputeOperation::DeleteFirewallRule)?;
        self.world
            .write()
            .await
            .firewalls
            .remove(&key(project_id, name))
            .map(|_| ())
            .ok_or_else(|| not_found("firewall", name))
    }

    async fn add_peering(
        &self,
        project_id: &str,
        network: &str,
        request: &AddPeeringRequest,
    ) -> Result<(), TransportError> {
        self.faults.check(ComputeOperation::AddPeering)?;
        let mut world = self.world.write().await;

        let own_key = key(project_id, network);
        let own_url = format!("projects/{}/global/networks/{}", project_id, network);
        let peer_key = parse_network_url(&request.peer_network)
            .filter(|peer| world.networks.contains_key(peer))
            .ok_or_else(|| not_found("network", &request.peer_network))?;

        let peerings = world
            .networks
            .get(&own_key)
            .ok_or_else(|| not_found("network", network))?;
        if peerings
            .iter()
            .any(|p| p.name == request.name || p.peer_network == request.peer_network)
        {
            return Err(TransportError::with_code(
                ALREADY_EXISTS,
                format!("There is already a peering {} on network {}", request.name, network),
            ));
        }

        // The peering becomes active once the other network points back
        let mut state = NetworkPeeringState::Inactive;
        if let Some(back) = world
            .networks
            .get_mut(&peer_key)
            .and_then(|peerings| peerings.iter_mut().find(|p| p.peer_network == own_url))
        {
            back.state = NetworkPeeringState::Active;
            state = NetworkPeeringState::Active;
        }

        if let Some(peerings) = world.networks.get_mut(&own_key) {
            peerings.push(NetworkPeering {
                name: request.name.clone(),
                peer_network: request.peer_network.clone(),
                state,
                auto_create_routes: request.auto_create_routes,
            });
        }
        Ok(())
    }

    async fn remove_peering(&self, project_id: &str, network: &str, peering: &str) -> Result<(), TransportError> {
        self.faults.check(ComputeOperation::RemovePeering)?;
        let mut world = self.world.write().await;

        let own_url = format!("projects/{}/global/networks/{}", project_id, network);
        let peerings = world
            .networks
            .get_mut(&key(project_id, network))
            .ok_or_else(|| not_found("network", network))?;
        let index = peerings
            .iter()
            .position(|p| p.name == peering)
            .ok_or_else(|| not_found("peering", peering))?;
        let removed = peerings.remove(index);

        if let Some(peer) = parse_network_url(&removed.peer_network) {
            if let Some(back) = world
                .networks
                .get_mut(&peer)
                .and_then(|peerings| peerings.iter_mut().find(|p| p.peer_network == own_url))
            {
                back.state = NetworkPeeringState::Inactive;
            }
        }
        Ok(())
    }
}
