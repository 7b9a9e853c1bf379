//! Compute Engine operations consumed by the GCP backend

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use peering_api::Protocol;
use peering_core::TransportError;

/// Error code returned for missing resources
pub const NOT_FOUND: &str = "notFound";
/// Error code returned when creating a resource that already exists
pub const ALREADY_EXISTS: &str = "alreadyExists";

/// Traffic direction of a firewall rule; only ingress rules are managed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ingress,
}

/// Protocol and ports allowed by a firewall rule
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedPorts {
    pub protocol: Protocol,
    pub ports: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Firewall {
    pub name: String,
    /// Partial network URL, `projects/<project>/global/networks/<name>`
    pub network: String,
    pub direction: Direction,
    pub source_tags: Vec<String>,
    pub target_tags: Vec<String>,
    pub allowed: Vec<AllowedPorts>,
}

/// Input of `networks.addPeering`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddPeeringRequest {
    pub name: String,
    pub peer_network: String,
    pub auto_create_routes: bool,
    /// Left unset: the API rejects the request when these are combined
    /// with `auto_create_routes`
    pub import_custom_routes: Option<bool>,
    pub export_custom_routes: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkPeeringState {
    /// Only one side has been peered so far
    Inactive,
    Active,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkPeering {
    pub name: String,
    pub peer_network: String,
    pub state: NetworkPeeringState,
    pub auto_create_routes: bool,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_firewall_rule(&self, project_id: &str, name: &str) -> Result<Firewall, TransportError>;

    async fn insert_firewall_rule(&self, project_id: &str, rule: &Firewall) -> Result<(), TransportError>;

    async fn update_firewall_rule(&self, project_id: &str, name: &str, rule: &Firewall) -> Result<(), TransportError>;

    async fn delete_firewall_rule(&self, project_id: &str, name: &str) -> Result<(), TransportError>;

    /// Add a peering on `network` (a bare network name) of `project_id`
    async fn add_peering(
        &self,
        project_id: &str,
        network: &str,
        request: &AddPeeringRequest,
    ) -> Result<(), TransportError>;

    async fn remove_peering(&self, project_id: &str, network: &str, peering: &str) -> Result<(), TransportError>;
}
