use serde::{Deserialize, Serialize};

/// VPC looked up for one operation; never cached because the remote
/// network can change between calls
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVpc {
    pub vpc_id: String,
    pub cidr_block: String,
}

/// One side of a peering connection as reported by the provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcInfo {
    pub vpc_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Lifecycle state of a peering connection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeeringState {
    #[default]
    PendingAcceptance,
    Provisioning,
    Active,
    Deleting,
    Deleted,
    Rejected,
    Failed,
    Expired,
}

impl PeeringState {
    /// Whether the connection still exists from the caller's point of view
    pub fn is_live(&self) -> bool {
        !matches!(
            self,
            PeeringState::Deleted | PeeringState::Rejected | PeeringState::Failed | PeeringState::Expired
        )
    }
}

/// Provider-owned peering connection between a requester and an accepter VPC
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringConnection {
    pub connection_id: String,
    pub requester: VpcInfo,
    pub accepter: VpcInfo,
    #[serde(default)]
    pub state: PeeringState,
}

/// Route table attached to a VPC
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    pub route_table_id: String,
    pub vpc_id: String,
    /// Whether this is the VPC's main route table
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Route from a destination CIDR to a peering connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub destination_cidr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering_connection_id: Option<String>,
}

/// Name tag of the peering connection between two infrastructures
pub fn peering_name(requester_infra_id: &str, target_infra_id: &str) -> String {
    format!("{}-{}", requester_infra_id, target_infra_id)
}
