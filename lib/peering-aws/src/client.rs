//! EC2 operations consumed by the AWS backend
//!
//! Client construction and authentication live with the caller; this crate
//! only needs something that implements [`Ec2Api`] for each side.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use peering_api::{PeeringConnection, Protocol, RouteTable};
use peering_core::TransportError;

/// Returned when an identical ingress permission already exists
pub const DUPLICATE_PERMISSION: &str = "InvalidPermission.Duplicate";
/// Returned when revoking an ingress permission that does not exist
pub const PERMISSION_NOT_FOUND: &str = "InvalidPermission.NotFound";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vpc {
    pub vpc_id: String,
    pub cidr_block: Option<String>,
    pub tags: Vec<Tag>,
}

/// Input of `CreateVpcPeeringConnection`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatePeeringRequest {
    pub vpc_id: String,
    pub peer_vpc_id: String,
    pub peer_region: String,
    pub peer_owner_id: Option<String>,
    pub tags: Vec<Tag>,
}

/// Requester/accepter pair used to look up peering connections
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeeringFilter {
    pub requester_vpc_id: String,
    pub accepter_vpc_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub vpc_id: String,
}

/// Ingress rule allowing traffic from members of a security group
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngressPermission {
    pub protocol: Protocol,
    pub port: u16,
    pub source_group_id: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// VPCs carrying the given `Name` tag
    async fn describe_vpcs(&self, name_tag: &str) -> Result<Vec<Vpc>, TransportError>;

    async fn create_vpc_peering_connection(
        &self,
        request: &CreatePeeringRequest,
    ) -> Result<PeeringConnection, TransportError>;

    async fn accept_vpc_peering_connection(&self, connection_id: &str) -> Result<(), TransportError>;

    /// Route tables associated as main table of the VPC
    async fn describe_route_tables(&self, vpc_id: &str) -> Result<Vec<RouteTable>, TransportError>;

    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        connection_id: &str,
    ) -> Result<(), TransportError>;

    async fn delete_route(&self, route_table_id: &str, destination_cidr: &str) -> Result<(), TransportError>;

    async fn describe_vpc_peering_connections(
        &self,
        filter: &PeeringFilter,
    ) -> Result<Vec<PeeringConnection>, TransportError>;

    async fn delete_vpc_peering_connection(&self, connection_id: &str) -> Result<(), TransportError>;

    async fn describe_security_groups(
        &self,
        vpc_id: &str,
        group_name: &str,
    ) -> Result<Vec<SecurityGroup>, TransportError>;

    async fn authorize_security_group_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<(), TransportError>;

    async fn revoke_security_group_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<(), TransportError>;
}
