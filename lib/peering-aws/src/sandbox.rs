//! In-memory EC2 with per-region clients
//!
//! Mirrors the EC2 behaviors the peering flow depends on: a peering can only
//! be accepted from the accepter's region, a route to the same target can be
//! created twice, and deleted connections stay visible in a `deleted` state.

use crate::client::{
    CreatePeeringRequest, Ec2Api, IngressPermission, PeeringFilter, SecurityGroup, Tag, Vpc,
    DUPLICATE_PERMISSION, PERMISSION_NOT_FOUND,
};
use async_trait::async_trait;
use peering_api::{PeeringConnection, PeeringState, Route, RouteTable, VpcInfo};
use peering_core::{Fault, FaultInjector, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// EC2 operations, for call logs and fault injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ec2Operation {
    DescribeVpcs,
    CreateVpcPeeringConnection,
    AcceptVpcPeeringConnection,
    DescribeRouteTables,
    CreateRoute,
    DeleteRoute,
    DescribeVpcPeeringConnections,
    DeleteVpcPeeringConnection,
    DescribeSecurityGroups,
    AuthorizeSecurityGroupIngress,
    RevokeSecurityGroupIngress,
}

impl Ec2Operation {
    /// Whether the operation changes remote state
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Ec2Operation::DescribeVpcs
                | Ec2Operation::DescribeRouteTables
                | Ec2Operation::DescribeVpcPeeringConnections
                | Ec2Operation::DescribeSecurityGroups
        )
    }
}

#[derive(Clone, Debug)]
struct VpcRecord {
    region: String,
    vpc: Vpc,
}

#[derive(Clone, Debug)]
struct PeeringRecord {
    connection: PeeringConnection,
    tags: Vec<Tag>,
}

#[derive(Clone, Debug)]
struct SecurityGroupRecord {
    group: SecurityGroup,
    permissions: Vec<IngressPermission>,
}

#[derive(Debug, Default)]
struct World {
    vpcs: HashMap<String, VpcRecord>,
    route_tables: HashMap<String, RouteTable>,
    peerings: HashMap<String, PeeringRecord>,
    security_groups: HashMap<String, SecurityGroupRecord>,
}

impl World {
    fn vpc_in(&self, region: &str, vpc_id: &str) -> Option<&VpcRecord> {
        self.vpcs.get(vpc_id).filter(|record| record.region == region)
    }

    fn region_of_table(&self, route_table_id: &str) -> Option<&str> {
        let table = self.route_tables.get(route_table_id)?;
        self.vpcs.get(&table.vpc_id).map(|record| record.region.as_str())
    }
}

fn resource_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..17])
}

/// Shared EC2 state across all regions
#[derive(Clone, Debug, Default)]
pub struct Ec2Sandbox {
    world: Arc<RwLock<World>>,
}

impl Ec2Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client bound to `region`, with its own call log and faults
    pub fn client(&self, region: impl Into<String>) -> SandboxEc2Client {
        SandboxEc2Client {
            region: region.into(),
            world: self.world.clone(),
            faults: FaultInjector::new(),
        }
    }

    /// Provision a cluster VPC named `<infra_id>-vpc` with its main route
    /// table and worker security group. Returns the VPC ID.
    pub async fn add_vpc(&self, region: &str, infra_id: &str, cidr_block: &str) -> String {
        let vpc_id = resource_id("vpc");
        let mut world = self.world.write().await;

        world.vpcs.insert(
            vpc_id.clone(),
            VpcRecord {
                region: region.to_string(),
                vpc: Vpc {
                    vpc_id: vpc_id.clone(),
                    cidr_block: Some(cidr_block.to_string()),
                    tags: vec![Tag::new("Name", format!("{}-vpc", infra_id))],
                },
            },
        );

        let route_table_id = resource_id("rtb");
        world.route_tables.insert(
            route_table_id.clone(),
            RouteTable {
                route_table_id,
                vpc_id: vpc_id.clone(),
                main: true,
                routes: vec![Route {
                    destination_cidr: cidr_block.to_string(),
                    peering_connection_id: None,
                }],
            },
        );

        let group_id = resource_id("sg");
        world.security_groups.insert(
            group_id.clone(),
            SecurityGroupRecord {
                group: SecurityGroup {
                    group_id,
                    group_name: format!("{}-worker-sg", infra_id),
                    vpc_id: vpc_id.clone(),
                },
                permissions: Vec::new(),
            },
        );

        debug!(vpc_id = %vpc_id, region = %region, cidr = %cidr_block, "Sandbox VPC added");
        vpc_id
    }

    /// Routes of the main route table of `vpc_id`
    pub async fn main_routes(&self, vpc_id: &str) -> Vec<Route> {
        let world = self.world.read().await;
        world
            .route_tables
            .values()
            .filter(|table| table.vpc_id == vpc_id && table.main)
            .flat_map(|table| table.routes.clone())
            .collect()
    }

    pub async fn peering_connections(&self) -> Vec<PeeringConnection> {
        let world = self.world.read().await;
        world
            .peerings
            .values()
            .map(|record| record.connection.clone())
            .collect()
    }

    pub async fn peering_tags(&self, connection_id: &str) -> Vec<Tag> {
        let world = self.world.read().await;
        world
            .peerings
            .get(connection_id)
            .map(|record| record.tags.clone())
            .unwrap_or_default()
    }

    /// Ingress permissions of every security group named `group_name`
    pub async fn ingress_permissions(&self, group_name: &str) -> Vec<IngressPermission> {
        let world = self.world.read().await;
        world
            .security_groups
            .values()
            .filter(|record| record.group.group_name == group_name)
            .flat_map(|record| record.permissions.clone())
            .collect()
    }
}

/// EC2 client for one region of an [`Ec2Sandbox`]
#[derive(Clone, Debug)]
pub struct SandboxEc2Client {
    region: String,
    world: Arc<RwLock<World>>,
    faults: FaultInjector<Ec2Operation>,
}

impl SandboxEc2Client {
    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn inject(&self, op: Ec2Operation, fault: Fault) {
        self.faults.inject(op, fault);
    }

    pub fn calls(&self) -> Vec<Ec2Operation> {
        self.faults.calls()
    }

    pub fn count(&self, op: Ec2Operation) -> usize {
        self.faults.count(op)
    }
}

fn peering_not_found(connection_id: &str) -> TransportError {
    TransportError::with_code(
        "InvalidVpcPeeringConnectionID.NotFound",
        format!("The vpcPeeringConnection ID '{}' does not exist", connection_id),
    )
}

fn route_table_not_found(route_table_id: &str) -> TransportError {
    TransportError::with_code(
        "InvalidRouteTableID.NotFound",
        format!("The routeTable ID '{}' does not exist", route_table_id),
    )
}

fn group_not_found(group_id: &str) -> TransportError {
    TransportError::with_code(
        "InvalidGroup.NotFound",
        format!("The security group '{}' does not exist", group_id),
    )
}

#[async_trait]
impl Ec2Api for SandboxEc2Client {
    async fn describe_vpcs(&self, name_tag: &str) -> Result<Vec<Vpc>, TransportError> {
        self.faults.check(Ec2Operation::DescribeVpcs)?;
        let world = self.world.read().await;

        Ok(world
            .vpcs
            .values()
            .filter(|record| record.region == self.region)
            .filter(|record| {
                record
                    .vpc
                    .tags
                    .iter()
                    .any(|tag| tag.key == "Name" && tag.value == name_tag)
            })
            .map(|record| record.vpc.clone())
            .collect())
    }

    async fn create_vpc_peering_connection(
        &self,
        request: &CreatePeeringRequest,
    ) -> Result<PeeringConnection, TransportError> {
        self.faults.check(Ec2Operation::CreateVpcPeeringConnection)?;
        let mut world = self.world.write().await;

        let requester = world
            .vpc_in(&self.region, &request.vpc_id)
            .map(|record| record.vpc.clone())
            .ok_or_else(|| {
                TransportError::with_code(
                    "InvalidVpcID.NotFound",
                    format!("The vpc ID '{}' does not exist", request.vpc_id),
                )
            })?;

        if world.vpc_in(&request.peer_region, &request.peer_vpc_id).is_none() {
            return Err(TransportError::with_code(
                "InvalidVpcID.NotFound",
                format!(
                    "The vpc ID '{}' does not exist in {}",
                    request.peer_vpc_id, request.peer_region
                ),
            ));
        }

        let connection = PeeringConnection {
            connection_id: resource_id("pcx"),
            requester: VpcInfo {
                vpc_id: requester.vpc_id,
                cidr_block: requester.cidr_block,
                region: Some(self.region.clone()),
                owner_id: None,
            },
            accepter: VpcInfo {
                vpc_id: request.peer_vpc_id.clone(),
                cidr_block: None,
                region: Some(request.peer_region.clone()),
                owner_id: request.peer_owner_id.clone(),
            },
            state: PeeringState::PendingAcceptance,
        };

        world.peerings.insert(
            connection.connection_id.clone(),
            PeeringRecord {
                connection: connection.clone(),
                tags: request.tags.clone(),
            },
        );

        Ok(connection)
    }

    async fn accept_vpc_peering_connection(&self, connection_id: &str) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::AcceptVpcPeeringConnection)?;
        let mut world = self.world.write().await;

        let accepter_cidr = {
            let record = world
                .peerings
                .get(connection_id)
                .ok_or_else(|| peering_not_found(connection_id))?;
            let accepter = &record.connection.accepter;

            if accepter.region.as_deref() != Some(self.region.as_str()) {
                return Err(TransportError::with_code(
                    "OperationNotPermitted",
                    format!("Peering {} must be accepted in the accepter region", connection_id),
                ));
            }
            if record.connection.state != PeeringState::PendingAcceptance {
                return Err(TransportError::with_code(
                    "InvalidStateTransition",
                    format!(
                        "Peering {} is in state {:?}",
                        connection_id, record.connection.state
                    ),
                ));
            }

            world
                .vpcs
                .get(&accepter.vpc_id)
                .and_then(|vpc| vpc.vpc.cidr_block.clone())
        };

        if let Some(record) = world.peerings.get_mut(connection_id) {
            record.connection.accepter.cidr_block = accepter_cidr;
            record.connection.state = PeeringState::Active;
        }
        Ok(())
    }

    async fn describe_route_tables(&self, vpc_id: &str) -> Result<Vec<RouteTable>, TransportError> {
        self.faults.check(Ec2Operation::DescribeRouteTables)?;
        let world = self.world.read().await;

        if world.vpc_in(&self.region, vpc_id).is_none() {
            return Ok(Vec::new());
        }

        Ok(world
            .route_tables
            .values()
            .filter(|table| table.vpc_id == vpc_id && table.main)
            .cloned()
            .collect())
    }

    async fn create_route(
        &self,
        route_table_id: &str,
        destination_cidr: &str,
        connection_id: &str,
    ) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::CreateRoute)?;
        let mut world = self.world.write().await;

        if world.region_of_table(route_table_id) != Some(self.region.as_str()) {
            return Err(route_table_not_found(route_table_id));
        }
        let live = world
            .peerings
            .get(connection_id)
            .map(|record| record.connection.state.is_live())
            .unwrap_or(false);
        if !live {
            return Err(peering_not_found(connection_id));
        }

        let table = world
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| route_table_not_found(route_table_id))?;

        let same_target = table
            .routes
            .iter()
            .find(|route| route.destination_cidr == destination_cidr)
            .map(|route| route.peering_connection_id.as_deref() == Some(connection_id));

        match same_target {
            Some(true) => Ok(()),
            Some(false) => Err(TransportError::with_code(
                "RouteAlreadyExists",
                format!(
                    "The route identified by {} already exists",
                    destination_cidr
                ),
            )),
            None => {
                table.routes.push(Route {
                    destination_cidr: destination_cidr.to_string(),
                    peering_connection_id: Some(connection_id.to_string()),
                });
                Ok(())
            }
        }
    }

    async fn delete_route(&self, route_table_id: &str, destination_cidr: &str) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::DeleteRoute)?;
        let mut world = self.world.write().await;

        if world.region_of_table(route_table_id) != Some(self.region.as_str()) {
            return Err(route_table_not_found(route_table_id));
        }
        let table = world
            .route_tables
            .get_mut(route_table_id)
            .ok_or_else(|| route_table_not_found(route_table_id))?;

        let before = table.routes.len();
        table
            .routes
            .retain(|route| route.destination_cidr != destination_cidr);
        if table.routes.len() == before {
            return Err(TransportError::with_code(
                "InvalidRoute.NotFound",
                format!(
                    "no route with destination-cidr-block {} in route table {}",
                    destination_cidr, route_table_id
                ),
            ));
        }
        Ok(())
    }

    async fn describe_vpc_peering_connections(
        &self,
        filter: &PeeringFilter,
    ) -> Result<Vec<PeeringConnection>, TransportError> {
        self.faults.check(Ec2Operation::DescribeVpcPeeringConnections)?;
        let world = self.world.read().await;

        Ok(world
            .peerings
            .values()
            .map(|record| &record.connection)
            .filter(|connection| {
                connection.requester.vpc_id == filter.requester_vpc_id
                    && connection.accepter.vpc_id == filter.accepter_vpc_id
            })
            .cloned()
            .collect())
    }

    async fn delete_vpc_peering_connection(&self, connection_id: &str) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::DeleteVpcPeeringConnection)?;
        let mut world = self.world.write().await;

        let record = world
            .peerings
            .get_mut(connection_id)
            .filter(|record| record.connection.state.is_live())
            .ok_or_else(|| peering_not_found(connection_id))?;

        let region = Some(self.region.as_str());
        if record.connection.requester.region.as_deref() != region
            && record.connection.accepter.region.as_deref() != region
        {
            return Err(peering_not_found(connection_id));
        }

        record.connection.state = PeeringState::Deleted;
        Ok(())
    }

    async fn describe_security_groups(
        &self,
        vpc_id: &str,
        group_name: &str,
    ) -> Result<Vec<SecurityGroup>, TransportError> {
        self.faults.check(Ec2Operation::DescribeSecurityGroups)?;
        let world = self.world.read().await;

        Ok(world
            .security_groups
            .values()
            .map(|record| &record.group)
            .filter(|group| group.vpc_id == vpc_id && group.group_name == group_name)
            .cloned()
            .collect())
    }

    async fn authorize_security_group_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::AuthorizeSecurityGroupIngress)?;
        let mut world = self.world.write().await;

        let record = world
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| group_not_found(group_id))?;

        if let Some(existing) = permissions.iter().find(|p| record.permissions.contains(p)) {
            return Err(TransportError::with_code(
                DUPLICATE_PERMISSION,
                format!(
                    "the specified rule \"peer: {}, {}, port {}\" already exists",
                    existing.source_group_id, existing.protocol, existing.port
                ),
            ));
        }

        record.permissions.extend_from_slice(permissions);
        Ok(())
    }

    async fn revoke_security_group_ingress(
        &self,
        group_id: &str,
        permissions: &[IngressPermission],
    ) -> Result<(), TransportError> {
        self.faults.check(Ec2Operation::RevokeSecurityGroupIngress)?;
        let mut world = self.world.write().await;

        let record = world
            .security_groups
            .get_mut(group_id)
            .ok_or_else(|| group_not_found(group_id))?;

        if let Some(missing) = permissions.iter().find(|p| !record.permissions.contains(p)) {
            return Err(TransportError::with_code(
                PERMISSION_NOT_FOUND,
                format!(
                    "the specified rule \"peer: {}, {}, port {}\" does not exist",
                    missing.source_group_id, missing.protocol, missing.port
                ),
            ));
        }

        record.permissions.retain(|p| !permissions.contains(p));
        Ok(())
    }
}
