//! Routes between the two peered VPCs
//!
//! Each side's main route table points the other side's CIDR at the
//! peering connection. The requester side is always handled fully before
//! the accepter side, and a failure on either side leaves whatever was
//! already done in place.

use crate::AwsCloud;
use peering_api::{PeeringConnection, ResolvedVpc};
use peering_core::{Result, ResultExt};
use tracing::debug;

impl AwsCloud {
    /// Install the peering routes on this (requester) side, then on `target`.
    pub async fn create_routes_for_peering(
        &self,
        target: &AwsCloud,
        source_vpc: &ResolvedVpc,
        target_vpc: &ResolvedVpc,
        connection: &PeeringConnection,
    ) -> Result<()> {
        let (to_target, to_source) = route_destinations(source_vpc, target_vpc, connection);

        self.create_route_for(&source_vpc.vpc_id, to_target, &connection.connection_id)
            .await
            .with_context(|| format!("unable to create route for {}", source_vpc.vpc_id))?;

        target
            .create_route_for(&target_vpc.vpc_id, to_source, &connection.connection_id)
            .await
            .with_context(|| format!("unable to create route for {}", target_vpc.vpc_id))?;

        Ok(())
    }

    /// Remove the peering routes from this side, then from `target`.
    ///
    /// A missing route is an error like any other.
    pub async fn delete_peering_routes(
        &self,
        target: &AwsCloud,
        source_vpc: &ResolvedVpc,
        target_vpc: &ResolvedVpc,
        connection: &PeeringConnection,
    ) -> Result<()> {
        let (to_target, to_source) = route_destinations(source_vpc, target_vpc, connection);

        self.delete_route_for(&source_vpc.vpc_id, to_target).await?;
        target.delete_route_for(&target_vpc.vpc_id, to_source).await?;

        Ok(())
    }

    async fn create_route_for(&self, vpc_id: &str, destination_cidr: &str, connection_id: &str) -> Result<()> {
        let route_table_id = self.route_table_id(vpc_id).await?;
        self.client
            .create_route(&route_table_id, destination_cidr, connection_id)
            .await?;

        debug!(
            route_table_id = %route_table_id,
            destination = %destination_cidr,
            connection_id = %connection_id,
            "Created peering route"
        );
        Ok(())
    }

    async fn delete_route_for(&self, vpc_id: &str, destination_cidr: &str) -> Result<()> {
        let route_table_id = self
            .route_table_id(vpc_id)
            .await
            .with_context(|| format!("unable to get route tables for {}", vpc_id))?;

        self.client
            .delete_route(&route_table_id, destination_cidr)
            .await
            .with_context(|| format!("unable to delete route for {}", vpc_id))?;

        debug!(route_table_id = %route_table_id, destination = %destination_cidr, "Deleted peering route");
        Ok(())
    }
}

/// Destination CIDRs for the requester and accepter routes, preferring the
/// blocks reported on the connection. The accepter block is only filled in
/// once the peering has been accepted.
fn route_destinations<'a>(
    source_vpc: &'a ResolvedVpc,
    target_vpc: &'a ResolvedVpc,
    connection: &'a PeeringConnection,
) -> (&'a str, &'a str) {
    let to_target = connection
        .accepter
        .cidr_block
        .as_deref()
        .unwrap_or(&target_vpc.cidr_block);
    let to_source = connection
        .requester
        .cidr_block
        .as_deref()
        .unwrap_or(&source_vpc.cidr_block);
    (to_target, to_source)
}
