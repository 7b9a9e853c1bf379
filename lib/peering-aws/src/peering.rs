//! Peering connection requests, acceptance and lookup

use crate::client::{CreatePeeringRequest, PeeringFilter, Tag};
use crate::AwsCloud;
use peering_api::{peering_name, PeeringConnection};
use peering_core::{PeeringError, Result};
use tracing::{debug, info};

impl AwsCloud {
    /// Ask for a peering from `source_vpc_id` (owned by this side) to
    /// `target_vpc_id` owned by `target`. Issued once, never retried.
    pub async fn request_peering(
        &self,
        source_vpc_id: &str,
        target_vpc_id: &str,
        target: &AwsCloud,
    ) -> Result<PeeringConnection> {
        let request = CreatePeeringRequest {
            vpc_id: source_vpc_id.to_string(),
            peer_vpc_id: target_vpc_id.to_string(),
            peer_region: target.region().to_string(),
            peer_owner_id: target.endpoint().project_id.clone(),
            tags: vec![Tag::new("Name", peering_name(self.infra_id(), target.infra_id()))],
        };

        let connection = self.client.create_vpc_peering_connection(&request).await?;

        info!(
            connection_id = %connection.connection_id,
            requester = %source_vpc_id,
            accepter = %target_vpc_id,
            "Requested VPC peering"
        );

        Ok(connection)
    }

    /// Accept a pending peering; must be called on the accepter side
    pub async fn accept_peering(&self, connection_id: &str) -> Result<()> {
        self.client.accept_vpc_peering_connection(connection_id).await?;
        debug!(connection_id = %connection_id, region = %self.region(), "Accepted VPC peering");
        Ok(())
    }

    /// The single live peering connection from `requester_vpc_id` to
    /// `accepter_vpc_id`.
    ///
    /// Connections already deleted, rejected, failed or expired are ignored.
    pub async fn find_peering_connection(
        &self,
        requester_vpc_id: &str,
        accepter_vpc_id: &str,
    ) -> Result<PeeringConnection> {
        let filter = PeeringFilter {
            requester_vpc_id: requester_vpc_id.to_string(),
            accepter_vpc_id: accepter_vpc_id.to_string(),
        };

        let mut live: Vec<PeeringConnection> = self
            .client
            .describe_vpc_peering_connections(&filter)
            .await?
            .into_iter()
            .filter(|connection| connection.state.is_live())
            .collect();

        match live.len() {
            1 => Ok(live.remove(0)),
            count => Err(PeeringError::cardinality("VpcPeeringConnections", count)),
        }
    }

    pub async fn delete_peering_connection(&self, connection_id: &str) -> Result<()> {
        self.client.delete_vpc_peering_connection(connection_id).await?;
        debug!(connection_id = %connection_id, "Deleted VPC peering connection");
        Ok(())
    }
}
