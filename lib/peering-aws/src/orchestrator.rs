//! End-to-end creation and removal of a VPC peering between two AWS clusters
//!
//! Every step is awaited before the next one starts. Only acceptance, route
//! creation and connection deletion are retried, and a retry never repeats
//! an earlier step. Nothing is rolled back on failure.

use crate::AwsCloud;
use peering_api::Reporter;
use peering_core::{retry_with_fixed_delay, validate_no_overlap, Result, ResultExt, StateTracker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateState {
    Idle,
    CidrValidated,
    VpcsResolved,
    PeeringRequested,
    PeeringAccepted,
    RoutesCreated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanupState {
    Idle,
    VpcsResolved,
    ConnectionLocated,
    RoutesDeleted,
    ConnectionDeleted,
}

impl AwsCloud {
    /// Peer this cluster's VPC with the VPC of `target`.
    ///
    /// This side requests the peering and `target` accepts it; each side's
    /// main route table then gets a route to the other side's CIDR.
    pub async fn create_vpc_peering(&self, target: &AwsCloud, reporter: &dyn Reporter) -> Result<()> {
        reporter.started(&format!(
            "Creating VPC peering between {} and {}",
            self.infra_id(),
            target.infra_id()
        ));

        let mut tracker = StateTracker::new("create VPC peering", CreateState::Idle);
        match self.run_create(target, &mut tracker).await {
            Ok(()) => {
                reporter.succeeded(&format!(
                    "Created VPC peering between {} and {}",
                    self.infra_id(),
                    target.infra_id()
                ));
                Ok(())
            }
            Err(e) => Err(tracker.fail(e, reporter)),
        }
    }

    /// Remove the routes and the peering connection created by
    /// [`AwsCloud::create_vpc_peering`].
    pub async fn cleanup_vpc_peering(&self, target: &AwsCloud, reporter: &dyn Reporter) -> Result<()> {
        reporter.started(&format!(
            "Removing VPC peering between {} and {}",
            self.infra_id(),
            target.infra_id()
        ));

        let mut tracker = StateTracker::new("cleanup VPC peering", CleanupState::Idle);
        match self.run_cleanup(target, &mut tracker).await {
            Ok(()) => {
                reporter.succeeded(&format!(
                    "Removed VPC peering between {} and {}",
                    self.infra_id(),
                    target.infra_id()
                ));
                Ok(())
            }
            Err(e) => Err(tracker.fail(e, reporter)),
        }
    }

    /// Both VPCs exist and their CIDR blocks do not overlap
    pub async fn validate_peering_prerequisites(&self, target: &AwsCloud) -> Result<()> {
        let source_vpc = self.resolve_vpc().await?;
        let target_vpc = target.resolve_vpc().await?;
        validate_no_overlap(&source_vpc.cidr_block, &target_vpc.cidr_block)
    }

    async fn run_create(&self, target: &AwsCloud, tracker: &mut StateTracker<CreateState>) -> Result<()> {
        self.validate_peering_prerequisites(target)
            .await
            .context("unable to validate vpc peering prerequisites")?;
        tracker.advance(CreateState::CidrValidated);

        let source_vpc = self.resolve_vpc().await.context("unable to retrieve source VPC ID")?;
        let target_vpc = target.resolve_vpc().await.context("unable to retrieve target VPC ID")?;
        tracker.advance(CreateState::VpcsResolved);

        let connection = self
            .request_peering(&source_vpc.vpc_id, &target_vpc.vpc_id, target)
            .await
            .context("unable to request VPC peering")?;
        tracker.advance(CreateState::PeeringRequested);

        let connection_id = connection.connection_id.as_str();
        retry_with_fixed_delay(
            &self.retry.accept,
            &format!("accept VPC peering {}", connection_id),
            || target.accept_peering(connection_id),
        )
        .await
        .context("unable to accept VPC peering")?;
        tracker.advance(CreateState::PeeringAccepted);

        retry_with_fixed_delay(&self.retry.routes, "create VPC peering routes", || {
            self.create_routes_for_peering(target, &source_vpc, &target_vpc, &connection)
        })
        .await
        .context("unable to create VPC peering routes")?;
        tracker.advance(CreateState::RoutesCreated);

        Ok(())
    }

    async fn run_cleanup(&self, target: &AwsCloud, tracker: &mut StateTracker<CleanupState>) -> Result<()> {
        let source_vpc = self.resolve_vpc().await.context("unable to retrieve source VPC ID")?;
        let target_vpc = target.resolve_vpc().await.context("unable to retrieve target VPC ID")?;
        tracker.advance(CleanupState::VpcsResolved);

        let connection = self
            .find_peering_connection(&source_vpc.vpc_id, &target_vpc.vpc_id)
            .await
            .context("unable to retrieve VPC Peering Connections")?;
        tracker.advance(CleanupState::ConnectionLocated);

        self.delete_peering_routes(target, &source_vpc, &target_vpc, &connection)
            .await
            .context("unable to delete VPC peering routes")?;
        tracker.advance(CleanupState::RoutesDeleted);

        let connection_id = connection.connection_id.as_str();
        retry_with_fixed_delay(
            &self.retry.delete,
            &format!("delete VPC Peering Connection {}", connection_id),
            || self.delete_peering_connection(connection_id),
        )
        .await
        .with_context(|| format!("unable to delete VPC Peering Connection {}", connection_id))?;
        tracker.advance(CleanupState::ConnectionDeleted);

        Ok(())
    }
}
