//! Provider-independent entry point over the AWS, GCP and Azure backends
//!
//! Peering is only possible between two clouds of the same provider; any
//! other pairing is rejected before a single remote call is made.

use peering_api::{NetworkEndpoint, PrepareForSubmarinerInput, ProviderKind, Reporter};
use peering_aws::AwsCloud;
use peering_azure::AzureCloud;
use peering_core::{PeeringError, Result};
use peering_gcp::GcpCloud;
use tracing::debug;

#[derive(Clone, Debug)]
pub enum Cloud {
    Aws(AwsCloud),
    Gcp(GcpCloud),
    Azure(AzureCloud),
}

impl Cloud {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Cloud::Aws(_) => ProviderKind::Aws,
            Cloud::Gcp(_) => ProviderKind::Gcp,
            Cloud::Azure(_) => ProviderKind::Azure,
        }
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        match self {
            Cloud::Aws(cloud) => cloud.endpoint(),
            Cloud::Gcp(cloud) => cloud.endpoint(),
            Cloud::Azure(cloud) => cloud.endpoint(),
        }
    }

    /// Open the intra-cluster ports Submariner needs
    pub async fn prepare_for_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        match self {
            Cloud::Aws(cloud) => cloud.prepare_for_submariner(input, reporter).await,
            Cloud::Gcp(cloud) => cloud.prepare_for_submariner(input, reporter).await,
            Cloud::Azure(cloud) => cloud.prepare_for_submariner(input, reporter).await,
        }
    }

    /// Close the ports opened by [`Cloud::prepare_for_submariner`].
    ///
    /// AWS revokes the individual permissions, so it needs the same input;
    /// the other providers remove their rules by name.
    pub async fn cleanup_after_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        match self {
            Cloud::Aws(cloud) => cloud.cleanup_after_submariner(input, reporter).await,
            Cloud::Gcp(cloud) => cloud.cleanup_after_submariner(reporter).await,
            Cloud::Azure(cloud) => cloud.cleanup_after_submariner(reporter).await,
        }
    }

    pub async fn create_vpc_peering(&self, target: &Cloud, reporter: &dyn Reporter) -> Result<()> {
        debug!(
            provider = %self.kind(),
            source = %self.endpoint().infra_id,
            target = %target.endpoint().infra_id,
            "Creating VPC peering"
        );

        match (self, target) {
            (Cloud::Aws(source), Cloud::Aws(target)) => source.create_vpc_peering(target, reporter).await,
            (Cloud::Gcp(source), Cloud::Gcp(target)) => source.create_vpc_peering(target, reporter).await,
            (Cloud::Azure(source), Cloud::Azure(target)) => source.create_vpc_peering(target, reporter).await,
            _ => Err(self.reject(target, reporter)),
        }
    }

    pub async fn cleanup_vpc_peering(&self, target: &Cloud, reporter: &dyn Reporter) -> Result<()> {
        debug!(
            provider = %self.kind(),
            source = %self.endpoint().infra_id,
            target = %target.endpoint().infra_id,
            "Removing VPC peering"
        );

        match (self, target) {
            (Cloud::Aws(source), Cloud::Aws(target)) => source.cleanup_vpc_peering(target, reporter).await,
            (Cloud::Gcp(source), Cloud::Gcp(target)) => source.cleanup_vpc_peering(target, reporter).await,
            (Cloud::Azure(source), Cloud::Azure(target)) => source.cleanup_vpc_peering(target, reporter).await,
            _ => Err(self.reject(target, reporter)),
        }
    }

    fn reject(&self, target: &Cloud, reporter: &dyn Reporter) -> PeeringError {
        let err = PeeringError::ProviderMismatch {
            expected: self.kind(),
            actual: target.kind(),
        };
        reporter.failed(&err);
        err
    }
}

impl From<AwsCloud> for Cloud {
    fn from(cloud: AwsCloud) -> Self {
        Cloud::Aws(cloud)
    }
}

impl From<GcpCloud> for Cloud {
    fn from(cloud: GcpCloud) -> Self {
        Cloud::Gcp(cloud)
    }
}

impl From<AzureCloud> for Cloud {
    fn from(cloud: AzureCloud) -> Self {
        Cloud::Azure(cloud)
    }
}
