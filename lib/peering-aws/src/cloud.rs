use crate::client::Ec2Api;
use peering_api::NetworkEndpoint;
use peering_core::PeeringRetryConfig;
use std::fmt;
use std::sync::Arc;

/// One AWS side of a peering: the cluster endpoint and the EC2 client
/// authorized for its region.
#[derive(Clone)]
pub struct AwsCloud {
    endpoint: NetworkEndpoint,
    pub(crate) client: Arc<dyn Ec2Api>,
    pub(crate) retry: PeeringRetryConfig,
}

impl AwsCloud {
    pub fn new(endpoint: NetworkEndpoint, client: Arc<dyn Ec2Api>) -> Self {
        Self {
            endpoint,
            client,
            retry: PeeringRetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: PeeringRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    pub fn infra_id(&self) -> &str {
        &self.endpoint.infra_id
    }

    pub fn region(&self) -> &str {
        &self.endpoint.region
    }

    pub fn retry_config(&self) -> &PeeringRetryConfig {
        &self.retry
    }

    /// `Name` tag of the cluster VPC
    pub fn vpc_name(&self) -> String {
        format!("{}-vpc", self.endpoint.infra_id)
    }

    /// Name of the security group attached to worker nodes
    pub fn worker_security_group_name(&self) -> String {
        format!("{}-worker-sg", self.endpoint.infra_id)
    }
}

impl fmt::Debug for AwsCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCloud")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
