//! YAML configuration and sandbox wiring for the two peered clusters

use anyhow::{bail, Context, Result};
use peering_api::{NetworkEndpoint, PortSpec, PrepareForSubmarinerInput, ProviderKind};
use peering_aws::{AwsCloud, Ec2Sandbox};
use peering_azure::{AzureCloud, NsgSandbox};
use peering_cloud::Cloud;
use peering_core::PeeringRetryConfig;
use peering_gcp::{ComputeSandbox, GcpCloud};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeeringConfig {
    /// Provider used for both sides unless a side overrides it
    pub provider: ProviderKind,
    pub source: SideConfig,
    pub target: SideConfig,
    #[serde(default)]
    pub retry: PeeringRetryConfig,
    #[serde(default)]
    pub internal_ports: Vec<PortSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideConfig {
    #[serde(flatten)]
    pub endpoint: NetworkEndpoint,

    #[serde(default)]
    pub provider: Option<ProviderKind>,

    /// CIDR block of the seeded VPC, required on AWS
    #[serde(default)]
    pub cidr_block: Option<String>,
}

impl PeeringConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn prepare_input(&self) -> PrepareForSubmarinerInput {
        PrepareForSubmarinerInput {
            internal_ports: self.internal_ports.clone(),
        }
    }

    pub fn provider_of(&self, side: &SideConfig) -> ProviderKind {
        side.provider.unwrap_or(self.provider)
    }
}

/// In-memory provider backends shared by both sides of one invocation
#[derive(Clone, Debug, Default)]
pub struct Sandboxes {
    pub ec2: Ec2Sandbox,
    pub compute: ComputeSandbox,
    pub nsg: NsgSandbox,
}

impl Sandboxes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the side's network and return a cloud bound to it
    pub async fn build_cloud(&self, config: &PeeringConfig, side: &SideConfig) -> Result<Cloud> {
        let endpoint = side.endpoint.clone();

        let cloud = match config.provider_of(side) {
            ProviderKind::Aws => {
                let Some(cidr_block) = side.cidr_block.as_deref() else {
                    bail!("AWS cluster {} needs a cidrBlock", endpoint.infra_id);
                };
                let vpc_id = self.ec2.add_vpc(&endpoint.region, &endpoint.infra_id, cidr_block).await;
                debug!(infra_id = %endpoint.infra_id, vpc_id = %vpc_id, "Seeded AWS VPC");

                let client = self.ec2.client(endpoint.region.clone());
                AwsCloud::new(endpoint, Arc::new(client))
                    .with_retry_config(config.retry.clone())
                    .into()
            }
            ProviderKind::Gcp => {
                if endpoint.project_id.is_none() {
                    bail!("GCP cluster {} needs a projectId", endpoint.infra_id);
                }
                self.compute.add_network(endpoint.project(), &endpoint.infra_id).await;
                debug!(infra_id = %endpoint.infra_id, project = %endpoint.project(), "Seeded GCP network");

                GcpCloud::new(endpoint, Arc::new(self.compute.client()))
                    .with_retry_config(config.retry.clone())
                    .into()
            }
            ProviderKind::Azure => {
                self.nsg.add_security_group(&endpoint.infra_id).await;
                debug!(infra_id = %endpoint.infra_id, "Seeded Azure security group");

                AzureCloud::new(endpoint, Arc::new(self.nsg.client())).into()
            }
        };
        Ok(cloud)
    }
}
