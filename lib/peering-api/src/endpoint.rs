//! Network endpoints identifying one side of a peering
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Cloud provider backing a network endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Aws,
    Gcp,
    Azure,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::Aws => "AWS",
            ProviderKind::Gcp => "GCP",
            ProviderKind::Azure => "Azure",
        };
        f.write_str(name)
    }
}

/// One side of a peering: a cluster infrastructure in a given region.
///
/// Constructed once per side and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEndpoint {
    /// Stable name of the cluster's provisioned infrastructure
    pub infra_id: String,

    /// Region the infrastructure lives in
    pub region: String,

    /// GCP project, AWS account or Azure subscription owning the network
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_project_id"
    )]
    pub project_id: Option<String>,
}

/// AWS account IDs are all digits and often written unquoted
fn deserialize_project_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ProjectId {
        Text(String),
        Number(u64),
    }

    Ok(Option::<ProjectId>::deserialize(deserializer)?.map(|id| match id {
        ProjectId::Text(text) => text,
        ProjectId::Number(number) => number.to_string(),
    }))
}

impl NetworkEndpoint {
    pub fn new(infra_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            infra_id: infra_id.into(),
            region: region.into(),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Project identifier, or an empty string when none was configured
    pub fn project(&self) -> &str {
        self.project_id.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_display() {
        assert_eq!(ProviderKind::Aws.to_string(), "AWS");
        assert_eq!(ProviderKind::Gcp.to_string(), "GCP");
        assert_eq!(ProviderKind::Azure.to_string(), "Azure");
    }

    #[test]
    fn test_endpoint_project() {
        let endpoint = NetworkEndpoint::new("cluster-a", "us-east-1");
        assert_eq!(endpoint.project(), "");

        let endpoint = endpoint.with_project("123456789012");
        assert_eq!(endpoint.project(), "123456789012");
        assert_eq!(endpoint.infra_id, "cluster-a");
    }
}
