use crate::client::{AllowedPorts, ComputeApi, Direction, Firewall, NOT_FOUND};
use peering_api::{format_ports, NetworkEndpoint, PortSpec, PrepareForSubmarinerInput, Reporter};
use peering_core::{PeeringError, PeeringRetryConfig, Result, ResultExt};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const INTERNAL_PORTS_RULE: &str = "submariner-internal-ports";

/// One GCP side: the cluster endpoint (with its project) and a Compute
/// client able to act on that project.
#[derive(Clone)]
pub struct GcpCloud {
    endpoint: NetworkEndpoint,
    pub(crate) client: Arc<dyn ComputeApi>,
    pub(crate) retry: PeeringRetryConfig,
}

impl GcpCloud {
    pub fn new(endpoint: NetworkEndpoint, client: Arc<dyn ComputeApi>) -> Self {
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

    pub fn project_id(&self) -> &str {
        self.endpoint.project()
    }

    pub fn network_name(&self) -> String {
        format!("{}-network", self.endpoint.infra_id)
    }

    /// Partial URL of the cluster network
    pub fn network_url(&self) -> String {
        network_url(self.project_id(), &self.endpoint.infra_id)
    }

    /// Name of the peering this side adds on its own network
    pub fn peering_name(&self) -> String {
        format!("{}-peering", self.endpoint.infra_id)
    }

    pub fn internal_ports_rule_name(&self) -> String {
        format!("{}-{}", self.endpoint.infra_id, INTERNAL_PORTS_RULE)
    }

    /// Ingress rule letting cluster nodes reach each other on `ports`
    pub fn internal_firewall_rule(&self, ports: &[PortSpec]) -> Firewall {
        let tags = vec![
            format!("{}-worker", self.endpoint.infra_id),
            format!("{}-master", self.endpoint.infra_id),
        ];

        let mut allowed: Vec<AllowedPorts> = Vec::new();
        for port in ports {
            match allowed.iter_mut().find(|entry| entry.protocol == port.protocol) {
                Some(entry) => entry.ports.push(port.port.to_string()),
                None => allowed.push(AllowedPorts {
                    protocol: port.protocol,
                    ports: vec![port.port.to_string()],
                }),
            }
        }

        Firewall {
            name: self.internal_ports_rule_name(),
            network: self.network_url(),
            direction: Direction::Ingress,
            source_tags: tags.clone(),
            target_tags: tags,
            allowed,
        }
    }

    pub async fn prepare_for_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        let ports = format_ports(&input.internal_ports);
        reporter.started(&format!(
            "Opening internal ports \"{}\" for intra-cluster communications on GCP",
            ports
        ));

        let rule = self.internal_firewall_rule(&input.internal_ports);
        if let Err(e) = self.open_ports(&rule).await {
            reporter.failed(&e);
            return Err(e);
        }

        reporter.succeeded(&format!(
            "Opened internal ports \"{}\" with firewall rule \"{}\" on GCP",
            ports, rule.name
        ));
        Ok(())
    }

    pub async fn cleanup_after_submariner(&self, reporter: &dyn Reporter) -> Result<()> {
        let name = self.internal_ports_rule_name();
        reporter.started(&format!("Deleting firewall rule \"{}\" on GCP", name));

        match self.client.delete_firewall_rule(self.project_id(), &name).await {
            Ok(()) => {}
            Err(e) if e.has_code(NOT_FOUND) => {
                debug!(rule = %name, "Firewall rule already deleted");
            }
            Err(e) => {
                let e = PeeringError::from(e).context(format!("error deleting firewall rule \"{}\"", name));
                reporter.failed(&e);
                return Err(e);
            }
        }

        reporter.succeeded(&format!("Deleted firewall rule \"{}\" on GCP", name));
        Ok(())
    }

    /// Insert the rule when missing, otherwise overwrite it
    async fn open_ports(&self, rule: &Firewall) -> Result<()> {
        match self.client.get_firewall_rule(self.project_id(), &rule.name).await {
            Err(e) if e.has_code(NOT_FOUND) => {
                self.client
                    .insert_firewall_rule(self.project_id(), rule)
                    .await
                    .with_context(|| format!("error inserting firewall rule \"{}\"", rule.name))?;
                debug!(rule = %rule.name, "Inserted firewall rule");
            }
            Err(e) => {
                return Err(PeeringError::from(e).context(format!("error retrieving firewall rule \"{}\"", rule.name)));
            }
            Ok(_) => {
                self.client
                    .update_firewall_rule(self.project_id(), &rule.name, rule)
                    .await
                    .with_context(|| format!("error updating firewall rule \"{}\"", rule.name))?;
                debug!(rule = %rule.name, "Updated firewall rule");
            }
        }
        Ok(())
    }
}

impl fmt::Debug for GcpCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcpCloud")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// `projects/<project>/global/networks/<infra_id>-network`
pub fn network_url(project_id: &str, infra_id: &str) -> String {
    format!("projects/{}/global/networks/{}-network", project_id, infra_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockComputeApi;
    use crate::sandbox::ComputeSandbox;
    use peering_api::{Protocol, RecordingReporter};
    use peering_core::{ErrorKind, TransportError};

    fn cloud(mock: MockComputeApi) -> GcpCloud {
        GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(mock),
        )
    }

    fn input() -> PrepareForSubmarinerInput {
        PrepareForSubmarinerInput {
            internal_ports: vec![
                PortSpec::new(4800, Protocol::Udp),
                PortSpec::new(8080, Protocol::Tcp),
                PortSpec::new(4490, Protocol::Udp),
            ],
        }
    }

    #[test]
    fn test_names() {
        let cloud = cloud(MockComputeApi::new());
        assert_eq!(cloud.network_name(), "cluster-a-network");
        assert_eq!(cloud.network_url(), "projects/project-a/global/networks/cluster-a-network");
        assert_eq!(cloud.peering_name(), "cluster-a-peering");
        assert_eq!(cloud.internal_ports_rule_name(), "cluster-a-submariner-internal-ports");
    }

    #[test]
    fn test_internal_firewall_rule_groups_ports() {
        let rule = cloud(MockComputeApi::new()).internal_firewall_rule(&input().internal_ports);
        assert_eq!(rule.direction, Direction::Ingress);
        assert_eq!(rule.network, "projects/project-a/global/networks/cluster-a-network");
        assert_eq!(rule.source_tags, vec!["cluster-a-worker", "cluster-a-master"]);
        assert_eq!(rule.target_tags, rule.source_tags);
        assert_eq!(
            rule.allowed,
            vec![
                AllowedPorts {
                    protocol: Protocol::Udp,
                    ports: vec!["4800".to_string(), "4490".to_string()],
                },
                AllowedPorts {
                    protocol: Protocol::Tcp,
                    ports: vec!["8080".to_string()],
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_prepare_inserts_missing_rule() {
        let mut mock = MockComputeApi::new();
        mock.expect_get_firewall_rule()
            .withf(|project, name| project == "project-a" && name == "cluster-a-submariner-internal-ports")
            .times(1)
            .returning(|_, _| Err(TransportError::with_code(NOT_FOUND, "not found")));
        mock.expect_insert_firewall_rule().times(1).returning(|_, _| Ok(()));
        mock.expect_update_firewall_rule().never();

        cloud(mock)
            .prepare_for_submariner(&input(), &RecordingReporter::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_prepare_updates_existing_rule() {
        let mut mock = MockComputeApi::new();
        let existing = cloud(MockComputeApi::new()).internal_firewall_rule(&[]);
        mock.expect_get_firewall_rule()
            .times(1)
            .returning(move |_, _| Ok(existing.clone()));
        mock.expect_insert_firewall_rule().never();
        mock.expect_update_firewall_rule()
            .withf(|_, name, rule| name == "cluster-a-submariner-internal-ports" && rule.allowed.len() == 2)
            .times(1)
            .returning(|_, _, _| Ok(()));

        cloud(mock)
            .prepare_for_submariner(&input(), &RecordingReporter::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_prepare_fails_on_lookup_error() {
        let mut mock = MockComputeApi::new();
        mock.expect_get_firewall_rule()
            .returning(|_, _| Err(TransportError::with_code("forbidden", "denied")));
        let reporter = RecordingReporter::new();

        let err = cloud(mock).prepare_for_submariner(&input(), &reporter).await.unwrap_err();
        assert!(err.to_string().starts_with("error retrieving firewall rule"));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(reporter.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_and_cleanup_against_sandbox() {
        let sandbox = ComputeSandbox::new();
        let cloud = GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(sandbox.client()),
        );
        let reporter = RecordingReporter::new();

        cloud.prepare_for_submariner(&input(), &reporter).await.unwrap();
        // Second run goes through the update path
        cloud.prepare_for_submariner(&input(), &reporter).await.unwrap();

        let rule = sandbox
            .firewall_rule("project-a", "cluster-a-submariner-internal-ports")
            .await
            .unwrap();
        assert_eq!(rule.allowed.len(), 2);

        cloud.cleanup_after_submariner(&reporter).await.unwrap();
        cloud.cleanup_after_submariner(&reporter).await.unwrap();
        assert!(sandbox
            .firewall_rule("project-a", "cluster-a-submariner-internal-ports")
            .await
            .is_none());
        assert!(reporter.failures().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_ignores_missing_rule() {
        let mut mock = MockComputeApi::new();
        mock.expect_delete_firewall_rule()
            .times(1)
            .returning(|_, _| Err(TransportError::with_code(NOT_FOUND, "not found")));
        let reporter = RecordingReporter::new();

        cloud(mock).cleanup_after_submariner(&reporter).await.unwrap();
        assert!(reporter.failures().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_reports_other_errors() {
        let mut mock = MockComputeApi::new();
        mock.expect_delete_firewall_rule()
            .returning(|_, _| Err(TransportError::new("backend error")));
        let reporter = RecordingReporter::new();

        assert!(cloud(mock).cleanup_after_submariner(&reporter).await.is_err());
        assert_eq!(reporter.failures().len(), 1);
    }
}
