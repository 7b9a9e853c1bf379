use crate::client::{NsgApi, RuleDirection, SecurityRule, NOT_FOUND};
use peering_api::{format_ports, NetworkEndpoint, PortSpec, PrepareForSubmarinerInput, ProviderKind, Reporter};
use peering_core::{PeeringError, Result, ResultExt};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const INTERNAL_RULE_PREFIX: &str = "Submariner-Internal-";
const BASE_PRIORITY_INTERNAL: u32 = 2500;
const VIRTUAL_NETWORK: &str = "VirtualNetwork";

/// One Azure side: the cluster endpoint (with its subscription) and a
/// client for its network security groups.
#[derive(Clone)]
pub struct AzureCloud {
    endpoint: NetworkEndpoint,
    client: Arc<dyn NsgApi>,
}

impl AzureCloud {
    pub fn new(endpoint: NetworkEndpoint, client: Arc<dyn NsgApi>) -> Self {
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &NetworkEndpoint {
        &self.endpoint
    }

    pub fn resource_group(&self) -> String {
        format!("{}-rg", self.endpoint.infra_id)
    }

    pub fn security_group_name(&self) -> String {
        format!("{}-nsg", self.endpoint.infra_id)
    }

    /// One inbound and one outbound rule per port, prioritized in port order
    pub fn internal_rules(&self, ports: &[PortSpec]) -> Vec<SecurityRule> {
        let mut rules = Vec::with_capacity(ports.len() * 2);
        for (priority, port) in (BASE_PRIORITY_INTERNAL..).zip(ports) {
            for direction in [RuleDirection::Inbound, RuleDirection::Outbound] {
                rules.push(SecurityRule {
                    name: format!(
                        "{}{}-{}-{}",
                        INTERNAL_RULE_PREFIX,
                        direction.as_str(),
                        port.port,
                        port.protocol
                    ),
                    direction,
                    protocol: port.protocol,
                    priority,
                    source_address_prefix: VIRTUAL_NETWORK.to_string(),
                    destination_address_prefix: VIRTUAL_NETWORK.to_string(),
                    destination_port_range: port.port.to_string(),
                    allow: true,
                });
            }
        }
        rules
    }

    pub async fn prepare_for_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        reporter.started("Opening internal ports for intra-cluster communications on Azure");

        if let Err(e) = self.open_internal_ports(&input.internal_ports).await {
            reporter.failed(&e);
            return Err(e);
        }

        reporter.succeeded(&format!(
            "Opened internal ports \"{}\" for intra-cluster communications on Azure",
            format_ports(&input.internal_ports)
        ));
        Ok(())
    }

    pub async fn cleanup_after_submariner(&self, reporter: &dyn Reporter) -> Result<()> {
        reporter.started("Revoking intra-cluster communication permissions");

        if let Err(e) = self.remove_internal_rules().await {
            reporter.failed(&e);
            return Err(e);
        }

        reporter.succeeded("Revoked intra-cluster communication permissions");
        Ok(())
    }

    pub async fn create_vpc_peering(&self, _target: &AzureCloud, reporter: &dyn Reporter) -> Result<()> {
        let err = PeeringError::Unsupported(ProviderKind::Azure);
        reporter.failed(&err);
        Err(err)
    }

    pub async fn cleanup_vpc_peering(&self, _target: &AzureCloud, reporter: &dyn Reporter) -> Result<()> {
        let err = PeeringError::Unsupported(ProviderKind::Azure);
        reporter.failed(&err);
        Err(err)
    }

    async fn open_internal_ports(&self, ports: &[PortSpec]) -> Result<()> {
        let resource_group = self.resource_group();
        let group_name = self.security_group_name();

        // The group must exist before rules can be attached to it
        self.client
            .get_security_group(&resource_group, &group_name)
            .await
            .with_context(|| format!("unable to get security group {}", group_name))?;

        for rule in self.internal_rules(ports) {
            self.client
                .create_or_update_rule(&resource_group, &group_name, &rule)
                .await
                .with_context(|| format!("unable to create security rule {}", rule.name))?;
            debug!(rule = %rule.name, priority = rule.priority, "Created security rule");
        }
        Ok(())
    }

    async fn remove_internal_rules(&self) -> Result<()> {
        let resource_group = self.resource_group();
        let group_name = self.security_group_name();

        let group = self
            .client
            .get_security_group(&resource_group, &group_name)
            .await
            .with_context(|| format!("unable to get security group {}", group_name))?;

        for rule in group
            .rules
            .iter()
            .filter(|rule| rule.name.starts_with(INTERNAL_RULE_PREFIX))
        {
            match self
                .client
                .delete_rule(&resource_group, &group_name, &rule.name)
                .await
            {
                Ok(()) => debug!(rule = %rule.name, "Deleted security rule"),
                Err(e) if e.has_code(NOT_FOUND) => {}
                Err(e) => {
                    return Err(PeeringError::from(e).context(format!("unable to delete security rule {}", rule.name)))
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for AzureCloud {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCloud")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockNsgApi, NetworkSecurityGroup};
    use crate::sandbox::NsgSandbox;
    use peering_api::{Protocol, RecordingReporter};
    use peering_core::{ErrorKind, TransportError};

    fn input() -> PrepareForSubmarinerInput {
        PrepareForSubmarinerInput {
            internal_ports: vec![PortSpec::new(4800, Protocol::Udp), PortSpec::new(8080, Protocol::Tcp)],
        }
    }

    fn endpoint() -> NetworkEndpoint {
        NetworkEndpoint::new("cluster-a", "eastus").with_project("subscription-1")
    }

    #[test]
    fn test_internal_rules() {
        let cloud = AzureCloud::new(endpoint(), Arc::new(MockNsgApi::new()));
        let rules = cloud.internal_rules(&input().internal_ports);

        let names: Vec<&str> = rules.iter().map(|rule| rule.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Submariner-Internal-Inbound-4800-udp",
                "Submariner-Internal-Outbound-4800-udp",
                "Submariner-Internal-Inbound-8080-tcp",
                "Submariner-Internal-Outbound-8080-tcp",
            ]
        );
        let priorities: Vec<u32> = rules.iter().map(|rule| rule.priority).collect();
        assert_eq!(priorities, vec![2500, 2500, 2501, 2501]);
    }

    #[tokio::test]
    async fn test_prepare_and_cleanup_against_sandbox() {
        let sandbox = NsgSandbox::new();
        sandbox.add_security_group("cluster-a").await;
        sandbox
            .add_rule(
                "cluster-a-rg",
                "cluster-a-nsg",
                SecurityRule {
                    name: "apiserver_in".to_string(),
                    direction: RuleDirection::Inbound,
                    protocol: Protocol::Tcp,
                    priority: 101,
                    source_address_prefix: "*".to_string(),
                    destination_address_prefix: "*".to_string(),
                    destination_port_range: "6443".to_string(),
                    allow: true,
                },
            )
            .await;
        let cloud = AzureCloud::new(endpoint(), Arc::new(sandbox.client()));
        let reporter = RecordingReporter::new();

        cloud.prepare_for_submariner(&input(), &reporter).await.unwrap();
        assert_eq!(sandbox.rules("cluster-a-rg", "cluster-a-nsg").await.len(), 5);

        // Rules are upserted by name
        cloud.prepare_for_submariner(&input(), &reporter).await.unwrap();
        assert_eq!(sandbox.rules("cluster-a-rg", "cluster-a-nsg").await.len(), 5);

        cloud.cleanup_after_submariner(&reporter).await.unwrap();
        let remaining = sandbox.rules("cluster-a-rg", "cluster-a-nsg").await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "apiserver_in");
        assert!(reporter.failures().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_without_security_group() {
        let mut mock = MockNsgApi::new();
        mock.expect_get_security_group()
            .withf(|rg, name| rg == "cluster-a-rg" && name == "cluster-a-nsg")
            .returning(|_, _| Err(TransportError::with_code(NOT_FOUND, "ResourceNotFound")));
        mock.expect_create_or_update_rule().never();
        let reporter = RecordingReporter::new();

        let err = AzureCloud::new(endpoint(), Arc::new(mock))
            .prepare_for_submariner(&input(), &reporter)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("unable to get security group cluster-a-nsg"));
        assert_eq!(reporter.failures().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_vanished_rule() {
        let rules = AzureCloud::new(endpoint(), Arc::new(MockNsgApi::new())).internal_rules(&input().internal_ports);
        let mut mock = MockNsgApi::new();
        mock.expect_get_security_group().returning(move |_, name| {
            Ok(NetworkSecurityGroup {
                name: name.to_string(),
                rules: rules.clone(),
            })
        });
        mock.expect_delete_rule()
            .times(4)
            .returning(|_, _, _| Err(TransportError::with_code(NOT_FOUND, "gone")));

        AzureCloud::new(endpoint(), Arc::new(mock))
            .cleanup_after_submariner(&RecordingReporter::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_peering_is_unsupported() {
        let cloud = AzureCloud::new(endpoint(), Arc::new(MockNsgApi::new()));
        let target = AzureCloud::new(
            NetworkEndpoint::new("cluster-b", "westus"),
            Arc::new(MockNsgApi::new()),
        );
        let reporter = RecordingReporter::new();

        let err = cloud.create_vpc_peering(&target, &reporter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        let err = cloud.cleanup_vpc_peering(&target, &reporter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(reporter.failures().len(), 2);
    }
}
