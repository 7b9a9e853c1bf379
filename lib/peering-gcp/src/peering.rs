//! Network peering between two GCP cluster networks
//!
//! GCP peering is symmetric: each network adds a peering towards the other
//! and routes are exchanged automatically once both sides exist.

use crate::client::AddPeeringRequest;
use crate::GcpCloud;
use peering_api::Reporter;
use peering_core::{retry_with_fixed_delay, PeeringError, Result, ResultExt, RetryPolicy, StateTracker};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkPeeringStep {
    Idle,
    SourceNetwork,
    TargetNetwork,
}

impl GcpCloud {
    /// Request body for a peering added on this side's network towards
    /// `peer_network`
    pub fn add_peering_request(&self, peer_network: String) -> AddPeeringRequest {
        AddPeeringRequest {
            name: self.peering_name(),
            peer_network,
            auto_create_routes: true,
            import_custom_routes: None,
            export_custom_routes: None,
        }
    }

    pub async fn create_vpc_peering(&self, target: &GcpCloud, reporter: &dyn Reporter) -> Result<()> {
        reporter.started(&format!(
            "Started VPC Peering between \"{}\" and \"{}\"",
            self.network_url(),
            target.network_url()
        ));

        let mut tracker = StateTracker::new("create GCP network peering", NetworkPeeringStep::Idle);

        if let Err(e) = self
            .peer_network(self.add_peering_request(target.network_url()))
            .await
            .with_context(|| format!("unable to peer source network {}", self.network_name()))
        {
            return Err(tracker.fail(e, reporter));
        }
        tracker.advance(NetworkPeeringStep::SourceNetwork);

        if let Err(e) = target
            .peer_network(target.add_peering_request(self.network_url()))
            .await
            .with_context(|| format!("unable to peer target network {}", target.network_name()))
        {
            return Err(tracker.fail(e, reporter));
        }
        tracker.advance(NetworkPeeringStep::TargetNetwork);

        reporter.succeeded(&format!(
            "Peered VPCs \"{}\" and \"{}\"",
            self.network_name(),
            target.network_name()
        ));
        Ok(())
    }

    /// Remove both halves of the peering. Each removal goes through this
    /// side's deletion retry policy: the second one is refused while the
    /// first is still being applied.
    pub async fn cleanup_vpc_peering(&self, target: &GcpCloud, reporter: &dyn Reporter) -> Result<()> {
        reporter.started(&format!(
            "Started Removing VPC Peering between \"{}\" and \"{}\"",
            self.network_url(),
            target.network_url()
        ));

        let mut tracker = StateTracker::new("cleanup GCP network peering", NetworkPeeringStep::Idle);

        if let Err(e) = self
            .remove_network_peering(&self.retry.delete)
            .await
            .with_context(|| format!("unable to remove peering from source network {}", self.network_name()))
        {
            return Err(tracker.fail(e, reporter));
        }
        tracker.advance(NetworkPeeringStep::SourceNetwork);

        if let Err(e) = target
            .remove_network_peering(&self.retry.delete)
            .await
            .with_context(|| format!("unable to remove peering from target network {}", target.network_name()))
        {
            return Err(tracker.fail(e, reporter));
        }
        tracker.advance(NetworkPeeringStep::TargetNetwork);

        reporter.succeeded(&format!(
            "Removed Peering between VPCs \"{}\" and \"{}\"",
            self.network_name(),
            target.network_name()
        ));
        Ok(())
    }

    async fn peer_network(&self, request: AddPeeringRequest) -> Result<()> {
        let network = self.network_name();
        self.client
            .add_peering(self.project_id(), &network, &request)
            .await
            .map_err(PeeringError::from)?;

        info!(
            network = %network,
            peering = %request.name,
            peer_network = %request.peer_network,
            "Added network peering"
        );
        Ok(())
    }

    async fn remove_network_peering(&self, policy: &RetryPolicy) -> Result<()> {
        let network = self.network_name();
        let peering = self.peering_name();

        retry_with_fixed_delay(
            policy,
            &format!("remove network peering {}", peering),
            || self.remove_peering_once(&network, &peering),
        )
        .await?;

        info!(network = %network, peering = %peering, "Removed network peering");
        Ok(())
    }

    async fn remove_peering_once(&self, network: &str, peering: &str) -> Result<()> {
        self.client
            .remove_peering(self.project_id(), network, peering)
            .await
            .map_err(PeeringError::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{MockComputeApi, NetworkPeeringState};
    use crate::sandbox::{ComputeOperation, ComputeSandbox};
    use crate::GcpCloud;
    use peering_api::{NetworkEndpoint, RecordingReporter, ReportEvent};
    use peering_core::{ErrorKind, Fault, PeeringRetryConfig, RetryPolicy, TransportError};
    use std::sync::Arc;

    async fn sandbox_clouds() -> (ComputeSandbox, GcpCloud, GcpCloud) {
        let sandbox = ComputeSandbox::new();
        sandbox.add_network("project-a", "cluster-a").await;
        sandbox.add_network("project-b", "cluster-b").await;

        let a = GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(sandbox.client()),
        )
        .with_retry_config(PeeringRetryConfig::without_delay());
        let b = GcpCloud::new(
            NetworkEndpoint::new("cluster-b", "europe-west1").with_project("project-b"),
            Arc::new(sandbox.client()),
        )
        .with_retry_config(PeeringRetryConfig::without_delay());

        (sandbox, a, b)
    }

    #[test]
    fn test_add_peering_request() {
        let cloud = GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(MockComputeApi::new()),
        );
        let request = cloud.add_peering_request("projects/project-b/global/networks/cluster-b-network".to_string());
        assert_eq!(request.name, "cluster-a-peering");
        assert!(request.auto_create_routes);
        assert_eq!(request.import_custom_routes, None);
        assert_eq!(request.export_custom_routes, None);
    }

    #[tokio::test]
    async fn test_create_peers_both_networks() {
        let (sandbox, a, b) = sandbox_clouds().await;
        let reporter = RecordingReporter::new();

        a.create_vpc_peering(&b, &reporter).await.unwrap();

        let peerings_a = sandbox.peerings("project-a", "cluster-a-network").await;
        assert_eq!(peerings_a.len(), 1);
        assert_eq!(peerings_a[0].name, "cluster-a-peering");
        assert_eq!(peerings_a[0].peer_network, "projects/project-b/global/networks/cluster-b-network");
        assert_eq!(peerings_a[0].state, NetworkPeeringState::Active);
        assert!(peerings_a[0].auto_create_routes);

        let peerings_b = sandbox.peerings("project-b", "cluster-b-network").await;
        assert_eq!(peerings_b[0].name, "cluster-b-peering");
        assert_eq!(peerings_b[0].peer_network, "projects/project-a/global/networks/cluster-a-network");
        assert_eq!(peerings_b[0].state, NetworkPeeringState::Active);

        assert!(matches!(reporter.events().last(), Some(ReportEvent::Succeeded(_))));
    }

    #[tokio::test]
    async fn test_create_stops_after_source_failure() {
        let mut mock = MockComputeApi::new();
        mock.expect_add_peering()
            .withf(|project, network, request| {
                project == "project-a" && network == "cluster-a-network" && request.name == "cluster-a-peering"
            })
            .times(1)
            .returning(|_, _, _| Err(TransportError::new("quota exceeded")));
        let mut target_mock = MockComputeApi::new();
        target_mock.expect_add_peering().never();

        let a = GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(mock),
        );
        let b = GcpCloud::new(
            NetworkEndpoint::new("cluster-b", "us-central1").with_project("project-b"),
            Arc::new(target_mock),
        );
        let reporter = RecordingReporter::new();

        let err = a.create_vpc_peering(&b, &reporter).await.unwrap_err();
        assert_eq!(err.to_string(), "unable to peer source network cluster-a-network: quota exceeded");
        assert_eq!(reporter.failures(), vec![err.to_string()]);
    }

    #[tokio::test]
    async fn test_create_target_failure_keeps_source_peering() {
        let (sandbox, a, b) = sandbox_clouds().await;
        let client = sandbox.client();
        client.inject(
            ComputeOperation::AddPeering,
            Fault::always(TransportError::with_code("forbidden", "missing compute.networks.addPeering")),
        );
        let b = GcpCloud::new(b.endpoint().clone(), Arc::new(client));

        let err = a.create_vpc_peering(&b, &RecordingReporter::new()).await.unwrap_err();
        assert!(err.to_string().starts_with("unable to peer target network cluster-b-network"));

        let peerings_a = sandbox.peerings("project-a", "cluster-a-network").await;
        assert_eq!(peerings_a.len(), 1);
        assert_eq!(peerings_a[0].state, NetworkPeeringState::Inactive);
    }

    #[tokio::test]
    async fn test_cleanup_removes_both_sides() {
        let (sandbox, a, b) = sandbox_clouds().await;
        a.create_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();

        a.cleanup_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();
        assert!(sandbox.peerings("project-a", "cluster-a-network").await.is_empty());
        assert!(sandbox.peerings("project-b", "cluster-b-network").await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_retries_while_peering_settles() {
        let (sandbox, a, b) = sandbox_clouds().await;
        a.create_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();

        let client = sandbox.client();
        let b = GcpCloud::new(b.endpoint().clone(), Arc::new(client.clone()))
            .with_retry_config(PeeringRetryConfig::without_delay());
        client.inject(
            ComputeOperation::RemovePeering,
            Fault::times(4, TransportError::with_code("resourceNotReady", "operation in progress")),
        );

        a.cleanup_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();
        assert_eq!(client.count(ComputeOperation::RemovePeering), 5);
        assert!(sandbox.peerings("project-b", "cluster-b-network").await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_uses_source_retry_policy() {
        let (sandbox, a, b) = sandbox_clouds().await;
        a.create_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();

        // The target allows a single attempt; the source policy still applies
        let client = sandbox.client();
        let b = GcpCloud::new(b.endpoint().clone(), Arc::new(client.clone())).with_retry_config(PeeringRetryConfig {
            delete: RetryPolicy::immediate(1),
            ..PeeringRetryConfig::without_delay()
        });
        client.inject(
            ComputeOperation::RemovePeering,
            Fault::times(2, TransportError::with_code("resourceNotReady", "operation in progress")),
        );

        a.cleanup_vpc_peering(&b, &RecordingReporter::new()).await.unwrap();
        assert_eq!(client.count(ComputeOperation::RemovePeering), 3);
        assert!(sandbox.peerings("project-b", "cluster-b-network").await.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_exhausts_retries() {
        let mut mock = MockComputeApi::new();
        mock.expect_remove_peering()
            .times(10)
            .returning(|_, _, _| Err(TransportError::with_code("resourceNotReady", "operation in progress")));

        let a = GcpCloud::new(
            NetworkEndpoint::new("cluster-a", "us-central1").with_project("project-a"),
            Arc::new(mock),
        )
        .with_retry_config(PeeringRetryConfig::without_delay());
        let b = GcpCloud::new(
            NetworkEndpoint::new("cluster-b", "us-central1").with_project("project-b"),
            Arc::new(MockComputeApi::new()),
        );

        let err = a.cleanup_vpc_peering(&b, &RecordingReporter::new()).await.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("unable to remove peering from source network cluster-a-network"));
        assert_eq!(err.kind(), ErrorKind::ExhaustedRetries);
    }
}
