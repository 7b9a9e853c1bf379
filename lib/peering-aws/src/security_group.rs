//! Intra-cluster ports on the worker security group

use crate::client::{IngressPermission, SecurityGroup, DUPLICATE_PERMISSION, PERMISSION_NOT_FOUND};
use crate::AwsCloud;
use peering_api::{format_ports, PortSpec, PrepareForSubmarinerInput, Reporter};
use peering_core::{PeeringError, Result, ResultExt};
use tracing::debug;

impl AwsCloud {
    /// Allow the given ports between worker nodes
    pub async fn prepare_for_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        reporter.started(&format!(
            "Opening internal ports {} for intra-cluster communications on AWS",
            format_ports(&input.internal_ports)
        ));

        match self.open_internal_ports(&input.internal_ports).await {
            Ok(()) => {
                reporter.succeeded(&format!(
                    "Opened internal ports {} for intra-cluster communications on AWS",
                    format_ports(&input.internal_ports)
                ));
                Ok(())
            }
            Err(e) => {
                reporter.failed(&e);
                Err(e)
            }
        }
    }

    /// Revoke the ports opened by [`AwsCloud::prepare_for_submariner`]
    pub async fn cleanup_after_submariner(
        &self,
        input: &PrepareForSubmarinerInput,
        reporter: &dyn Reporter,
    ) -> Result<()> {
        reporter.started(&format!(
            "Revoking intra-cluster communication permissions for ports {}",
            format_ports(&input.internal_ports)
        ));

        match self.close_internal_ports(&input.internal_ports).await {
            Ok(()) => {
                reporter.succeeded("Revoked intra-cluster communication permissions");
                Ok(())
            }
            Err(e) => {
                reporter.failed(&e);
                Err(e)
            }
        }
    }

    async fn worker_security_group(&self) -> Result<SecurityGroup> {
        let vpc = self.resolve_vpc().await?;
        let name = self.worker_security_group_name();

        let mut groups = self
            .client
            .describe_security_groups(&vpc.vpc_id, &name)
            .await
            .with_context(|| format!("unable to describe security group {}", name))?;

        match groups.len() {
            1 => Ok(groups.remove(0)),
            0 => Err(PeeringError::not_found("security group", name)),
            count => Err(PeeringError::cardinality("SecurityGroups", count)),
        }
    }

    async fn open_internal_ports(&self, ports: &[PortSpec]) -> Result<()> {
        let group = self.worker_security_group().await?;

        for permission in ingress_permissions(&group.group_id, ports) {
            match self
                .client
                .authorize_security_group_ingress(&group.group_id, std::slice::from_ref(&permission))
                .await
            {
                Ok(()) => {}
                Err(e) if e.has_code(DUPLICATE_PERMISSION) => {
                    debug!(group_id = %group.group_id, port = permission.port, "Ingress permission already present");
                }
                Err(e) => {
                    return Err(PeeringError::from(e).context(format!(
                        "unable to authorize port {}/{} on {}",
                        permission.port, permission.protocol, group.group_name
                    )))
                }
            }
        }

        Ok(())
    }

    async fn close_internal_ports(&self, ports: &[PortSpec]) -> Result<()> {
        let group = self.worker_security_group().await?;

        for permission in ingress_permissions(&group.group_id, ports) {
            match self
                .client
                .revoke_security_group_ingress(&group.group_id, std::slice::from_ref(&permission))
                .await
            {
                Ok(()) => {}
                Err(e) if e.has_code(PERMISSION_NOT_FOUND) => {
                    debug!(group_id = %group.group_id, port = permission.port, "Ingress permission already gone");
                }
                Err(e) => {
                    return Err(PeeringError::from(e).context(format!(
                        "unable to revoke port {}/{} on {}",
                        permission.port, permission.protocol, group.group_name
                    )))
                }
            }
        }

        Ok(())
    }
}

/// Self-referencing rules: members of the group may reach each other
fn ingress_permissions(group_id: &str, ports: &[PortSpec]) -> Vec<IngressPermission> {
    ports
        .iter()
        .map(|port| IngressPermission {
            protocol: port.protocol,
            port: port.port,
            source_group_id: group_id.to_string(),
        })
        .collect()
}
