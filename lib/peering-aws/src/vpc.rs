//! VPC and main route table lookups

use crate::AwsCloud;
use peering_api::ResolvedVpc;
use peering_core::{PeeringError, Result};
use tracing::debug;

impl AwsCloud {
    /// Look up the cluster VPC by its `Name` tag.
    ///
    /// Exactly one VPC must match. Nothing is cached: every call goes to EC2.
    pub async fn resolve_vpc(&self) -> Result<ResolvedVpc> {
        let name = self.vpc_name();
        let vpcs = self.client.describe_vpcs(&name).await?;

        let vpc = match vpcs.as_slice() {
            [vpc] => vpc,
            [] => return Err(PeeringError::not_found("VPC", name)),
            many => return Err(PeeringError::cardinality("Vpcs", many.len())),
        };

        let cidr_block = vpc
            .cidr_block
            .clone()
            .ok_or_else(|| PeeringError::not_found("CIDR block", vpc.vpc_id.as_str()))?;

        debug!(vpc_id = %vpc.vpc_id, cidr = %cidr_block, region = %self.region(), "Resolved VPC");

        Ok(ResolvedVpc {
            vpc_id: vpc.vpc_id.clone(),
            cidr_block,
        })
    }

    /// ID of the main route table of `vpc_id`
    pub async fn route_table_id(&self, vpc_id: &str) -> Result<String> {
        let tables = self.client.describe_route_tables(vpc_id).await?;

        match tables.as_slice() {
            [table] => Ok(table.route_table_id.clone()),
            [] => Err(PeeringError::not_found("route table", vpc_id)),
            many => Err(PeeringError::cardinality("RouteTables", many.len())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{MockEc2Api, Vpc};
    use crate::AwsCloud;
    use peering_api::{NetworkEndpoint, RouteTable};
    use peering_core::{ErrorKind, TransportError};
    use std::sync::Arc;

    fn vpc(id: &str, cidr: Option<&str>) -> Vpc {
        Vpc {
            vpc_id: id.to_string(),
            cidr_block: cidr.map(str::to_string),
            tags: Vec::new(),
        }
    }

    fn table(id: &str, vpc_id: &str) -> RouteTable {
        RouteTable {
            route_table_id: id.to_string(),
            vpc_id: vpc_id.to_string(),
            main: true,
            routes: Vec::new(),
        }
    }

    fn cloud(mock: MockEc2Api) -> AwsCloud {
        AwsCloud::new(NetworkEndpoint::new("test-infraID", "test-region"), Arc::new(mock))
    }

    #[tokio::test]
    async fn test_resolve_vpc_filters_by_name_tag() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_vpcs()
            .withf(|name| name == "test-infraID-vpc")
            .times(1)
            .returning(|_| Ok(vec![vpc("vpc-a", Some("10.0.0.0/16"))]));

        let resolved = cloud(mock).resolve_vpc().await.unwrap();
        assert_eq!(resolved.vpc_id, "vpc-a");
        assert_eq!(resolved.cidr_block, "10.0.0.0/16");
    }

    #[tokio::test]
    async fn test_resolve_vpc_requires_exactly_one() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_vpcs().times(1).returning(|_| Ok(Vec::new()));
        let err = cloud(mock).resolve_vpc().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut mock = MockEc2Api::new();
        mock.expect_describe_vpcs()
            .times(1)
            .returning(|_| Ok(vec![vpc("vpc-a", Some("10.0.0.0/16")), vpc("vpc-b", Some("10.1.0.0/16"))]));
        let err = cloud(mock).resolve_vpc().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cardinality);
        assert_eq!(err.to_string(), "expecting exactly 1 Vpcs, got 2");
    }

    #[tokio::test]
    async fn test_resolve_vpc_without_cidr() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_vpcs().returning(|_| Ok(vec![vpc("vpc-a", None)]));

        let err = cloud(mock).resolve_vpc().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("vpc-a"));
    }

    #[tokio::test]
    async fn test_resolve_vpc_transport_error() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_vpcs()
            .returning(|_| Err(TransportError::new("some error")));

        let err = cloud(mock).resolve_vpc().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_route_table_id() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_route_tables()
            .withf(|vpc_id| vpc_id == "vpc-a")
            .times(1)
            .returning(|vpc_id| Ok(vec![table("rtb-a", vpc_id)]));

        let id = cloud(mock).route_table_id("vpc-a").await.unwrap();
        assert_eq!(id, "rtb-a");
    }

    #[tokio::test]
    async fn test_route_table_id_cardinality() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_route_tables().times(1).returning(|_| Ok(Vec::new()));
        let err = cloud(mock).route_table_id("vpc-a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let mut mock = MockEc2Api::new();
        mock.expect_describe_route_tables()
            .times(1)
            .returning(|vpc_id| Ok(vec![table("rtb-1", vpc_id), table("rtb-2", vpc_id)]));
        let err = cloud(mock).route_table_id("vpc-a").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cardinality);
    }

    #[tokio::test]
    async fn test_route_table_id_transport_error() {
        let mut mock = MockEc2Api::new();
        mock.expect_describe_route_tables()
            .returning(|_| Err(TransportError::new("Route Table not Found")));

        let err = cloud(mock).route_table_id("").await.unwrap_err();
        assert!(err.to_string().contains("Route Table not Found"));
    }
}
