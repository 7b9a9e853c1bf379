//! AWS backend: VPC peering between two cluster VPCs and the worker
//! security group rules Submariner needs.

pub mod client;
pub mod cloud;
pub mod orchestrator;
pub mod peering;
pub mod routes;
pub mod sandbox;
pub mod security_group;
pub mod vpc;

pub use client::Ec2Api;
pub use cloud::AwsCloud;
pub use orchestrator::{CleanupState, CreateState};
pub use sandbox::{Ec2Operation, Ec2Sandbox, SandboxEc2Client};
