//! Azure backend: network security group rules for Submariner.
//!
//! VPC peering is not available on Azure.

pub mod client;
pub mod cloud;
pub mod sandbox;

pub use client::NsgApi;
pub use cloud::AzureCloud;
pub use sandbox::{NsgOperation, NsgSandbox, SandboxNsgClient};
