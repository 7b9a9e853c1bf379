//! GCP backend: network peering between two cluster networks and the
//! firewall rule Submariner needs inside a cluster.

pub mod client;
pub mod cloud;
pub mod peering;
pub mod sandbox;

pub use client::ComputeApi;
pub use cloud::{network_url, GcpCloud};
pub use peering::NetworkPeeringStep;
pub use sandbox::{ComputeOperation, ComputeSandbox, SandboxComputeClient};
