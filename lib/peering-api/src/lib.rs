//! Shared types for cross-cloud VPC peering
//!
//! This library defines the provider-neutral model used by every cloud backend:
//! - NetworkEndpoint: which cloud and which cluster infrastructure a call acts on
//! - ResolvedVpc / PeeringConnection / RouteTable: remote objects fetched per operation
//! - PortSpec: ports opened for Submariner on each cluster
//! - Reporter: sink for user-facing progress messages

pub mod endpoint;
pub mod ports;
pub mod reporter;
pub mod vpc;

pub use endpoint::{NetworkEndpoint, ProviderKind};
pub use ports::{format_ports, PortSpec, PrepareForSubmarinerInput, Protocol};
pub use reporter::{LoggingReporter, NoopReporter, RecordingReporter, ReportEvent, Reporter};
pub use vpc::{peering_name, PeeringConnection, PeeringState, ResolvedVpc, Route, RouteTable, VpcInfo};
