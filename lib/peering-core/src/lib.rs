//! Core peering machinery shared by every cloud backend
//!
//! This library provides:
//! - The error taxonomy and step-context wrapping
//! - CIDR overlap validation
//! - Bounded fixed-delay retries and their configuration
//! - State tracking for the create/cleanup state machines
//! - Fault injection for the in-memory provider sandboxes

pub mod cidr;
pub mod config;
pub mod error;
pub mod fault;
pub mod retry;
pub mod state;

pub use cidr::validate_no_overlap;
pub use config::PeeringRetryConfig;
pub use error::{ErrorKind, PeeringError, Result, ResultExt, TransportError};
pub use fault::{Fault, FaultInjector};
pub use retry::{retry_with_fixed_delay, RetryPolicy};
pub use state::StateTracker;
