//! Step tracking for the peering state machines

use crate::PeeringError;
use peering_api::Reporter;
use std::fmt::Debug;
use tracing::{debug, warn};

/// Current step of a one-shot peering operation.
///
/// Any failure moves the operation straight to failed; the last reached
/// step is logged alongside the error.
pub struct StateTracker<S> {
    operation: &'static str,
    state: S,
}

impl<S: Copy + Debug> StateTracker<S> {
    pub fn new(operation: &'static str, initial: S) -> Self {
        Self {
            operation,
            state: initial,
        }
    }

    pub fn state(&self) -> S {
        self.state
    }

    pub fn advance(&mut self, next: S) {
        debug!(
            operation = self.operation,
            from = ?self.state,
            to = ?next,
            "Peering state transition"
        );
        self.state = next;
    }

    /// Report `error` as the failure of the step after the current one
    pub fn fail(&self, error: PeeringError, reporter: &dyn Reporter) -> PeeringError {
        warn!(
            operation = self.operation,
            last_state = ?self.state,
            error = %error,
            "Peering operation failed"
        );
        reporter.failed(&error);
        error
    }
}
