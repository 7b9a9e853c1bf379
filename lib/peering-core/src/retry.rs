//! Bounded retries with a fixed delay between attempts.
//!
//! Remote objects need a moment to settle after the previous state-changing
//! call: a just-requested peering is not yet visible for acceptance, and a
//! connection being torn down on one side cannot be removed from the other
//! until that finishes. A retry re-issues only the wrapped operation, never
//! the steps that came before it.

use crate::{PeeringError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Attempt count and delay for one retried step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay between two attempts, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Policy retrying without waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Run `operation` until it succeeds or `policy.max_attempts` are used up.
///
/// Exhaustion yields [`PeeringError::ExhaustedRetries`] wrapping the last
/// failure. A policy of zero attempts still runs the operation once.
pub async fn retry_with_fixed_delay<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(PeeringError::ExhaustedRetries {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = policy.delay_ms,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}
