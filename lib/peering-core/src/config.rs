//! Retry tuning for the peering steps that tolerate settling delays

use crate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Attempts for accepting a freshly requested peering
pub const DEFAULT_ACCEPT_ATTEMPTS: u32 = 3;
/// Attempts for installing the routes on both sides
pub const DEFAULT_ROUTE_ATTEMPTS: u32 = 3;
/// Attempts for removing a peering connection
pub const DEFAULT_DELETE_ATTEMPTS: u32 = 10;

const DEFAULT_ACCEPT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_ROUTE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_DELETE_DELAY: Duration = Duration::from_secs(10);

/// Retry policies applied by the peering orchestrators.
///
/// Each step may be overridden partially; a field left out keeps that
/// step's default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RetryOverrides")]
pub struct PeeringRetryConfig {
    /// Accepting the peering from the target side
    pub accept: RetryPolicy,

    /// Creating the route on each side, retried as one unit
    pub routes: RetryPolicy,

    /// Deleting the peering connection
    pub delete: RetryPolicy,
}

/// A retry policy as written in configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyOverride {
    max_attempts: Option<u32>,
    delay_ms: Option<u64>,
}

impl PolicyOverride {
    fn apply(self, default: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
            delay_ms: self.delay_ms.unwrap_or(default.delay_ms),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
struct RetryOverrides {
    accept: PolicyOverride,
    routes: PolicyOverride,
    delete: PolicyOverride,
}

impl From<RetryOverrides> for PeeringRetryConfig {
    fn from(overrides: RetryOverrides) -> Self {
        Self {
            accept: overrides.accept.apply(default_accept()),
            routes: overrides.routes.apply(default_routes()),
            delete: overrides.delete.apply(default_delete()),
        }
    }
}

impl Default for PeeringRetryConfig {
    fn default() -> Self {
        Self {
            accept: default_accept(),
            routes: default_routes(),
            delete: default_delete(),
        }
    }
}

impl PeeringRetryConfig {
    /// Default attempt counts with no delay between attempts
    pub fn without_delay() -> Self {
        Self {
            accept: RetryPolicy::immediate(DEFAULT_ACCEPT_ATTEMPTS),
            routes: RetryPolicy::immediate(DEFAULT_ROUTE_ATTEMPTS),
            delete: RetryPolicy::immediate(DEFAULT_DELETE_ATTEMPTS),
        }
    }
}

fn default_accept() -> RetryPolicy {
    RetryPolicy::new(DEFAULT_ACCEPT_ATTEMPTS, DEFAULT_ACCEPT_DELAY)
}

fn default_routes() -> RetryPolicy {
    RetryPolicy::new(DEFAULT_ROUTE_ATTEMPTS, DEFAULT_ROUTE_DELAY)
}

fn default_delete() -> RetryPolicy {
    RetryPolicy::new(DEFAULT_DELETE_ATTEMPTS, DEFAULT_DELETE_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PeeringRetryConfig::default();
        assert_eq!(config.accept.max_attempts, 3);
        assert_eq!(config.accept.delay(), Duration::from_secs(5));
        assert_eq!(config.routes.max_attempts, 3);
        assert_eq!(config.delete.max_attempts, 10);
        assert_eq!(config.delete.delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_without_delay_keeps_attempts() {
        let config = PeeringRetryConfig::without_delay();
        assert_eq!(config.accept.max_attempts, DEFAULT_ACCEPT_ATTEMPTS);
        assert_eq!(config.delete.max_attempts, DEFAULT_DELETE_ATTEMPTS);
        assert_eq!(config.routes.delay(), Duration::ZERO);
    }

    #[test]
    fn test_partial_override_keeps_step_defaults() {
        let config: PeeringRetryConfig = serde_yaml::from_str(
            r#"
delete:
  maxAttempts: 20
accept:
  delayMs: 1000
"#,
        )
        .unwrap();

        assert_eq!(config.delete.max_attempts, 20);
        assert_eq!(config.delete.delay(), Duration::from_secs(10));
        assert_eq!(config.accept.max_attempts, DEFAULT_ACCEPT_ATTEMPTS);
        assert_eq!(config.accept.delay(), Duration::from_secs(1));
        assert_eq!(config.routes, default_routes());
    }

    #[test]
    fn test_explicit_zero_delay() {
        let config: PeeringRetryConfig = serde_yaml::from_str("routes:\n  delayMs: 0\n").unwrap();
        assert_eq!(config.routes.delay(), Duration::ZERO);
        assert_eq!(config.routes.max_attempts, DEFAULT_ROUTE_ATTEMPTS);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: PeeringRetryConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, PeeringRetryConfig::default());
    }
}
