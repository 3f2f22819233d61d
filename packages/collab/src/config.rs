//! Collaboration configuration

use quire_editor::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    /// Local steps allowed to wait for confirmation before further edits
    /// are refused.
    pub max_unconfirmed: usize,

    /// How long one exchange with the hub may take.
    pub request_timeout_ms: u64,

    pub retry: RetryPolicy,
}

impl CollabConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: CollabConfig = serde_json::from_str(json)?;
        if config.max_unconfirmed == 0 {
            return Err(ConfigError::Invalid {
                field: "max_unconfirmed",
                reason: "must allow at least one step".to_string(),
            });
        }
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            max_unconfirmed: 1000,
            request_timeout_ms: 5000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Exponential backoff after transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failed exchanges in a row after which the client gives up and
    /// disconnects.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        assert_eq!(policy.delay(5), Duration::from_millis(1000));
        assert_eq!(policy.delay(200), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_json() {
        let config = CollabConfig::from_json_str(r#"{"retry": {"max_attempts": 2}}"#).unwrap();
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.max_unconfirmed, 1000);
    }

    #[test]
    fn test_zero_unconfirmed_is_rejected() {
        assert!(CollabConfig::from_json_str(r#"{"max_unconfirmed": 0}"#).is_err());
    }
}
