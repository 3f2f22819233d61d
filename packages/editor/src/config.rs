//! History configuration

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of undo events kept per branch.
    pub depth: usize,

    /// Edits closer together than this (in milliseconds) share an event.
    pub event_delay_ms: u64,

    /// Whether undoing right after a redo (or the reverse) may drop the
    /// maps of both instead of stacking up more.
    pub allow_collapsing: bool,
}

impl HistoryConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: HistoryConfig = serde_json::from_str(json)?;
        if config.depth == 0 {
            return Err(ConfigError::Invalid {
                field: "depth",
                reason: "must keep at least one event".to_string(),
            });
        }
        Ok(config)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            depth: 100,
            event_delay_ms: 500,
            allow_collapsing: true,
        }
    }
}
