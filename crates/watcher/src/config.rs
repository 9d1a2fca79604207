//! Watcher configuration

use crate::error::{Result, WatchError};
use crate::ignore::IgnoreConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest accepted poll interval in milliseconds
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

/// Largest accepted poll interval in milliseconds (one hour)
pub const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

/// Watcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Delay between two polls (default: 500ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Which entries are left out of snapshots
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check that values are within their valid ranges
    pub fn validate(&self) -> Result<()> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(WatchError::Config(format!(
                "poll_interval_ms must be between {} and {} (got {})",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, self.poll_interval_ms
            )));
        }
        Ok(())
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            ignore: IgnoreConfig::default(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let zero = WatcherConfig {
            poll_interval_ms: 0,
            ..WatcherConfig::default()
        };
        assert!(matches!(zero.validate(), Err(WatchError::Config(_))));

        let too_long = WatcherConfig {
            poll_interval_ms: MAX_POLL_INTERVAL_MS + 1,
            ..WatcherConfig::default()
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let config: WatcherConfig = serde_json::from_str(r#"{"ignore": {"patterns": ["*.tmp"]}}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.ignore.patterns, vec!["*.tmp".to_string()]);
        assert!(config.ignore.ignore_hidden);
    }
}
