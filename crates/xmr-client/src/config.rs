//! Client configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Seconds between watchdog checks.
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,

    /// Seconds without traffic after which a connection counts as stale.
    #[serde(default = "default_liveness_window")]
    pub liveness_window_secs: u64,

    /// Capacity of the broadcast event stream.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_watchdog_interval() -> u64 {
    60
}

fn default_liveness_window() -> u64 {
    15 * 60 // 15 minutes
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            watchdog_interval_secs: default_watchdog_interval(),
            liveness_window_secs: default_liveness_window(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ClientConfig {
    /// Watchdog period. Never zero.
    #[must_use]
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }

    /// Liveness window as a wall-clock span.
    #[must_use]
    pub fn liveness_window(&self) -> TimeDelta {
        i64::try_from(self.liveness_window_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.watchdog_interval(), Duration::from_secs(60));
        assert_eq!(config.liveness_window(), TimeDelta::minutes(15));
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ClientConfig {
            watchdog_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.watchdog_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"liveness_window_secs": 120}"#).unwrap();
        assert_eq!(config.liveness_window(), TimeDelta::minutes(2));
        assert_eq!(config.watchdog_interval_secs, 60);
    }
}
