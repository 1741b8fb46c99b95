//! Arena timing and capacity settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::replay::DEFAULT_SNAPSHOT_INTERVAL;
use crate::stream::{DEFAULT_BUFFER_CAPACITY, DEFAULT_SUBSCRIBER_QUEUE};

/// Arena configuration shared by the coordinator and every table runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Seconds the acting seat has to submit an action (default: 30)
    pub action_timeout_secs: u64,

    /// Seconds a disconnected seat may take to reconnect (default: 30)
    pub reconnect_grace_secs: u64,

    /// Absolute session lifetime in seconds (default: 6 hours)
    pub session_ttl_secs: u64,

    /// Events retained per session/table buffer (default: 500)
    pub event_buffer_capacity: usize,

    /// Per-subscriber delivery queue (default: 64)
    pub subscriber_queue_capacity: usize,

    /// Replay events between snapshots (default: 80)
    pub snapshot_interval: u64,

    /// Turn/reconnect deadline sweep period in milliseconds (default: 500)
    pub table_sweep_interval_ms: u64,

    /// Session expiry sweep period in seconds (default: 60)
    pub session_sweep_interval_secs: u64,

    /// Push-stream keep-alive period in seconds (default: 15)
    pub keepalive_secs: u64,

    /// Longest accepted request id (default: 64)
    pub max_request_id_len: usize,

    /// Prefix for per-session stream URLs
    pub stream_base_url: String,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: 30,
            reconnect_grace_secs: 30,
            session_ttl_secs: 6 * 60 * 60,
            event_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            table_sweep_interval_ms: 500,
            session_sweep_interval_secs: 60,
            keepalive_secs: 15,
            max_request_id_len: 64,
            stream_base_url: "/v1/sessions".to_string(),
        }
    }
}

impl ArenaConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.action_timeout_secs == 0 {
            return Err("Action timeout must be positive".to_string());
        }
        if self.reconnect_grace_secs == 0 {
            return Err("Reconnect grace must be positive".to_string());
        }
        if self.session_ttl_secs <= self.action_timeout_secs {
            return Err("Session TTL must exceed the action timeout".to_string());
        }
        if self.event_buffer_capacity == 0 || self.subscriber_queue_capacity == 0 {
            return Err("Event buffer and subscriber queue must be non-empty".to_string());
        }
        if self.snapshot_interval == 0 {
            return Err("Snapshot interval must be positive".to_string());
        }
        if self.table_sweep_interval_ms == 0 || self.session_sweep_interval_secs == 0 {
            return Err("Sweep intervals must be positive".to_string());
        }
        if self.table_sweep_interval_ms > self.action_timeout_secs * 1000 {
            return Err("Table sweep must run at least once per action timeout".to_string());
        }
        if self.keepalive_secs == 0 {
            return Err("Keep-alive interval must be positive".to_string());
        }
        if self.max_request_id_len == 0 {
            return Err("Request id length limit must be positive".to_string());
        }
        Ok(())
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn reconnect_grace(&self) -> Duration {
        Duration::from_secs(self.reconnect_grace_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn table_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.table_sweep_interval_ms)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// Stream URL handed to a joining session
    pub fn stream_url(&self, session_id: impl std::fmt::Display) -> String {
        format!(
            "{}/{session_id}/events",
            self.stream_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ArenaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_buffer_capacity, 500);
        assert_eq!(config.snapshot_interval, 80);
        assert_eq!(config.table_sweep_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = ArenaConfig {
            reconnect_grace_secs: 0,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ArenaConfig {
            snapshot_interval: 0,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sweep_slower_than_timeout_rejected() {
        let config = ArenaConfig {
            action_timeout_secs: 1,
            table_sweep_interval_ms: 5_000,
            ..ArenaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_url() {
        let config = ArenaConfig {
            stream_base_url: "https://arena.example/v1/sessions/".to_string(),
            ..ArenaConfig::default()
        };
        assert_eq!(
            config.stream_url("abc"),
            "https://arena.example/v1/sessions/abc/events"
        );
    }
}
