//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use holdem_arena::{db::DatabaseConfig, session::Room, table::ArenaConfig};
use std::net::SocketAddr;

/// Overrides taken from the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub database_url: Option<String>,
    pub metrics_bind: Option<SocketAddr>,
    pub in_memory: bool,
    pub apply_schema: bool,
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database configuration (unused in memory mode)
    pub database: DatabaseConfig,
    /// Keep all state in process memory instead of PostgreSQL
    pub in_memory: bool,
    /// Create the schema on startup if it does not exist
    pub apply_schema: bool,
    /// Prometheus scrape address, if metrics are enabled
    pub metrics_bind: Option<SocketAddr>,
    /// Timing and capacity settings for the coordinator
    pub arena: ArenaConfig,
    /// Room created or updated on startup
    pub room: Room,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), overrides)
    }

    /// Load configuration through `lookup` instead of the process
    /// environment
    pub fn from_lookup<F>(lookup: F, overrides: CliOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let in_memory = overrides.in_memory || parse_or(&lookup, "ARENA_IN_MEMORY", false);

        let database_url = match overrides.database_url.or_else(|| lookup("DATABASE_URL")) {
            Some(url) => url,
            None if in_memory => String::new(),
            None => {
                return Err(ConfigError::MissingRequired {
                    var: "DATABASE_URL".to_string(),
                    hint: "Set a PostgreSQL URL or run with --in-memory".to_string(),
                });
            }
        };

        let db_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", db_defaults.max_connections),
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", db_defaults.min_connections),
            connection_timeout_secs: parse_or(
                &lookup,
                "DB_CONNECTION_TIMEOUT_SECS",
                db_defaults.connection_timeout_secs,
            ),
            idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", db_defaults.idle_timeout_secs),
            max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", db_defaults.max_lifetime_secs),
        };

        let metrics_bind = match overrides.metrics_bind {
            Some(addr) => Some(addr),
            None => match lookup("METRICS_BIND") {
                Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{raw}' is not an IP:PORT address"),
                })?),
                None => None,
            },
        };

        let defaults = ArenaConfig::default();
        let arena = ArenaConfig {
            action_timeout_secs: parse_or(&lookup, "ACTION_TIMEOUT_SECS", defaults.action_timeout_secs),
            reconnect_grace_secs: parse_or(&lookup, "RECONNECT_GRACE_SECS", defaults.reconnect_grace_secs),
            session_ttl_secs: parse_or(&lookup, "SESSION_TTL_SECS", defaults.session_ttl_secs),
            event_buffer_capacity: parse_or(&lookup, "EVENT_BUFFER_CAPACITY", defaults.event_buffer_capacity),
            subscriber_queue_capacity: parse_or(
                &lookup,
                "SUBSCRIBER_QUEUE_CAPACITY",
                defaults.subscriber_queue_capacity,
            ),
            snapshot_interval: parse_or(&lookup, "SNAPSHOT_INTERVAL", defaults.snapshot_interval),
            table_sweep_interval_ms: parse_or(
                &lookup,
                "TABLE_SWEEP_INTERVAL_MS",
                defaults.table_sweep_interval_ms,
            ),
            session_sweep_interval_secs: parse_or(
                &lookup,
                "SESSION_SWEEP_INTERVAL_SECS",
                defaults.session_sweep_interval_secs,
            ),
            keepalive_secs: parse_or(&lookup, "KEEPALIVE_SECS", defaults.keepalive_secs),
            max_request_id_len: parse_or(&lookup, "MAX_REQUEST_ID_LEN", defaults.max_request_id_len),
            stream_base_url: lookup("STREAM_BASE_URL").unwrap_or(defaults.stream_base_url),
        };

        let room = Room {
            id: lookup("ROOM_ID").unwrap_or_else(|| "default".to_string()),
            name: lookup("ROOM_NAME").unwrap_or_else(|| "Default Room".to_string()),
            small_blind: parse_or(&lookup, "ROOM_SMALL_BLIND", 10),
            big_blind: parse_or(&lookup, "ROOM_BIG_BLIND", 20),
            min_buyin: parse_or(&lookup, "ROOM_MIN_BUYIN", 400),
            active: true,
        };

        Ok(ServerConfig {
            database,
            in_memory,
            apply_schema: overrides.apply_schema || parse_or(&lookup, "APPLY_SCHEMA", false),
            metrics_bind,
            arena,
            room,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.arena.validate().map_err(|reason| ConfigError::Invalid {
            var: "ARENA".to_string(),
            reason,
        })?;

        if self.room.id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "ROOM_ID".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.room.small_blind <= 0 {
            return Err(ConfigError::Invalid {
                var: "ROOM_SMALL_BLIND".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.room.big_blind <= self.room.small_blind {
            return Err(ConfigError::Invalid {
                var: "ROOM_BIG_BLIND".to_string(),
                reason: format!(
                    "Must be greater than small blind ({})",
                    self.room.small_blind
                ),
            });
        }

        if self.room.min_buyin < self.room.big_blind {
            return Err(ConfigError::Invalid {
                var: "ROOM_MIN_BUYIN".to_string(),
                reason: format!("Must cover at least one big blind ({})", self.room.big_blind),
            });
        }

        if !self.in_memory && self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a variable with default fallback
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)], overrides: CliOverrides) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned(), overrides)
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "DATABASE_URL".to_string(),
            hint: "Use --in-memory".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATABASE_URL"));
        assert!(msg.contains("Use --in-memory"));
    }

    #[test]
    fn test_database_url_required_unless_in_memory() {
        let err = load(&[], CliOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));

        let config = load(
            &[],
            CliOverrides {
                in_memory: true,
                ..CliOverrides::default()
            },
        )
        .unwrap();
        assert!(config.in_memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_values_are_applied() {
        let config = load(
            &[
                ("DATABASE_URL", "postgres://arena@db/arena"),
                ("ACTION_TIMEOUT_SECS", "45"),
                ("ROOM_BIG_BLIND", "50"),
                ("DB_MAX_CONNECTIONS", "not-a-number"),
                ("METRICS_BIND", "0.0.0.0:9090"),
            ],
            CliOverrides::default(),
        )
        .unwrap();
        assert_eq!(config.database.database_url, "postgres://arena@db/arena");
        assert_eq!(config.arena.action_timeout_secs, 45);
        assert_eq!(config.room.big_blind, 50);
        assert_eq!(config.database.max_connections, DatabaseConfig::default().max_connections);
        assert_eq!(config.metrics_bind, Some("0.0.0.0:9090".parse().unwrap()));
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = load(
            &[("DATABASE_URL", "postgres://env/arena")],
            CliOverrides {
                database_url: Some("postgres://cli/arena".to_string()),
                ..CliOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.database.database_url, "postgres://cli/arena");
    }

    #[test]
    fn test_bad_metrics_address() {
        let err = load(
            &[("ARENA_IN_MEMORY", "true"), ("METRICS_BIND", "localhost")],
            CliOverrides::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_validation_blinds() {
        let config = load(
            &[("ROOM_SMALL_BLIND", "20"), ("ROOM_BIG_BLIND", "10")],
            CliOverrides {
                in_memory: true,
                ..CliOverrides::default()
            },
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "ROOM_BIG_BLIND"));
    }

    #[test]
    fn test_config_validation_arena() {
        let config = load(
            &[("ARENA_IN_MEMORY", "true"), ("RECONNECT_GRACE_SECS", "0")],
            CliOverrides::default(),
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
