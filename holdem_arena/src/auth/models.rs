//! Agent identity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered agent. Only the SHA-256 hash of its API key is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub display_name: String,
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub agent_id: String,
    pub display_name: Option<String>,
    pub api_key: String,
    pub initial_balance: i64,
}
