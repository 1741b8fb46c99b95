//! Authentication error types.

use thiserror::Error;

use crate::db::StoreError;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Unknown agent or wrong key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Agent id already registered
    #[error("Agent already exists")]
    AgentExists,

    /// Agent id fails validation
    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    /// API key fails validation
    #[error("API key too weak: {0}")]
    WeakApiKey(String),

    /// Negative starting balance
    #[error("Invalid initial balance: {0}")]
    InvalidBalance(i64),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Store(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
