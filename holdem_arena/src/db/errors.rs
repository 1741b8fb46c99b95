//! Durable store error types.

use thiserror::Error;

use super::timeouts::TimeoutError;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Query exceeded its deadline
    #[error("Store operation timed out")]
    Timeout,
}

impl From<TimeoutError> for StoreError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => StoreError::Timeout,
            TimeoutError::Database(e) => StoreError::Database(e),
        }
    }
}

impl StoreError {
    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            StoreError::Database(_) | StoreError::Serialization(_) | StoreError::Timeout => {
                "Internal server error".to_string()
            }
            StoreError::NotFound(_) => "Not found".to_string(),
            StoreError::Conflict(_) => "Conflict".to_string(),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
