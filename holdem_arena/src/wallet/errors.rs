//! Ledger error types.

use thiserror::Error;

/// Ledger errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Insufficient balance
    #[error("Insufficient balance for {agent_id}: available {available}, required {required}")]
    InsufficientBalance {
        agent_id: String,
        available: i64,
        required: i64,
    },

    /// Account not found
    #[error("Account not found for agent {0}")]
    AccountNotFound(String),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Credit would overflow the balance
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Query exceeded its deadline
    #[error("Ledger operation timed out")]
    Timeout,
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database errors are sanitized and agent ids are redacted.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Database(_) | WalletError::Timeout => "Internal server error".to_string(),
            WalletError::AccountNotFound(_) => "Account not found".to_string(),
            WalletError::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_redacts_agent() {
        let err = WalletError::InsufficientBalance {
            agent_id: "agent-secret".to_string(),
            available: 10,
            required: 20,
        };
        assert!(err.to_string().contains("agent-secret"));
        assert!(!err.client_message().contains("agent-secret"));
        assert_eq!(
            WalletError::AccountNotFound("x".into()).client_message(),
            "Account not found"
        );
        assert_eq!(WalletError::InvalidAmount(-5).client_message(), "Invalid amount: -5");
    }
}
