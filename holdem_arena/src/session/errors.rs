//! Arena error taxonomy.

use thiserror::Error;

use crate::auth::AuthError;
use crate::db::StoreError;
use crate::game::EngineError;
use crate::wallet::WalletError;

/// Errors surfaced by the session coordinator and table runtimes. Each
/// variant maps to a stable string code.
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("request id must be 1-{max} characters")]
    InvalidRequestId { max: usize },

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid raise: {0}")]
    InvalidRaise(String),

    #[error("turn id does not match the current turn")]
    InvalidTurnId,

    #[error("not your turn")]
    NotYourTurn,

    #[error("session not found")]
    SessionNotFound,

    #[error("table is closing")]
    TableClosing,

    #[error("table is closed")]
    TableClosed,

    #[error("opponent disconnected")]
    OpponentDisconnected,

    #[error("agent already has an open session")]
    AgentAlreadyInSession,

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("balance below the room's minimum buy-in")]
    InsufficientBuyin,

    #[error("no room the agent can afford")]
    NoAvailableRoom,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(WalletError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArenaError {
    /// Stable code reported to clients
    pub fn code(&self) -> &'static str {
        match self {
            ArenaError::InvalidRequestId { .. } => "invalid_request_id",
            ArenaError::InvalidAction(_) => "invalid_action",
            ArenaError::InvalidRaise(_) => "invalid_raise",
            ArenaError::InvalidTurnId => "invalid_turn_id",
            ArenaError::NotYourTurn => "not_your_turn",
            ArenaError::SessionNotFound => "session_not_found",
            ArenaError::TableClosing => "table_closing",
            ArenaError::TableClosed => "table_closed",
            ArenaError::OpponentDisconnected => "opponent_disconnected",
            ArenaError::AgentAlreadyInSession => "agent_already_in_session",
            ArenaError::RoomNotFound(_) => "room_not_found",
            ArenaError::InsufficientBuyin => "insufficient_buyin",
            ArenaError::NoAvailableRoom => "no_available_room",
            ArenaError::InsufficientBalance => "insufficient_balance",
            ArenaError::InvalidApiKey => "invalid_api_key",
            ArenaError::Store(_) | ArenaError::Ledger(_) | ArenaError::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    pub fn client_message(&self) -> String {
        match self {
            ArenaError::Store(e) => e.client_message(),
            ArenaError::Ledger(e) => e.client_message(),
            ArenaError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<WalletError> for ArenaError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientBalance { .. } => ArenaError::InsufficientBalance,
            other => ArenaError::Ledger(other),
        }
    }
}

impl From<EngineError> for ArenaError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidAction(msg) => ArenaError::InvalidAction(msg),
            EngineError::InvalidRaise(msg) => ArenaError::InvalidRaise(msg),
            EngineError::NotYourTurn => ArenaError::NotYourTurn,
            EngineError::Ledger(e) => e.into(),
            other => ArenaError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ArenaError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Store(e) => ArenaError::Store(e),
            _ => ArenaError::InvalidApiKey,
        }
    }
}

/// Result type for arena operations
pub type ArenaResult<T> = Result<T, ArenaError>;
