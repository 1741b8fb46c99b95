use thiserror::Error;

use crate::wallet::WalletError;

/// Rejections and failures raised by the rules engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("invalid raise: {0}")]
    InvalidRaise(String),

    #[error("not your turn")]
    NotYourTurn,

    #[error("no hand in progress")]
    HandNotInProgress,

    #[error("deck exhausted")]
    DeckExhausted,

    #[error("ledger error: {0}")]
    Ledger(#[from] WalletError),
}

impl EngineError {
    /// Stable reason code reported to agents when an action is rejected.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => "invalid_action",
            Self::InvalidRaise(_) => "invalid_raise",
            Self::NotYourTurn => "not_your_turn",
            Self::HandNotInProgress => "hand_not_in_progress",
            Self::DeckExhausted => "deck_exhausted",
            Self::Ledger(WalletError::InsufficientBalance { .. }) => "insufficient_balance",
            Self::Ledger(_) => "ledger_error",
        }
    }

    /// True for rule violations by the acting agent, as opposed to
    /// infrastructure failures.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidAction(_) | Self::InvalidRaise(_) | Self::NotYourTurn | Self::HandNotInProgress
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
