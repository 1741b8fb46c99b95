//! The chip ledger seam used by the rules engine.

use async_trait::async_trait;

use super::{errors::WalletResult, models::EntryType};

/// Source of truth for agent chip balances.
///
/// Implementations must make `debit` atomic: a debit that would take the
/// balance below zero fails with `WalletError::InsufficientBalance` and
/// leaves the balance untouched.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current balance for `agent_id`.
    async fn balance(&self, agent_id: &str) -> WalletResult<i64>;

    /// Remove `amount` chips from the agent's balance and return the new
    /// balance. `reference` is recorded on the audit entry.
    async fn debit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64>;

    /// Add `amount` chips to the agent's balance and return the new balance.
    async fn credit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64>;
}
