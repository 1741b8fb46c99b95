//! PostgreSQL ledger with an audit entry per balance change.
#![allow(clippy::needless_raw_string_hashes)]

use super::{
    errors::{WalletError, WalletResult},
    ledger::Ledger,
    models::{Account, EntryDirection, EntryType, LedgerEntry},
};
use crate::db::timeouts::{TimeoutError, with_default_timeout, with_transaction_timeout};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;

impl From<TimeoutError> for WalletError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(_) => WalletError::Timeout,
            TimeoutError::Database(e) => WalletError::Database(e),
        }
    }
}

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    pool: Arc<PgPool>,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Get the account for an agent
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Agent ID
    ///
    /// # Returns
    ///
    /// * `WalletResult<Account>` - Account information or error
    pub async fn get_account(&self, agent_id: &str) -> WalletResult<Account> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT agent_id, balance, updated_at
                FROM accounts
                WHERE agent_id = $1
                "#,
            )
            .bind(agent_id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?
        .ok_or_else(|| WalletError::AccountNotFound(agent_id.to_string()))?;

        Ok(Account {
            agent_id: row.get("agent_id"),
            balance: row.get("balance"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Remove chips from an agent's balance
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientBalance` - Not enough chips; balance unchanged
    /// * `WalletError::AccountNotFound` - Unknown agent
    pub async fn debit_account(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            // Check and update in one statement so concurrent debits cannot
            // both pass the balance check.
            let updated = sqlx::query(
                "UPDATE accounts
                 SET balance = balance - $1, updated_at = NOW()
                 WHERE agent_id = $2 AND balance >= $1
                 RETURNING balance",
            )
            .bind(amount)
            .bind(agent_id)
            .fetch_optional(&mut *tx)
            .await?;

            let new_balance: i64 = match updated {
                Some(row) => row.get("balance"),
                None => {
                    let current = sqlx::query("SELECT balance FROM accounts WHERE agent_id = $1")
                        .bind(agent_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                    return match current {
                        Some(row) => Err(WalletError::InsufficientBalance {
                            agent_id: agent_id.to_string(),
                            available: row.get("balance"),
                            required: amount,
                        }),
                        None => Err(WalletError::AccountNotFound(agent_id.to_string())),
                    };
                }
            };

            Self::create_entry(
                &mut tx,
                agent_id,
                -amount,
                new_balance,
                EntryDirection::Debit,
                entry_type,
                reference,
            )
            .await?;

            tx.commit().await?;
            Ok::<_, WalletError>(new_balance)
        })
        .await
    }

    /// Add chips to an agent's balance
    ///
    /// # Errors
    ///
    /// * `WalletError::BalanceOverflow` - Credit would overflow
    /// * `WalletError::AccountNotFound` - Unknown agent
    pub async fn credit_account(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let current = sqlx::query("SELECT balance FROM accounts WHERE agent_id = $1 FOR UPDATE")
                .bind(agent_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| WalletError::AccountNotFound(agent_id.to_string()))?;

            let current_balance: i64 = current.get("balance");
            let new_balance = current_balance
                .checked_add(amount)
                .ok_or(WalletError::BalanceOverflow)?;

            sqlx::query("UPDATE accounts SET balance = $1, updated_at = NOW() WHERE agent_id = $2")
                .bind(new_balance)
                .bind(agent_id)
                .execute(&mut *tx)
                .await?;

            Self::create_entry(
                &mut tx,
                agent_id,
                amount,
                new_balance,
                EntryDirection::Credit,
                entry_type,
                reference,
            )
            .await?;

            tx.commit().await?;
            Ok::<_, WalletError>(new_balance)
        })
        .await
    }

    /// Append an audit row inside the caller's transaction
    async fn create_entry(
        tx: &mut Transaction<'_, Postgres>,
        agent_id: &str,
        amount: i64,
        balance_after: i64,
        direction: EntryDirection,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (agent_id, amount, balance_after, direction, entry_type, reference)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(agent_id)
        .bind(amount)
        .bind(balance_after)
        .bind(direction.to_string())
        .bind(entry_type.to_string())
        .bind(reference)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("id"))
    }

    /// Get ledger entries for an agent, newest first
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Agent ID
    /// * `limit` - Maximum number of entries to return
    pub async fn get_entries(&self, agent_id: &str, limit: i64) -> WalletResult<Vec<LedgerEntry>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, agent_id, amount, balance_after, direction, entry_type, reference, created_at
                FROM ledger_entries
                WHERE agent_id = $1
                ORDER BY id DESC
                LIMIT $2
                "#,
            )
            .bind(agent_id)
            .bind(limit)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| LedgerEntry {
                id: row.get("id"),
                agent_id: row.get("agent_id"),
                amount: row.get("amount"),
                balance_after: row.get("balance_after"),
                direction: row
                    .get::<String, _>("direction")
                    .parse()
                    .unwrap_or(EntryDirection::Credit),
                entry_type: row
                    .get::<String, _>("entry_type")
                    .parse()
                    .unwrap_or(EntryType::Funding),
                reference: row.get("reference"),
                created_at: row.get("created_at"),
            })
            .collect();

        Ok(entries)
    }
}

#[async_trait]
impl Ledger for WalletManager {
    async fn balance(&self, agent_id: &str) -> WalletResult<i64> {
        Ok(self.get_account(agent_id).await?.balance)
    }

    async fn debit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        self.debit_account(agent_id, amount, entry_type, reference).await
    }

    async fn credit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        self.credit_account(agent_id, amount, entry_type, reference).await
    }
}
