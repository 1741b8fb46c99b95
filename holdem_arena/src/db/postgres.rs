//! PostgreSQL implementation of the store traits.
#![allow(clippy::needless_raw_string_hashes)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;

use super::{
    errors::{StoreError, StoreResult},
    repository::{
        AgentRepository, IdempotencyRepository, ReplayRepository, RoomRepository,
        SessionRepository, TableRepository,
    },
    timeouts::{with_default_timeout, with_transaction_timeout},
};
use crate::auth::Agent;
use crate::replay::models::{ReplayEvent, ReplaySnapshot};
use crate::session::models::{ActionResponse, Room, Session, SessionId, TableId};
use crate::table::models::{HandSummary, TableRecord, TableStatus};
use crate::wallet::{EntryType, Ledger, WalletManager, WalletResult};

/// Store backed by a PostgreSQL pool. Ledger operations are delegated to
/// [`WalletManager`].
#[derive(Clone)]
pub struct PgArenaStore {
    pool: Arc<PgPool>,
    wallet: WalletManager,
}

impl PgArenaStore {
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            wallet: WalletManager::new(pool.clone()),
            pool,
        }
    }

    pub fn wallet(&self) -> &WalletManager {
        &self.wallet
    }

    fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }
}

fn conflict_or(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return StoreError::Conflict(what());
    }
    StoreError::Database(err)
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &PgRow, column: &str) -> StoreResult<T> {
    let raw: String = row.try_get(column)?;
    raw.parse()
        .map_err(|e: String| StoreError::Conflict(format!("bad {column} value: {e}")))
}

fn session_from_row(row: &PgRow) -> StoreResult<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        agent_id: row.try_get("agent_id")?,
        room_id: row.try_get("room_id")?,
        table_id: row.try_get("table_id")?,
        seat: row
            .try_get::<Option<i16>, _>("seat")?
            .and_then(|s| usize::try_from(s).ok()),
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        closed_reason: row.try_get("closed_reason")?,
    })
}

fn room_from_row(row: &PgRow) -> StoreResult<Room> {
    Ok(Room {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        small_blind: row.try_get("small_blind")?,
        big_blind: row.try_get("big_blind")?,
        min_buyin: row.try_get("min_buyin")?,
        active: row.try_get("active")?,
    })
}

fn seat_column(seat: Option<usize>) -> Option<i16> {
    seat.and_then(|s| i16::try_from(s).ok())
}

#[async_trait]
impl Ledger for PgArenaStore {
    async fn balance(&self, agent_id: &str) -> WalletResult<i64> {
        self.wallet.balance(agent_id).await
    }

    async fn debit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        self.wallet.debit(agent_id, amount, entry_type, reference).await
    }

    async fn credit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        self.wallet.credit(agent_id, amount, entry_type, reference).await
    }
}

#[async_trait]
impl AgentRepository for PgArenaStore {
    async fn create_agent(&self, agent: &Agent, initial_balance: i64) -> StoreResult<()> {
        with_transaction_timeout(async {
            let mut tx = self.pool().begin().await?;

            sqlx::query(
                "INSERT INTO agents (agent_id, display_name, api_key_hash, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&agent.agent_id)
            .bind(&agent.display_name)
            .bind(&agent.api_key_hash)
            .bind(agent.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, || format!("agent {}", agent.agent_id)))?;

            sqlx::query("INSERT INTO accounts (agent_id, balance) VALUES ($1, $2)")
                .bind(&agent.agent_id)
                .bind(initial_balance)
                .execute(&mut *tx)
                .await?;

            if initial_balance > 0 {
                sqlx::query(
                    "INSERT INTO ledger_entries (agent_id, amount, balance_after, direction, entry_type, reference)
                     VALUES ($1, $2, $2, 'credit', $3, 'registration')",
                )
                .bind(&agent.agent_id)
                .bind(initial_balance)
                .bind(EntryType::Funding.to_string())
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn find_agent(&self, agent_id: &str) -> StoreResult<Option<Agent>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT agent_id, display_name, api_key_hash, created_at FROM agents WHERE agent_id = $1",
            )
            .bind(agent_id)
            .fetch_optional(self.pool()),
        )
        .await?;

        row.map(|r| -> StoreResult<Agent> {
            Ok(Agent {
                agent_id: r.try_get("agent_id")?,
                display_name: r.try_get("display_name")?,
                api_key_hash: r.try_get("api_key_hash")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl RoomRepository for PgArenaStore {
    async fn upsert_room(&self, room: &Room) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO rooms (id, name, small_blind, big_blind, min_buyin, active)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    small_blind = EXCLUDED.small_blind,
                    big_blind = EXCLUDED.big_blind,
                    min_buyin = EXCLUDED.min_buyin,
                    active = EXCLUDED.active
                "#,
            )
            .bind(&room.id)
            .bind(&room.name)
            .bind(room.small_blind)
            .bind(room.big_blind)
            .bind(room.min_buyin)
            .bind(room.active)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn find_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, name, small_blind, big_blind, min_buyin, active FROM rooms WHERE id = $1",
            )
            .bind(room_id)
            .fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(room_from_row).transpose()
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT id, name, small_blind, big_blind, min_buyin, active FROM rooms ORDER BY id")
                .fetch_all(self.pool()),
        )
        .await?;
        rows.iter().map(room_from_row).collect()
    }
}

#[async_trait]
impl SessionRepository for PgArenaStore {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO sessions (id, agent_id, room_id, table_id, seat, status, created_at, expires_at, closed_reason)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(session.id)
            .bind(&session.agent_id)
            .bind(&session.room_id)
            .bind(session.table_id)
            .bind(seat_column(session.seat))
            .bind(session.status.as_str())
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(&session.closed_reason)
            .execute(self.pool()),
        )
        .await
        .map_err(|e| match e {
            super::timeouts::TimeoutError::Database(db) => {
                conflict_or(db, || format!("open session for {}", session.agent_id))
            }
            other => other.into(),
        })?;
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> StoreResult<()> {
        let result = with_default_timeout(
            sqlx::query(
                r#"
                UPDATE sessions
                SET table_id = $2, seat = $3, status = $4, expires_at = $5, closed_reason = $6
                WHERE id = $1
                "#,
            )
            .bind(session.id)
            .bind(session.table_id)
            .bind(seat_column(session.seat))
            .bind(session.status.as_str())
            .bind(session.expires_at)
            .bind(&session.closed_reason)
            .execute(self.pool()),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }

    async fn find_session(&self, session_id: SessionId) -> StoreResult<Option<Session>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, agent_id, room_id, table_id, seat, status, created_at, expires_at, closed_reason
                 FROM sessions WHERE id = $1",
            )
            .bind(session_id)
            .fetch_optional(self.pool()),
        )
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn close_session(
        &self,
        session_id: SessionId,
        reason: &str,
        _closed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE sessions SET status = 'closed', closed_reason = $2
                 WHERE id = $1 AND status <> 'closed'",
            )
            .bind(session_id)
            .bind(reason)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TableRepository for PgArenaStore {
    async fn create_table_with_sessions(
        &self,
        table: &TableRecord,
        sessions: &[Session; 2],
    ) -> StoreResult<()> {
        with_transaction_timeout(async {
            let mut tx = self.pool().begin().await?;

            sqlx::query(
                r#"
                INSERT INTO arena_tables (id, room_id, status, small_blind, big_blind, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(table.id)
            .bind(&table.room_id)
            .bind(table.status.as_str())
            .bind(table.small_blind)
            .bind(table.big_blind)
            .bind(table.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_or(e, || format!("table {}", table.id)))?;

            for session in sessions {
                sqlx::query(
                    r#"
                    INSERT INTO sessions (id, agent_id, room_id, table_id, seat, status, created_at, expires_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (id) DO UPDATE SET
                        table_id = EXCLUDED.table_id,
                        seat = EXCLUDED.seat,
                        status = EXCLUDED.status
                    "#,
                )
                .bind(session.id)
                .bind(&session.agent_id)
                .bind(&session.room_id)
                .bind(session.table_id)
                .bind(seat_column(session.seat))
                .bind(session.status.as_str())
                .bind(session.created_at)
                .bind(session.expires_at)
                .execute(&mut *tx)
                .await
                .map_err(|e| conflict_or(e, || format!("open session for {}", session.agent_id)))?;
            }

            tx.commit().await?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn find_table(&self, table_id: TableId) -> StoreResult<Option<TableRecord>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT id, room_id, status, small_blind, big_blind, created_at, closed_reason
                 FROM arena_tables WHERE id = $1",
            )
            .bind(table_id)
            .fetch_optional(self.pool()),
        )
        .await?;

        row.map(|r| -> StoreResult<TableRecord> {
            Ok(TableRecord {
                id: r.try_get("id")?,
                room_id: r.try_get("room_id")?,
                status: parse_column(&r, "status")?,
                small_blind: r.try_get("small_blind")?,
                big_blind: r.try_get("big_blind")?,
                created_at: r.try_get("created_at")?,
                closed_reason: r.try_get("closed_reason")?,
            })
        })
        .transpose()
    }

    async fn update_table_status(
        &self,
        table_id: TableId,
        status: TableStatus,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE arena_tables SET status = $2, closed_reason = COALESCE($3, closed_reason)
                 WHERE id = $1",
            )
            .bind(table_id)
            .bind(status.as_str())
            .bind(reason)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn end_hand(&self, summary: &HandSummary) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO hands (table_id, hand_no, winner, pot, ending_street, ended_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (table_id, hand_no) DO NOTHING
                "#,
            )
            .bind(summary.table_id)
            .bind(i64::try_from(summary.hand_no).unwrap_or(i64::MAX))
            .bind(&summary.winner)
            .bind(summary.pot)
            .bind(summary.ending_street.as_str())
            .bind(summary.ended_at)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReplayRepository for PgArenaStore {
    async fn append_replay_event(&self, event: &ReplayEvent) -> StoreResult<()> {
        let payload = serde_json::to_string(&event.payload)?;
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO replay_events (table_id, global_seq, hand_seq, event_type, payload, created_at)
                VALUES ($1, $2, $3, $4, $5::jsonb, $6)
                "#,
            )
            .bind(event.table_id)
            .bind(event.global_seq)
            .bind(event.hand_seq)
            .bind(&event.event_type)
            .bind(payload)
            .bind(event.created_at)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn append_replay_snapshot(&self, snapshot: &ReplaySnapshot) -> StoreResult<()> {
        let state = serde_json::to_string(&snapshot.state)?;
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO replay_snapshots (table_id, global_seq, state, created_at)
                VALUES ($1, $2, $3::jsonb, $4)
                ON CONFLICT (table_id, global_seq) DO NOTHING
                "#,
            )
            .bind(snapshot.table_id)
            .bind(snapshot.global_seq)
            .bind(state)
            .bind(snapshot.created_at)
            .execute(self.pool()),
        )
        .await?;
        Ok(())
    }

    async fn replay_events(
        &self,
        table_id: TableId,
        from_seq: i64,
        to_seq: i64,
    ) -> StoreResult<Vec<ReplayEvent>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT table_id, global_seq, hand_seq, event_type, payload::text AS payload, created_at
                FROM replay_events
                WHERE table_id = $1 AND global_seq BETWEEN $2 AND $3
                ORDER BY global_seq
                "#,
            )
            .bind(table_id)
            .bind(from_seq)
            .bind(to_seq)
            .fetch_all(self.pool()),
        )
        .await?;

        rows.iter()
            .map(|r| -> StoreResult<ReplayEvent> {
                let payload: String = r.try_get("payload")?;
                Ok(ReplayEvent {
                    table_id: r.try_get("table_id")?,
                    global_seq: r.try_get("global_seq")?,
                    hand_seq: r.try_get("hand_seq")?,
                    event_type: r.try_get("event_type")?,
                    payload: serde_json::from_str(&payload)?,
                    created_at: r.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn latest_snapshot_at_or_before(
        &self,
        table_id: TableId,
        seq: i64,
    ) -> StoreResult<Option<ReplaySnapshot>> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT table_id, global_seq, state::text AS state, created_at
                FROM replay_snapshots
                WHERE table_id = $1 AND global_seq <= $2
                ORDER BY global_seq DESC
                LIMIT 1
                "#,
            )
            .bind(table_id)
            .bind(seq)
            .fetch_optional(self.pool()),
        )
        .await?;

        row.map(|r| -> StoreResult<ReplaySnapshot> {
            let state: String = r.try_get("state")?;
            Ok(ReplaySnapshot {
                table_id: r.try_get("table_id")?,
                global_seq: r.try_get("global_seq")?,
                state: serde_json::from_str(&state)?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn last_replay_sequence(&self, table_id: TableId) -> StoreResult<i64> {
        let row = with_default_timeout(
            sqlx::query("SELECT COALESCE(MAX(global_seq), 0) AS seq FROM replay_events WHERE table_id = $1")
                .bind(table_id)
                .fetch_one(self.pool()),
        )
        .await?;
        Ok(row.try_get("seq")?)
    }
}

#[async_trait]
impl IdempotencyRepository for PgArenaStore {
    async fn find_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
    ) -> StoreResult<Option<ActionResponse>> {
        let row = with_default_timeout(
            sqlx::query(
                "SELECT response::text AS response FROM action_results
                 WHERE session_id = $1 AND request_id = $2",
            )
            .bind(session_id)
            .bind(request_id)
            .fetch_optional(self.pool()),
        )
        .await?;

        match row {
            Some(r) => {
                let raw: String = r.try_get("response")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn save_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
        response: &ActionResponse,
    ) -> StoreResult<bool> {
        let raw = serde_json::to_string(response)?;
        let result = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO action_results (session_id, request_id, response)
                VALUES ($1, $2, $3::jsonb)
                ON CONFLICT (session_id, request_id) DO NOTHING
                "#,
            )
            .bind(session_id)
            .bind(request_id)
            .bind(raw)
            .execute(self.pool()),
        )
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
