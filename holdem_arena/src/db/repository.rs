//! Repository trait definitions for the durable store.
//!
//! The coordinator depends only on these traits, so tests and the server's
//! in-memory mode can swap the PostgreSQL store for [`super::MemoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::auth::Agent;
use crate::replay::models::{ReplayEvent, ReplaySnapshot};
use crate::session::models::{ActionResponse, Room, Session, SessionId, TableId};
use crate::table::models::{HandSummary, TableRecord, TableStatus};
use crate::wallet::Ledger;

/// Trait for agent repository operations
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Create an agent and its account with `initial_balance` chips.
    /// Fails with `StoreError::Conflict` if the agent id is taken.
    async fn create_agent(&self, agent: &Agent, initial_balance: i64) -> StoreResult<()>;

    /// Find agent by ID
    async fn find_agent(&self, agent_id: &str) -> StoreResult<Option<Agent>>;
}

/// Trait for room repository operations
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Insert or replace a room definition
    async fn upsert_room(&self, room: &Room) -> StoreResult<()>;

    /// Find room by ID
    async fn find_room(&self, room_id: &str) -> StoreResult<Option<Room>>;

    /// List all rooms, ordered by ID
    async fn list_rooms(&self) -> StoreResult<Vec<Room>>;
}

/// Trait for session repository operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session
    async fn create_session(&self, session: &Session) -> StoreResult<()>;

    /// Overwrite the mutable fields of an existing session
    async fn update_session(&self, session: &Session) -> StoreResult<()>;

    /// Find session by ID
    async fn find_session(&self, session_id: SessionId) -> StoreResult<Option<Session>>;

    /// Mark a session closed. Closing an already closed session is a no-op.
    async fn close_session(
        &self,
        session_id: SessionId,
        reason: &str,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

/// Trait for table repository operations
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Persist a new table and both seated sessions in one transaction.
    /// Sessions that already exist are updated in place.
    async fn create_table_with_sessions(
        &self,
        table: &TableRecord,
        sessions: &[Session; 2],
    ) -> StoreResult<()>;

    /// Find table by ID
    async fn find_table(&self, table_id: TableId) -> StoreResult<Option<TableRecord>>;

    /// Update table status
    async fn update_table_status(
        &self,
        table_id: TableId,
        status: TableStatus,
        reason: Option<&str>,
    ) -> StoreResult<()>;

    /// Record a settled hand
    async fn end_hand(&self, summary: &HandSummary) -> StoreResult<()>;
}

/// Trait for the append-only replay tables
#[async_trait]
pub trait ReplayRepository: Send + Sync {
    /// Append one event at the caller-supplied global sequence
    async fn append_replay_event(&self, event: &ReplayEvent) -> StoreResult<()>;

    /// Append one snapshot
    async fn append_replay_snapshot(&self, snapshot: &ReplaySnapshot) -> StoreResult<()>;

    /// Events with `from_seq <= global_seq <= to_seq`, ascending
    async fn replay_events(
        &self,
        table_id: TableId,
        from_seq: i64,
        to_seq: i64,
    ) -> StoreResult<Vec<ReplayEvent>>;

    /// Latest snapshot with `global_seq <= seq`
    async fn latest_snapshot_at_or_before(
        &self,
        table_id: TableId,
        seq: i64,
    ) -> StoreResult<Option<ReplaySnapshot>>;

    /// Highest stored global sequence for a table, or 0
    async fn last_replay_sequence(&self, table_id: TableId) -> StoreResult<i64>;
}

/// Trait for the write-at-most-once action result table
#[async_trait]
pub trait IdempotencyRepository: Send + Sync {
    /// Previously recorded outcome for `(session_id, request_id)`
    async fn find_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
    ) -> StoreResult<Option<ActionResponse>>;

    /// Record an outcome. Returns `false` if a record already existed, in
    /// which case the stored outcome is left untouched.
    async fn save_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
        response: &ActionResponse,
    ) -> StoreResult<bool>;
}

/// Everything the session coordinator needs from durable storage.
pub trait ArenaStore:
    AgentRepository
    + RoomRepository
    + SessionRepository
    + TableRepository
    + ReplayRepository
    + IdempotencyRepository
    + Ledger
{
}

impl<T> ArenaStore for T where
    T: AgentRepository
        + RoomRepository
        + SessionRepository
        + TableRepository
        + ReplayRepository
        + IdempotencyRepository
        + Ledger
{
}
