//! In-process implementation of every store trait.
//!
//! Backs the integration tests and the server's `--in-memory` mode. Failure
//! switches let tests exercise the coordinator's error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use super::{
    errors::{StoreError, StoreResult},
    repository::{
        AgentRepository, IdempotencyRepository, ReplayRepository, RoomRepository,
        SessionRepository, TableRepository,
    },
};
use crate::auth::Agent;
use crate::replay::models::{ReplayEvent, ReplaySnapshot};
use crate::session::models::{ActionResponse, Room, Session, SessionId, SessionStatus, TableId};
use crate::table::models::{HandSummary, TableRecord, TableStatus};
use crate::wallet::{
    EntryDirection, EntryType, Ledger, LedgerEntry, WalletError, WalletResult,
};

#[derive(Default)]
struct MemoryState {
    agents: HashMap<String, Agent>,
    balances: HashMap<String, i64>,
    entries: Vec<LedgerEntry>,
    rooms: BTreeMap<String, Room>,
    sessions: HashMap<SessionId, Session>,
    tables: HashMap<TableId, TableRecord>,
    hands: Vec<HandSummary>,
    events: HashMap<TableId, BTreeMap<i64, ReplayEvent>>,
    snapshots: HashMap<TableId, BTreeMap<i64, ReplaySnapshot>>,
    action_results: HashMap<(SessionId, String), ActionResponse>,
}

/// Store that keeps everything in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_table_creation: AtomicBool,
    fail_replay_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `create_table_with_sessions` fail until switched off.
    pub fn set_fail_table_creation(&self, fail: bool) {
        self.fail_table_creation.store(fail, Ordering::SeqCst);
    }

    /// Make replay event and snapshot appends fail until switched off.
    pub fn set_fail_replay_writes(&self, fail: bool) {
        self.fail_replay_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored idempotency records for a session.
    pub fn action_result_count(&self, session_id: SessionId) -> usize {
        self.lock()
            .action_results
            .keys()
            .filter(|(sid, _)| *sid == session_id)
            .count()
    }

    /// Ledger entries for an agent, oldest first.
    pub fn ledger_entries(&self, agent_id: &str) -> Vec<LedgerEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// Settled hand summaries for a table.
    pub fn hand_summaries(&self, table_id: TableId) -> Vec<HandSummary> {
        self.lock()
            .hands
            .iter()
            .filter(|h| h.table_id == table_id)
            .cloned()
            .collect()
    }

    /// Snapshot sequences stored for a table, ascending.
    pub fn snapshot_sequences(&self, table_id: TableId) -> Vec<i64> {
        self.lock()
            .snapshots
            .get(&table_id)
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default()
    }

    fn record_entry(
        state: &mut MemoryState,
        agent_id: &str,
        amount: i64,
        balance_after: i64,
        direction: EntryDirection,
        entry_type: EntryType,
        reference: &str,
    ) {
        let id = state.entries.len() as i64 + 1;
        state.entries.push(LedgerEntry {
            id,
            agent_id: agent_id.to_string(),
            amount,
            balance_after,
            direction,
            entry_type,
            reference: reference.to_string(),
            created_at: Utc::now(),
        });
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn balance(&self, agent_id: &str) -> WalletResult<i64> {
        self.lock()
            .balances
            .get(agent_id)
            .copied()
            .ok_or_else(|| WalletError::AccountNotFound(agent_id.to_string()))
    }

    async fn debit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let mut state = self.lock();
        let balance = state
            .balances
            .get_mut(agent_id)
            .ok_or_else(|| WalletError::AccountNotFound(agent_id.to_string()))?;
        if *balance < amount {
            return Err(WalletError::InsufficientBalance {
                agent_id: agent_id.to_string(),
                available: *balance,
                required: amount,
            });
        }
        *balance -= amount;
        let new_balance = *balance;
        Self::record_entry(
            &mut state,
            agent_id,
            -amount,
            new_balance,
            EntryDirection::Debit,
            entry_type,
            reference,
        );
        Ok(new_balance)
    }

    async fn credit(
        &self,
        agent_id: &str,
        amount: i64,
        entry_type: EntryType,
        reference: &str,
    ) -> WalletResult<i64> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let mut state = self.lock();
        let balance = state
            .balances
            .get_mut(agent_id)
            .ok_or_else(|| WalletError::AccountNotFound(agent_id.to_string()))?;
        *balance = balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow)?;
        let new_balance = *balance;
        Self::record_entry(
            &mut state,
            agent_id,
            amount,
            new_balance,
            EntryDirection::Credit,
            entry_type,
            reference,
        );
        Ok(new_balance)
    }
}

#[async_trait]
impl AgentRepository for MemoryStore {
    async fn create_agent(&self, agent: &Agent, initial_balance: i64) -> StoreResult<()> {
        let mut state = self.lock();
        if state.agents.contains_key(&agent.agent_id) {
            return Err(StoreError::Conflict(format!("agent {}", agent.agent_id)));
        }
        state.agents.insert(agent.agent_id.clone(), agent.clone());
        state.balances.insert(agent.agent_id.clone(), initial_balance);
        if initial_balance > 0 {
            Self::record_entry(
                &mut state,
                &agent.agent_id,
                initial_balance,
                initial_balance,
                EntryDirection::Credit,
                EntryType::Funding,
                "registration",
            );
        }
        Ok(())
    }

    async fn find_agent(&self, agent_id: &str) -> StoreResult<Option<Agent>> {
        Ok(self.lock().agents.get(agent_id).cloned())
    }
}

#[async_trait]
impl RoomRepository for MemoryStore {
    async fn upsert_room(&self, room: &Room) -> StoreResult<()> {
        self.lock().rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn find_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        Ok(self.lock().rooms.get(room_id).cloned())
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.lock().rooms.values().cloned().collect())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.lock();
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Conflict(format!("session {}", session.id)));
        }
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.lock();
        let slot = state
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session.id)))?;
        *slot = session.clone();
        Ok(())
    }

    async fn find_session(&self, session_id: SessionId) -> StoreResult<Option<Session>> {
        Ok(self.lock().sessions.get(&session_id).cloned())
    }

    async fn close_session(
        &self,
        session_id: SessionId,
        reason: &str,
        _closed_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))?;
        if session.status != SessionStatus::Closed {
            session.status = SessionStatus::Closed;
            session.closed_reason = Some(reason.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl TableRepository for MemoryStore {
    async fn create_table_with_sessions(
        &self,
        table: &TableRecord,
        sessions: &[Session; 2],
    ) -> StoreResult<()> {
        if self.fail_table_creation.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict("table creation disabled".to_string()));
        }
        let mut state = self.lock();
        if state.tables.contains_key(&table.id) {
            return Err(StoreError::Conflict(format!("table {}", table.id)));
        }
        state.tables.insert(table.id, table.clone());
        for session in sessions {
            state.sessions.insert(session.id, session.clone());
        }
        Ok(())
    }

    async fn find_table(&self, table_id: TableId) -> StoreResult<Option<TableRecord>> {
        Ok(self.lock().tables.get(&table_id).cloned())
    }

    async fn update_table_status(
        &self,
        table_id: TableId,
        status: TableStatus,
        reason: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let table = state
            .tables
            .get_mut(&table_id)
            .ok_or_else(|| StoreError::NotFound(format!("table {table_id}")))?;
        table.status = status;
        if let Some(reason) = reason {
            table.closed_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn end_hand(&self, summary: &HandSummary) -> StoreResult<()> {
        self.lock().hands.push(summary.clone());
        Ok(())
    }
}

#[async_trait]
impl ReplayRepository for MemoryStore {
    async fn append_replay_event(&self, event: &ReplayEvent) -> StoreResult<()> {
        if self.fail_replay_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        let mut state = self.lock();
        let events = state.events.entry(event.table_id).or_default();
        if events.contains_key(&event.global_seq) {
            return Err(StoreError::Conflict(format!(
                "replay event {}:{}",
                event.table_id, event.global_seq
            )));
        }
        events.insert(event.global_seq, event.clone());
        Ok(())
    }

    async fn append_replay_snapshot(&self, snapshot: &ReplaySnapshot) -> StoreResult<()> {
        if self.fail_replay_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        self.lock()
            .snapshots
            .entry(snapshot.table_id)
            .or_default()
            .insert(snapshot.global_seq, snapshot.clone());
        Ok(())
    }

    async fn replay_events(
        &self,
        table_id: TableId,
        from_seq: i64,
        to_seq: i64,
    ) -> StoreResult<Vec<ReplayEvent>> {
        if from_seq > to_seq {
            return Ok(Vec::new());
        }
        Ok(self
            .lock()
            .events
            .get(&table_id)
            .map(|events| events.range(from_seq..=to_seq).map(|(_, e)| e.clone()).collect())
            .unwrap_or_default())
    }

    async fn latest_snapshot_at_or_before(
        &self,
        table_id: TableId,
        seq: i64,
    ) -> StoreResult<Option<ReplaySnapshot>> {
        Ok(self
            .lock()
            .snapshots
            .get(&table_id)
            .and_then(|snaps| snaps.range(..=seq).next_back().map(|(_, s)| s.clone())))
    }

    async fn last_replay_sequence(&self, table_id: TableId) -> StoreResult<i64> {
        Ok(self
            .lock()
            .events
            .get(&table_id)
            .and_then(|events| events.keys().next_back().copied())
            .unwrap_or(0))
    }
}

#[async_trait]
impl IdempotencyRepository for MemoryStore {
    async fn find_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
    ) -> StoreResult<Option<ActionResponse>> {
        Ok(self
            .lock()
            .action_results
            .get(&(session_id, request_id.to_string()))
            .cloned())
    }

    async fn save_action_result(
        &self,
        session_id: SessionId,
        request_id: &str,
        response: &ActionResponse,
    ) -> StoreResult<bool> {
        let mut state = self.lock();
        let key = (session_id, request_id.to_string());
        if state.action_results.contains_key(&key) {
            return Ok(false);
        }
        state.action_results.insert(key, response.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn agent(id: &str) -> Agent {
        Agent {
            agent_id: id.to_string(),
            display_name: id.to_string(),
            api_key_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    fn event(table_id: TableId, seq: i64) -> ReplayEvent {
        ReplayEvent {
            table_id,
            global_seq: seq,
            hand_seq: Some(seq),
            event_type: "action_applied".to_string(),
            payload: json!({ "seq": seq }),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_debit_is_guarded() {
        let store = MemoryStore::new();
        store.create_agent(&agent("a"), 100).await.unwrap();

        assert_eq!(store.debit("a", 60, EntryType::Bet, "t").await.unwrap(), 40);
        let err = store.debit("a", 60, EntryType::Bet, "t").await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { available: 40, .. }));
        assert_eq!(store.balance("a").await.unwrap(), 40);

        let entries = store.ledger_entries("a");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].amount, -60);
        assert_eq!(entries[1].balance_after, 40);
    }

    #[tokio::test]
    async fn test_duplicate_agent_conflicts() {
        let store = MemoryStore::new();
        store.create_agent(&agent("a"), 0).await.unwrap();
        assert!(matches!(
            store.create_agent(&agent("a"), 0).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_range_and_snapshot_lookup() {
        let store = MemoryStore::new();
        let table = Uuid::new_v4();
        for seq in 1..=5 {
            store.append_replay_event(&event(table, seq)).await.unwrap();
        }
        assert!(store.append_replay_event(&event(table, 3)).await.is_err());
        assert_eq!(store.last_replay_sequence(table).await.unwrap(), 5);
        assert_eq!(store.last_replay_sequence(Uuid::new_v4()).await.unwrap(), 0);

        let events = store.replay_events(table, 2, 4).await.unwrap();
        assert_eq!(events.iter().map(|e| e.global_seq).collect::<Vec<_>>(), vec![2, 3, 4]);

        for seq in [2, 4] {
            store
                .append_replay_snapshot(&ReplaySnapshot {
                    table_id: table,
                    global_seq: seq,
                    state: Default::default(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let snap = store.latest_snapshot_at_or_before(table, 3).await.unwrap().unwrap();
        assert_eq!(snap.global_seq, 2);
        assert!(store.latest_snapshot_at_or_before(table, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_action_result_written_once() {
        let store = MemoryStore::new();
        let session = Uuid::new_v4();
        let first = ActionResponse::accepted("r1");
        let second = ActionResponse::rejected("r1", "invalid_action", "nope");

        assert!(store.save_action_result(session, "r1", &first).await.unwrap());
        assert!(!store.save_action_result(session, "r1", &second).await.unwrap());
        assert_eq!(store.find_action_result(session, "r1").await.unwrap(), Some(first));
        assert_eq!(store.action_result_count(session), 1);
    }
}
