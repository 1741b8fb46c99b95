use chrono::Utc;
use log::{error, warn};
use serde_json::Value;
use std::sync::Arc;

use super::models::{ReconstructedState, ReplayEvent, ReplaySnapshot, ReplayState};
use crate::db::{ArenaStore, ReplayRepository, StoreError, StoreResult};
use crate::session::models::TableId;
use crate::stream::EventName;

/// Events appended between automatic snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 80;

/// Append-only event log for one table.
///
/// Sequence numbers are assigned in memory and advance even when a write
/// fails, so a failed append leaves a detectable gap instead of blocking
/// the table.
pub struct ReplayLog {
    table_id: TableId,
    store: Arc<dyn ArenaStore>,
    global_seq: i64,
    hand_seq: Option<i64>,
    since_snapshot: u64,
    snapshot_interval: u64,
}

impl ReplayLog {
    /// Log starting after `last_seq`.
    pub fn new(
        store: Arc<dyn ArenaStore>,
        table_id: TableId,
        last_seq: i64,
        snapshot_interval: u64,
    ) -> Self {
        Self {
            table_id,
            store,
            global_seq: last_seq.max(0),
            hand_seq: None,
            since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Resume from the last durably stored sequence for `table_id`.
    pub async fn open(
        store: Arc<dyn ArenaStore>,
        table_id: TableId,
        snapshot_interval: u64,
    ) -> StoreResult<Self> {
        let last_seq = store.last_replay_sequence(table_id).await?;
        Ok(Self::new(store, table_id, last_seq, snapshot_interval))
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Last assigned global sequence.
    pub fn sequence(&self) -> i64 {
        self.global_seq
    }

    pub fn hand_sequence(&self) -> Option<i64> {
        self.hand_seq
    }

    /// Append one event and return its global sequence. Every
    /// `snapshot_interval` events a snapshot built by `snapshot` is written
    /// at the same sequence.
    pub async fn append<F>(&mut self, event_type: EventName, payload: Value, snapshot: F) -> i64
    where
        F: FnOnce() -> ReplayState,
    {
        self.global_seq += 1;
        self.hand_seq = if event_type == EventName::HandStarted {
            Some(0)
        } else {
            self.hand_seq.map(|seq| seq + 1)
        };

        let event = ReplayEvent {
            table_id: self.table_id,
            global_seq: self.global_seq,
            hand_seq: self.hand_seq,
            event_type: event_type.as_str().to_string(),
            payload,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_replay_event(&event).await {
            error!(
                "Table {}: failed to append replay event {} ({event_type}): {e}",
                self.table_id, self.global_seq
            );
            metrics::counter!("arena_replay_write_failures_total").increment(1);
        }

        self.since_snapshot += 1;
        if self.since_snapshot >= self.snapshot_interval {
            self.since_snapshot = 0;
            let snapshot = ReplaySnapshot {
                table_id: self.table_id,
                global_seq: self.global_seq,
                state: snapshot(),
                created_at: Utc::now(),
            };
            if let Err(e) = self.store.append_replay_snapshot(&snapshot).await {
                error!(
                    "Table {}: failed to write snapshot at {}: {e}",
                    self.table_id, self.global_seq
                );
                metrics::counter!("arena_replay_write_failures_total").increment(1);
            }
        }

        self.global_seq
    }
}

/// Rebuild the table state as of global sequence `seq`.
///
/// Starts from the latest snapshot at or before `seq` and applies the
/// stored events after it. `state_snapshot` events replace the working
/// state; every other event type is a marker.
pub async fn reconstruct<R>(store: &R, table_id: TableId, seq: i64) -> StoreResult<ReconstructedState>
where
    R: ReplayRepository + ?Sized,
{
    if seq < 1 {
        return Err(StoreError::NotFound(format!("replay sequence {seq}")));
    }

    let snapshot = store.latest_snapshot_at_or_before(table_id, seq).await?;
    let (mut state, mut applied_seq) = match snapshot {
        Some(snapshot) => (snapshot.state, snapshot.global_seq),
        None => (ReplayState::default(), 0),
    };

    let events = store.replay_events(table_id, applied_seq + 1, seq).await?;
    if applied_seq == 0 && events.is_empty() {
        return Err(StoreError::NotFound(format!(
            "replay sequence {seq} for table {table_id}"
        )));
    }

    let mut last_event_type = None;
    for event in events {
        if event.event_type == EventName::StateSnapshot.as_str() {
            match serde_json::from_value::<ReplayState>(event.payload) {
                Ok(next) => state = next,
                Err(e) => warn!(
                    "Table {table_id}: unreadable state snapshot at {}: {e}",
                    event.global_seq
                ),
            }
        }
        applied_seq = event.global_seq;
        last_event_type = Some(event.event_type);
    }

    Ok(ReconstructedState {
        table_id,
        seq: applied_seq,
        state,
        last_event_type,
    })
}
