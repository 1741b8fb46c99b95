//! Durable replay rows and the reconstructable table state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::entities::{Chips, SeatIndex, Street, TableState, card_codes};
use crate::session::models::TableId;
use crate::table::models::TableStatus;

/// One appended replay row. `global_seq` is strictly increasing per table
/// with no gaps from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub table_id: TableId,
    pub global_seq: i64,
    pub hand_seq: Option<i64>,
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Full state persisted at `global_seq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub table_id: TableId,
    pub global_seq: i64,
    pub state: ReplayState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatState {
    pub seat: SeatIndex,
    pub agent_id: String,
    pub stack: Chips,
    pub round_bet: Chips,
    pub total_contrib: Chips,
    pub folded: bool,
    pub all_in: bool,
}

/// Table state as recorded in snapshots and `state_snapshot` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayState {
    pub hand_no: u64,
    pub street: Option<Street>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub board: Vec<String>,
    pub seats: Vec<SeatState>,
    pub current_actor: Option<SeatIndex>,
    pub turn_id: Option<String>,
    pub table_status: TableStatus,
}

impl Default for ReplayState {
    fn default() -> Self {
        Self {
            hand_no: 0,
            street: None,
            pot: 0,
            current_bet: 0,
            board: Vec::new(),
            seats: Vec::new(),
            current_actor: None,
            turn_id: None,
            table_status: TableStatus::Active,
        }
    }
}

impl ReplayState {
    /// Capture the public portion of an engine state. Hole cards are never
    /// recorded.
    pub fn capture(state: &TableState, turn_id: Option<&str>, table_status: TableStatus) -> Self {
        let seats = state
            .players
            .iter()
            .enumerate()
            .map(|(seat, p)| SeatState {
                seat,
                agent_id: p.agent_id.clone(),
                stack: p.stack,
                round_bet: state.round_bets[seat],
                total_contrib: state.total_contrib[seat],
                folded: p.folded,
                all_in: p.all_in,
            })
            .collect();
        Self {
            hand_no: state.hand_no,
            street: state.street,
            pot: state.pot,
            current_bet: state.current_bet,
            board: card_codes(&state.community),
            seats,
            current_actor: state.in_progress().then_some(state.current_actor),
            turn_id: turn_id.map(str::to_string),
            table_status,
        }
    }
}

/// Result of a point-in-time reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedState {
    pub table_id: TableId,
    pub seq: i64,
    pub state: ReplayState,
    /// Type of the last event applied, if any event was replayed past the
    /// snapshot.
    pub last_event_type: Option<String>,
}
