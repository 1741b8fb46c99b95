//! Seat-scoped and public views of a table.
//!
//! These are the payloads of `state_snapshot` and `turn_started` events and
//! of the state queries exposed to transports. Only [`SeatSnapshot`] ever
//! carries hole cards, and only the viewing seat's own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::TableStatus;
use crate::game::entities::{ActionKind, Chips, SeatIndex, Street, TableState, card_codes};
use crate::session::models::TableId;

/// Public per-seat fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat: SeatIndex,
    pub agent_id: String,
    pub stack: Chips,
    pub round_bet: Chips,
    pub total_contrib: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub last_action: Option<ActionKind>,
}

impl SeatView {
    pub fn all(state: &TableState) -> Vec<SeatView> {
        state
            .players
            .iter()
            .enumerate()
            .map(|(seat, p)| SeatView {
                seat,
                agent_id: p.agent_id.clone(),
                stack: p.stack,
                round_bet: state.round_bets[seat],
                total_contrib: state.total_contrib[seat],
                folded: p.folded,
                all_in: p.all_in,
                last_action: p.last_action,
            })
            .collect()
    }
}

/// One applied action, as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub hand_no: u64,
    pub street: Option<Street>,
    pub seat: SeatIndex,
    pub agent_id: String,
    pub action: ActionKind,
    pub amount: Option<Chips>,
    pub pot_after: Chips,
    pub at: DateTime<Utc>,
}

/// State pushed to one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub table_id: TableId,
    pub table_status: TableStatus,
    pub hand_no: u64,
    pub street: Option<Street>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub board: Vec<String>,
    pub seats: Vec<SeatView>,
    pub current_actor: Option<SeatIndex>,
    pub turn_id: Option<String>,
    pub action_timeout_secs: u64,
    pub your_seat: SeatIndex,
    pub hole_cards: Vec<String>,
    pub legal_actions: Vec<ActionKind>,
}

impl SeatSnapshot {
    pub fn build(
        table_id: TableId,
        table_status: TableStatus,
        state: &TableState,
        turn_id: Option<&str>,
        seat: SeatIndex,
    ) -> Self {
        let in_progress = state.in_progress();
        Self {
            table_id,
            table_status,
            hand_no: state.hand_no,
            street: state.street,
            pot: state.pot,
            current_bet: state.current_bet,
            board: card_codes(&state.community),
            seats: SeatView::all(state),
            current_actor: in_progress.then_some(state.current_actor),
            turn_id: turn_id.map(str::to_string),
            action_timeout_secs: state.action_timeout_secs,
            your_seat: seat,
            hole_cards: card_codes(&state.players[seat].hole_cards),
            legal_actions: if table_status == TableStatus::Active {
                state.legal_actions(seat)
            } else {
                Vec::new()
            },
        }
    }
}

/// State pushed to spectators. Carries no hole cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSnapshot {
    pub table_id: TableId,
    pub room_id: String,
    pub table_status: TableStatus,
    pub hand_no: u64,
    pub street: Option<Street>,
    pub pot: Chips,
    pub current_bet: Chips,
    pub board: Vec<String>,
    pub seats: Vec<SeatView>,
    pub current_actor: Option<SeatIndex>,
    pub turn_id: Option<String>,
    pub recent_actions: Vec<ActionLogEntry>,
}

impl PublicSnapshot {
    pub fn build(
        table_id: TableId,
        room_id: &str,
        table_status: TableStatus,
        state: &TableState,
        turn_id: Option<&str>,
        recent_actions: Vec<ActionLogEntry>,
    ) -> Self {
        Self {
            table_id,
            room_id: room_id.to_string(),
            table_status,
            hand_no: state.hand_no,
            street: state.street,
            pot: state.pot,
            current_bet: state.current_bet,
            board: card_codes(&state.community),
            seats: SeatView::all(state),
            current_actor: state.in_progress().then_some(state.current_actor),
            turn_id: turn_id.map(str::to_string),
            recent_actions,
        }
    }
}

/// Payload of `turn_started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub turn_id: String,
    pub actor: SeatIndex,
    pub agent_id: String,
    pub legal_actions: Vec<ActionKind>,
    pub to_call: Chips,
    pub min_raise_to: Chips,
    pub deadline: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, Player, Suit};
    use uuid::Uuid;

    fn dealt_state() -> TableState {
        let mut state = TableState {
            players: [Player::new("alice", 990), Player::new("bob", 980)],
            street: Some(Street::Preflop),
            pot: 30,
            current_bet: 20,
            min_raise: 20,
            round_bets: [10, 20],
            total_contrib: [10, 20],
            big_blind: 20,
            small_blind: 10,
            ..TableState::default()
        };
        state.players[0].hole_cards = vec![Card(14, Suit::Spade), Card(13, Suit::Spade)];
        state.players[1].hole_cards = vec![Card(2, Suit::Heart), Card(7, Suit::Club)];
        state
    }

    #[test]
    fn test_seat_snapshot_shows_only_own_cards() {
        let state = dealt_state();
        let snapshot = SeatSnapshot::build(Uuid::new_v4(), TableStatus::Active, &state, Some("t1"), 1);
        assert_eq!(snapshot.hole_cards, vec!["2h", "7c"]);
        assert_eq!(snapshot.current_actor, Some(0));
        assert!(snapshot.legal_actions.is_empty());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("As"));
    }

    #[test]
    fn test_public_snapshot_has_no_hole_cards() {
        let state = dealt_state();
        let snapshot =
            PublicSnapshot::build(Uuid::new_v4(), "main", TableStatus::Active, &state, None, vec![]);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("As"));
        assert!(!json.contains("hole_cards"));
        assert_eq!(snapshot.seats[1].round_bet, 20);
    }

    #[test]
    fn test_closing_table_offers_no_actions() {
        let state = dealt_state();
        let snapshot = SeatSnapshot::build(Uuid::new_v4(), TableStatus::Closing, &state, None, 0);
        assert!(snapshot.legal_actions.is_empty());
    }
}
