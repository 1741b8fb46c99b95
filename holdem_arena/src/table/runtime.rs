//! One live heads-up table.
//!
//! A [`TableRuntime`] owns the rules engine, both seats, the turn and
//! reconnect deadlines and the table's replay log, all behind one async
//! mutex. Ledger debits/credits and replay appends happen while that lock
//! is held; they only ever block this table.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Mutex;

use super::{
    config::ArenaConfig,
    messages::{ActionLogEntry, PublicSnapshot, SeatSnapshot, TurnInfo},
    models::{HandSummary, TableStatus},
};
use crate::db::ArenaStore;
use crate::game::{
    Action, ActionKind, EngineError, RulesEngine, SeatIndex, Settlement, Street, TableState,
    entities::{NUM_SEATS, card_codes, opponent},
};
use crate::replay::{ReplayLog, ReplayState};
use crate::session::{
    errors::{ArenaError, ArenaResult},
    models::{ActionRequest, ActionResponse, Room, SessionId, TableId},
};
use crate::stream::{EventBuffer, EventName};
use crate::wallet::WalletError;

/// Applied actions kept for public snapshots.
pub const ACTION_LOG_LIMIT: usize = 50;

/// Longest thought log recorded per action, in characters.
pub const THOUGHT_LOG_LIMIT: usize = 2_000;

/// A seated session and its live event buffer.
#[derive(Clone)]
pub struct SeatSlot {
    pub session_id: SessionId,
    pub agent_id: String,
    pub events: Arc<EventBuffer>,
}

/// Result of a close request against a live table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraceOutcome {
    Started { deadline: DateTime<Utc> },
    AlreadyClosing,
}

/// What a deadline sweep did to one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Idle,
    GraceStarted(SeatIndex),
    Forfeited(SeatIndex),
}

struct TableInner {
    engine: RulesEngine,
    status: TableStatus,
    turn_seq: u64,
    turn_id: Option<String>,
    turn_deadline: Option<DateTime<Utc>>,
    reconnect_deadline: Option<DateTime<Utc>>,
    disconnected_seat: Option<SeatIndex>,
    reason: Option<String>,
    replay: ReplayLog,
    action_log: VecDeque<ActionLogEntry>,
}

pub struct TableRuntime {
    id: TableId,
    room: Room,
    seats: [SeatSlot; NUM_SEATS],
    public: Arc<EventBuffer>,
    store: Arc<dyn ArenaStore>,
    config: Arc<ArenaConfig>,
    closed: AtomicBool,
    inner: Mutex<TableInner>,
}

fn delta(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl TableRuntime {
    pub fn new(
        id: TableId,
        room: Room,
        seats: [SeatSlot; NUM_SEATS],
        public: Arc<EventBuffer>,
        store: Arc<dyn ArenaStore>,
        config: Arc<ArenaConfig>,
        replay: ReplayLog,
    ) -> Self {
        let engine = RulesEngine::new(id.to_string(), config.action_timeout_secs);
        Self {
            id,
            room,
            seats,
            public,
            store,
            config,
            closed: AtomicBool::new(false),
            inner: Mutex::new(TableInner {
                engine,
                status: TableStatus::Active,
                turn_seq: 0,
                turn_id: None,
                turn_deadline: None,
                reconnect_deadline: None,
                disconnected_seat: None,
                reason: None,
                replay,
                action_log: VecDeque::with_capacity(ACTION_LOG_LIMIT),
            }),
        }
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn seat(&self, seat: SeatIndex) -> Option<&SeatSlot> {
        self.seats.get(seat)
    }

    pub fn seat_of_session(&self, session_id: SessionId) -> Option<SeatIndex> {
        self.seats.iter().position(|s| s.session_id == session_id)
    }

    pub fn public_events(&self) -> &Arc<EventBuffer> {
        &self.public
    }

    /// Lock-free check for the terminal state.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deal the first hand and push the opening state.
    pub async fn start(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        info!(
            "Table {} starting in room {}: {} vs {}",
            self.id, self.room.id, self.seats[0].agent_id, self.seats[1].agent_id
        );
        if self.begin_hand(&mut inner, now).await {
            self.publish_state(&mut inner).await;
        }
    }

    /// Validate and apply one action submission.
    ///
    /// Validation failures come back as a rejected [`ActionResponse`] and
    /// are recorded for idempotent retries. `Err` is reserved for a table
    /// that is not accepting actions and for infrastructure failures; those
    /// are never recorded.
    pub async fn submit_action(
        &self,
        seat: SeatIndex,
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> ArenaResult<ActionResponse> {
        let session_id = self.seats[seat].session_id;
        let mut inner = self.inner.lock().await;

        if let Some(prior) = self
            .store
            .find_action_result(session_id, &request.request_id)
            .await?
        {
            return Ok(prior);
        }

        match inner.status {
            TableStatus::Closed => return Err(ArenaError::TableClosed),
            TableStatus::Closing if inner.disconnected_seat == Some(seat) => {
                return Err(ArenaError::TableClosing);
            }
            TableStatus::Closing => return Err(ArenaError::OpponentDisconnected),
            TableStatus::Active => {}
        }

        let response = match self.apply(&mut inner, seat, request, now).await? {
            Ok(response) => response,
            Err((code, message)) => {
                let response = ActionResponse::rejected(&request.request_id, code, message);
                debug!(
                    "Table {}: rejected {} from seat {seat}: {code}",
                    self.id, request.action
                );
                self.publish_seat(seat, EventName::ActionRejected, json!(response));
                metrics::counter!("arena_actions_rejected_total", "reason" => code).increment(1);
                response
            }
        };

        match self
            .store
            .save_action_result(session_id, &request.request_id, &response)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "Table {}: action result for {session_id}/{} already recorded",
                self.id, request.request_id
            ),
            Err(e) => error!(
                "Table {}: failed to record action result {}: {e}",
                self.id, request.request_id
            ),
        }

        if response.accepted && !self.is_closed() {
            self.publish_state(&mut inner).await;
        }
        Ok(response)
    }

    async fn apply(
        &self,
        inner: &mut TableInner,
        seat: SeatIndex,
        request: &ActionRequest,
        now: DateTime<Utc>,
    ) -> ArenaResult<Result<ActionResponse, (&'static str, String)>> {
        if inner.turn_id.as_deref() != Some(request.turn_id.as_str()) {
            return Ok(Err((
                "invalid_turn_id",
                "turn id does not match the current turn".to_string(),
            )));
        }
        let state = inner.engine.state();
        if !state.in_progress() || state.current_actor != seat {
            return Ok(Err(("not_your_turn", "not your turn".to_string())));
        }
        let kind = match request.action.parse::<ActionKind>() {
            Ok(kind) => kind,
            Err(message) => return Ok(Err(("invalid_action", message))),
        };

        let street = state.street;
        let contributed = state.total_contrib[seat];
        let action = Action {
            seat,
            kind,
            amount: request.amount,
        };
        let round_complete = match inner.engine.apply_action(&action, &*self.store).await {
            Ok(done) => done,
            Err(e @ EngineError::Ledger(WalletError::InsufficientBalance { .. })) => {
                return Ok(Err((e.reason(), e.to_string())));
            }
            Err(e) if e.is_rejection() => return Ok(Err((e.reason(), e.to_string()))),
            Err(e) => return Err(e.into()),
        };

        let state = inner.engine.state();
        let agent_id = self.seats[seat].agent_id.clone();
        let committed = state.total_contrib[seat] - contributed;
        let entry = ActionLogEntry {
            hand_no: state.hand_no,
            street,
            seat,
            agent_id: agent_id.clone(),
            action: kind,
            amount: (committed > 0).then_some(committed),
            pot_after: state.pot,
            at: now,
        };
        if inner.action_log.len() == ACTION_LOG_LIMIT {
            inner.action_log.pop_front();
        }
        inner.action_log.push_back(entry.clone());
        metrics::counter!("arena_actions_accepted_total").increment(1);

        self.publish_seat(
            seat,
            EventName::ActionAccepted,
            json!({ "request_id": request.request_id, "action": kind, "amount": entry.amount }),
        );
        self.emit(
            inner,
            EventName::ActionApplied,
            json!({
                "turn_id": request.turn_id,
                "entry": entry,
                "round_complete": round_complete,
            }),
        )
        .await;

        if let Some(thought) = request
            .thought_log
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let text: String = thought.chars().take(THOUGHT_LOG_LIMIT).collect();
            let payload = json!({ "seat": seat, "agent_id": agent_id, "text": text });
            self.record(inner, EventName::ThoughtLog, payload.clone()).await;
            self.public.publish(EventName::ThoughtLog, payload);
        }

        if round_complete {
            self.resolve_round(inner, now).await;
        } else {
            self.next_turn(inner, now);
        }
        Ok(Ok(ActionResponse::accepted(&request.request_id)))
    }

    /// Handle the end of a betting round. Returns `false` if the table
    /// closed.
    async fn resolve_round(&self, inner: &mut TableInner, now: DateTime<Utc>) -> bool {
        let state = inner.engine.state();
        let folded = state.folded_seat().is_some();
        let hand_over = folded || state.any_all_in() || state.street == Some(Street::River);

        if hand_over {
            if !folded && state.street != Some(Street::River) {
                if let Err(e) = inner.engine.fast_forward_to_showdown() {
                    error!("Table {}: failed to run out the board: {e}", self.id);
                    self.close_table(inner, "engine_error", now).await;
                    return false;
                }
                let state = inner.engine.state();
                let payload = json!({
                    "street": state.street,
                    "board": card_codes(&state.community),
                    "fast_forward": true,
                });
                self.emit(inner, EventName::StreetAdvanced, payload).await;
            }
            if self.finish_hand(inner, now).await.is_none() {
                self.close_table(inner, "settlement_failed", now).await;
                return false;
            }
            return self.begin_hand(inner, now).await;
        }

        match inner.engine.next_street() {
            Ok(street) => {
                self.next_turn(inner, now);
                let payload = json!({
                    "street": street,
                    "board": card_codes(&inner.engine.state().community),
                    "turn_id": inner.turn_id,
                });
                self.emit(inner, EventName::StreetAdvanced, payload).await;
                true
            }
            Err(e) => {
                error!("Table {}: failed to advance street: {e}", self.id);
                self.close_table(inner, "engine_error", now).await;
                false
            }
        }
    }

    /// Start the next hand. Returns `false` if the table closed instead.
    async fn begin_hand(&self, inner: &mut TableInner, now: DateTime<Utc>) -> bool {
        let started = inner
            .engine
            .start_hand(
                &self.seats[0].agent_id,
                &self.seats[1].agent_id,
                self.room.small_blind,
                self.room.big_blind,
                &*self.store,
            )
            .await;
        if let Err(e) = started {
            error!("Table {}: failed to start hand: {e}", self.id);
            self.close_table(inner, "hand_start_failed", now).await;
            return false;
        }

        let state = inner.engine.state();
        let payload = json!({
            "hand_no": state.hand_no,
            "dealer": state.dealer,
            "small_blind": state.small_blind,
            "big_blind": state.big_blind,
            "stacks": state.players.iter().map(|p| p.stack).collect::<Vec<_>>(),
        });
        let playable = state.in_progress();
        self.emit(inner, EventName::HandStarted, payload).await;

        if !playable {
            info!("Table {}: a stack is below the big blind", self.id);
            self.finish_hand(inner, now).await;
            self.close_table(inner, "insufficient_stack", now).await;
            return false;
        }
        self.next_turn(inner, now);
        true
    }

    /// Settle the current hand and record it.
    async fn finish_hand(&self, inner: &mut TableInner, now: DateTime<Utc>) -> Option<Settlement> {
        let settlement = match inner.engine.settle(&*self.store).await {
            Ok(settlement) => settlement,
            Err(e) => {
                error!("Table {}: failed to settle hand: {e}", self.id);
                return None;
            }
        };
        let state = inner.engine.state();
        let hand_no = state.hand_no;

        if let Some(hands) = &settlement.hands {
            let seats: Vec<Value> = state
                .players
                .iter()
                .zip(hands.iter())
                .enumerate()
                .map(|(seat, (player, hand))| {
                    json!({
                        "seat": seat,
                        "agent_id": player.agent_id,
                        "hole_cards": card_codes(&player.hole_cards),
                        "rank": hand.rank,
                        "category": hand.rank.category(),
                    })
                })
                .collect();
            let payload = json!({
                "hand_no": hand_no,
                "board": card_codes(&state.community),
                "seats": seats,
                "winner": settlement.winner,
            });
            self.emit(inner, EventName::Showdown, payload).await;
        }

        let payload = json!({
            "hand_no": hand_no,
            "winner": settlement.winner,
            "winning_seat": settlement.winning_seat,
            "payouts": settlement.payouts,
            "pot": settlement.pot,
            "main_pot": settlement.main_pot,
            "side_pot": settlement.side_pot,
            "by_fold": settlement.by_fold,
            "ending_street": settlement.ending_street,
        });
        self.emit(inner, EventName::HandSettled, payload).await;

        let summary = HandSummary {
            table_id: self.id,
            hand_no,
            winner: settlement.winner.clone(),
            pot: settlement.pot,
            ending_street: settlement.ending_street,
            ended_at: now,
        };
        if let Err(e) = self.store.end_hand(&summary).await {
            error!("Table {}: failed to record hand {hand_no}: {e}", self.id);
        }
        metrics::counter!("arena_hands_settled_total").increment(1);
        Some(settlement)
    }

    fn next_turn(&self, inner: &mut TableInner, now: DateTime<Utc>) {
        inner.turn_seq += 1;
        inner.turn_id = Some(format!(
            "{}.{}",
            inner.engine.state().hand_no,
            inner.turn_seq
        ));
        inner.turn_deadline = Some(now + delta(self.config.action_timeout_secs));
    }

    fn turn_info(&self, inner: &TableInner) -> Option<TurnInfo> {
        if inner.status != TableStatus::Active {
            return None;
        }
        let state = inner.engine.state();
        if !state.in_progress() {
            return None;
        }
        let turn_id = inner.turn_id.clone()?;
        let actor = state.current_actor;
        Some(TurnInfo {
            turn_id,
            actor,
            agent_id: state.players[actor].agent_id.clone(),
            legal_actions: state.legal_actions(actor),
            to_call: state.to_call(actor),
            min_raise_to: state.min_raise_to(),
            deadline: inner.turn_deadline,
        })
    }

    /// Record a state snapshot and push fresh views to both seats, the
    /// current turn, and the public table view.
    async fn publish_state(&self, inner: &mut TableInner) {
        let captured = ReplayState::capture(
            inner.engine.state(),
            inner.turn_id.as_deref(),
            inner.status,
        );
        self.record(
            inner,
            EventName::StateSnapshot,
            serde_json::to_value(&captured).unwrap_or_default(),
        )
        .await;

        for seat in 0..NUM_SEATS {
            let snapshot = SeatSnapshot::build(
                self.id,
                inner.status,
                inner.engine.state(),
                inner.turn_id.as_deref(),
                seat,
            );
            self.publish_seat(seat, EventName::StateSnapshot, json!(snapshot));
        }

        if let Some(turn) = self.turn_info(inner) {
            self.emit(inner, EventName::TurnStarted, json!(turn)).await;
        }

        let public = self.public_snapshot(inner);
        self.public.publish(EventName::StateSnapshot, json!(public));
    }

    fn public_snapshot(&self, inner: &TableInner) -> PublicSnapshot {
        PublicSnapshot::build(
            self.id,
            &self.room.id,
            inner.status,
            inner.engine.state(),
            inner.turn_id.as_deref(),
            inner.action_log.iter().cloned().collect(),
        )
    }

    /// Put the table into reconnect grace for `seat`.
    pub async fn begin_grace(
        &self,
        seat: SeatIndex,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ArenaResult<GraceOutcome> {
        let mut inner = self.inner.lock().await;
        let status = inner.status;
        match status {
            TableStatus::Closed => Err(ArenaError::TableClosed),
            TableStatus::Closing => Ok(GraceOutcome::AlreadyClosing),
            TableStatus::Active => {
                let deadline = self.start_grace(&mut inner, seat, reason, now).await;
                Ok(GraceOutcome::Started { deadline })
            }
        }
    }

    async fn start_grace(
        &self,
        inner: &mut TableInner,
        seat: SeatIndex,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let deadline = now + delta(self.config.reconnect_grace_secs);
        inner.status = TableStatus::Closing;
        inner.disconnected_seat = Some(seat);
        inner.reason = Some(reason.to_string());
        inner.turn_deadline = None;
        inner.reconnect_deadline = Some(deadline);

        let agent_id = &self.seats[seat].agent_id;
        info!(
            "Table {}: seat {seat} ({agent_id}) disconnected ({reason}), grace until {deadline}",
            self.id
        );
        let payload = json!({
            "seat": seat,
            "agent_id": agent_id,
            "reason": reason,
            "deadline": deadline,
        });
        self.emit(inner, EventName::ReconnectGraceStarted, payload).await;

        if let Err(e) = self
            .store
            .update_table_status(self.id, TableStatus::Closing, Some(reason))
            .await
        {
            warn!("Table {}: failed to persist closing status: {e}", self.id);
        }
        metrics::counter!("arena_reconnect_grace_total").increment(1);
        deadline
    }

    /// Restore `seat` if it is the disconnected seat and its grace window
    /// is still open.
    pub async fn reconnect(&self, seat: SeatIndex, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().await;
        let within_grace = inner.reconnect_deadline.is_some_and(|d| now < d);
        if inner.status != TableStatus::Closing
            || inner.disconnected_seat != Some(seat)
            || !within_grace
        {
            return false;
        }

        inner.status = TableStatus::Active;
        inner.disconnected_seat = None;
        inner.reconnect_deadline = None;
        inner.reason = None;
        inner.turn_deadline = Some(now + delta(self.config.action_timeout_secs));

        let agent_id = &self.seats[seat].agent_id;
        info!("Table {}: seat {seat} ({agent_id}) reconnected", self.id);
        let payload = json!({ "seat": seat, "agent_id": agent_id });
        self.emit(&mut inner, EventName::OpponentReconnected, payload).await;

        if let Err(e) = self
            .store
            .update_table_status(self.id, TableStatus::Active, None)
            .await
        {
            warn!("Table {}: failed to persist active status: {e}", self.id);
        }
        self.publish_state(&mut inner).await;
        true
    }

    /// Check the turn and reconnect deadlines against `now`.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepOutcome {
        let mut inner = self.inner.lock().await;
        let status = inner.status;
        match status {
            TableStatus::Active if inner.turn_deadline.is_some_and(|d| now >= d) => {
                let seat = inner.engine.state().current_actor;
                self.start_grace(&mut inner, seat, "opponent_action_timeout", now)
                    .await;
                SweepOutcome::GraceStarted(seat)
            }
            TableStatus::Closing if inner.reconnect_deadline.is_some_and(|d| now >= d) => {
                let seat = inner
                    .disconnected_seat
                    .unwrap_or(inner.engine.state().current_actor);
                self.forfeit(&mut inner, seat, now).await;
                SweepOutcome::Forfeited(seat)
            }
            _ => SweepOutcome::Idle,
        }
    }

    async fn forfeit(&self, inner: &mut TableInner, seat: SeatIndex, now: DateTime<Utc>) {
        let agent_id = self.seats[seat].agent_id.clone();
        info!(
            "Table {}: seat {seat} ({agent_id}) forfeits, {} wins",
            self.id, self.seats[opponent(seat)].agent_id
        );
        inner.engine.forfeit(seat);
        let payload = json!({
            "seat": seat,
            "agent_id": agent_id,
            "reason": inner.reason,
        });
        self.emit(inner, EventName::OpponentForfeited, payload).await;

        let state = inner.engine.state();
        if state.street.is_some() && !state.settled {
            self.finish_hand(inner, now).await;
        }
        metrics::counter!("arena_forfeits_total").increment(1);
        self.close_table(inner, "forfeit", now).await;
    }

    async fn close_table(&self, inner: &mut TableInner, reason: &str, now: DateTime<Utc>) {
        if inner.status == TableStatus::Closed {
            return;
        }
        inner.status = TableStatus::Closed;
        inner.reason = Some(reason.to_string());
        inner.turn_id = None;
        inner.turn_deadline = None;
        inner.reconnect_deadline = None;
        self.closed.store(true, Ordering::SeqCst);

        self.emit(inner, EventName::TableClosed, json!({ "reason": reason }))
            .await;

        if let Err(e) = self
            .store
            .update_table_status(self.id, TableStatus::Closed, Some(reason))
            .await
        {
            error!("Table {}: failed to persist closed status: {e}", self.id);
        }
        for slot in &self.seats {
            if let Err(e) = self.store.close_session(slot.session_id, reason, now).await {
                error!(
                    "Table {}: failed to close session {}: {e}",
                    self.id, slot.session_id
                );
            }
        }
        self.close_streams();
        metrics::counter!("arena_tables_closed_total").increment(1);
        info!("Table {} closed: {reason}", self.id);
    }

    /// End every stream attached to this table.
    pub fn close_streams(&self) {
        for slot in &self.seats {
            slot.events.close();
        }
        self.public.close();
    }

    async fn record(&self, inner: &mut TableInner, name: EventName, payload: Value) -> i64 {
        let TableInner {
            replay,
            engine,
            turn_id,
            status,
            ..
        } = inner;
        let (state, turn_id, status) = (engine.state(), turn_id.as_deref(), *status);
        replay
            .append(name, payload, || ReplayState::capture(state, turn_id, status))
            .await
    }

    /// Append to the replay log and publish to both seats and the public
    /// buffer.
    async fn emit(&self, inner: &mut TableInner, name: EventName, payload: Value) {
        self.record(inner, name, payload.clone()).await;
        for seat in 0..NUM_SEATS {
            self.publish_seat(seat, name, payload.clone());
        }
        self.public.publish(name, payload);
    }

    fn publish_seat(&self, seat: SeatIndex, name: EventName, payload: Value) {
        self.seats[seat].events.publish(name, payload);
    }

    pub async fn status(&self) -> TableStatus {
        self.inner.lock().await.status
    }

    pub async fn turn_id(&self) -> Option<String> {
        self.inner.lock().await.turn_id.clone()
    }

    pub async fn current_turn(&self) -> Option<TurnInfo> {
        let inner = self.inner.lock().await;
        self.turn_info(&inner)
    }

    pub async fn turn_deadline(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.turn_deadline
    }

    pub async fn reconnect_deadline(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.reconnect_deadline
    }

    pub async fn disconnected_seat(&self) -> Option<SeatIndex> {
        self.inner.lock().await.disconnected_seat
    }

    /// Reason recorded for the current closing or closed state.
    pub async fn reason(&self) -> Option<String> {
        self.inner.lock().await.reason.clone()
    }

    pub async fn replay_sequence(&self) -> i64 {
        self.inner.lock().await.replay.sequence()
    }

    /// Copy of the full engine state, hole cards included.
    pub async fn engine_state(&self) -> TableState {
        self.inner.lock().await.engine.state().clone()
    }

    pub async fn seat_state(&self, seat: SeatIndex) -> SeatSnapshot {
        let inner = self.inner.lock().await;
        SeatSnapshot::build(
            self.id,
            inner.status,
            inner.engine.state(),
            inner.turn_id.as_deref(),
            seat,
        )
    }

    pub async fn public_state(&self) -> PublicSnapshot {
        let inner = self.inner.lock().await;
        self.public_snapshot(&inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Agent;
    use crate::db::{
        AgentRepository, MemoryStore, ReplayRepository, SessionRepository, TableRepository,
    };
    use crate::session::models::{Session, SessionStatus};
    use crate::table::models::TableRecord;
    use crate::wallet::Ledger;
    use uuid::Uuid;

    struct Fixture {
        store: Arc<MemoryStore>,
        runtime: TableRuntime,
        now: DateTime<Utc>,
    }

    fn room() -> Room {
        Room {
            id: "main".to_string(),
            name: "Main".to_string(),
            small_blind: 10,
            big_blind: 20,
            min_buyin: 20,
            active: true,
        }
    }

    async fn fixture(balances: [i64; 2]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let table_id = Uuid::new_v4();
        let mut sessions = Vec::new();
        let mut slots = Vec::new();
        for (seat, (name, balance)) in ["alice", "bob"].into_iter().zip(balances).enumerate() {
            store
                .create_agent(
                    &Agent {
                        agent_id: name.to_string(),
                        display_name: name.to_string(),
                        api_key_hash: String::new(),
                        created_at: now,
                    },
                    balance,
                )
                .await
                .unwrap();
            let session = Session {
                id: Uuid::new_v4(),
                agent_id: name.to_string(),
                room_id: "main".to_string(),
                table_id: Some(table_id),
                seat: Some(seat),
                status: SessionStatus::Active,
                created_at: now,
                expires_at: now + TimeDelta::hours(6),
                closed_reason: None,
            };
            slots.push(SeatSlot {
                session_id: session.id,
                agent_id: name.to_string(),
                events: Arc::new(EventBuffer::new(session.id.to_string(), 500, 64)),
            });
            sessions.push(session);
        }
        let record = TableRecord {
            id: table_id,
            room_id: "main".to_string(),
            status: TableStatus::Active,
            small_blind: 10,
            big_blind: 20,
            created_at: now,
            closed_reason: None,
        };
        let sessions: [Session; 2] = sessions.try_into().unwrap();
        store.create_table_with_sessions(&record, &sessions).await.unwrap();

        let dyn_store: Arc<dyn ArenaStore> = store.clone();
        let replay = ReplayLog::new(dyn_store.clone(), table_id, 0, 80);
        let slots: [SeatSlot; 2] = slots.try_into().unwrap_or_else(|_| unreachable!());
        let runtime = TableRuntime::new(
            table_id,
            room(),
            slots,
            Arc::new(EventBuffer::new(table_id.to_string(), 500, 64)),
            dyn_store,
            Arc::new(ArenaConfig::default()),
            replay,
        );
        runtime.start(now).await;
        Fixture {
            store,
            runtime,
            now,
        }
    }

    fn request(turn_id: &str, request_id: &str, action: &str, amount: Option<i64>) -> ActionRequest {
        ActionRequest {
            session_id: Uuid::nil(),
            request_id: request_id.to_string(),
            turn_id: turn_id.to_string(),
            action: action.to_string(),
            amount,
            thought_log: None,
        }
    }

    async fn act(f: &Fixture, request_id: &str, action: &str, amount: Option<i64>) -> ActionResponse {
        let turn = f.runtime.current_turn().await.unwrap();
        f.runtime
            .submit_action(turn.actor, &request(&turn.turn_id, request_id, action, amount), f.now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_posts_blinds_and_opens_turn() {
        let f = fixture([1_000, 1_000]).await;
        let state = f.runtime.engine_state().await;
        assert_eq!(state.pot, 30);
        assert_eq!(state.current_actor, state.dealer);

        let turn = f.runtime.current_turn().await.unwrap();
        assert_eq!(turn.to_call, 10);
        assert_eq!(
            f.runtime.turn_deadline().await,
            Some(f.now + TimeDelta::seconds(30))
        );
        assert_eq!(f.store.balance("alice").await.unwrap() + f.store.balance("bob").await.unwrap(), 1_970);
    }

    #[tokio::test]
    async fn test_stale_turn_id_rejected_without_mutation() {
        let f = fixture([1_000, 1_000]).await;
        let before = f.runtime.engine_state().await;
        let actor = before.current_actor;

        let response = f
            .runtime
            .submit_action(actor, &request("0.0", "r1", "call", None), f.now)
            .await
            .unwrap();
        assert!(!response.accepted);
        assert_eq!(response.reason.as_deref(), Some("invalid_turn_id"));
        assert_eq!(f.runtime.engine_state().await.pot, before.pot);
        assert_eq!(f.store.action_result_count(f.runtime.seat(actor).unwrap().session_id), 1);
    }

    #[tokio::test]
    async fn test_out_of_turn_rejected() {
        let f = fixture([1_000, 1_000]).await;
        let turn = f.runtime.current_turn().await.unwrap();
        let response = f
            .runtime
            .submit_action(opponent(turn.actor), &request(&turn.turn_id, "r1", "check", None), f.now)
            .await
            .unwrap();
        assert_eq!(response.reason.as_deref(), Some("not_your_turn"));
    }

    #[tokio::test]
    async fn test_retry_returns_recorded_response() {
        let f = fixture([1_000, 1_000]).await;
        let turn = f.runtime.current_turn().await.unwrap();
        let req = request(&turn.turn_id, "r1", "call", None);
        let first = f.runtime.submit_action(turn.actor, &req, f.now).await.unwrap();
        let pot = f.runtime.engine_state().await.pot;
        let second = f.runtime.submit_action(turn.actor, &req, f.now).await.unwrap();
        assert_eq!(first, second);
        assert!(first.accepted);
        assert_eq!(f.runtime.engine_state().await.pot, pot);
    }

    #[tokio::test]
    async fn test_raise_without_amount_is_invalid_raise() {
        let f = fixture([1_000, 1_000]).await;
        let response = act(&f, "r1", "raise", None).await;
        assert_eq!(response.reason.as_deref(), Some("invalid_raise"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_invalid_action() {
        let f = fixture([1_000, 1_000]).await;
        let response = act(&f, "r1", "dance", None).await;
        assert_eq!(response.reason.as_deref(), Some("invalid_action"));
    }

    #[tokio::test]
    async fn test_call_check_advances_to_flop() {
        let f = fixture([1_000, 1_000]).await;
        let first_turn = f.runtime.turn_id().await;
        assert!(act(&f, "r1", "call", None).await.accepted);
        assert_ne!(f.runtime.turn_id().await, first_turn);
        assert!(act(&f, "r2", "check", None).await.accepted);

        let state = f.runtime.engine_state().await;
        assert_eq!(state.street, Some(Street::Flop));
        assert_eq!(state.community.len(), 3);
        assert_eq!(state.current_actor, opponent(state.dealer));
    }

    #[tokio::test]
    async fn test_fold_settles_and_deals_next_hand() {
        let f = fixture([1_000, 1_000]).await;
        let dealer = f.runtime.engine_state().await.dealer;
        assert!(act(&f, "r1", "fold", None).await.accepted);

        let state = f.runtime.engine_state().await;
        assert_eq!(state.hand_no, 2);
        assert_ne!(state.dealer, dealer);
        let summaries = f.store.hand_summaries(f.runtime.id());
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].pot, 30);
        assert_eq!(summaries[0].ending_street, Street::Preflop);
    }

    #[tokio::test]
    async fn test_timeout_grace_then_forfeit() {
        let f = fixture([1_000, 1_000]).await;
        let actor = f.runtime.engine_state().await.current_actor;
        let later = f.now + TimeDelta::seconds(31);

        assert_eq!(f.runtime.sweep(later).await, SweepOutcome::GraceStarted(actor));
        assert_eq!(f.runtime.status().await, TableStatus::Closing);
        assert_eq!(f.runtime.reason().await.as_deref(), Some("opponent_action_timeout"));
        assert_eq!(f.runtime.sweep(later).await, SweepOutcome::Idle);

        let expired = later + TimeDelta::seconds(30);
        assert_eq!(f.runtime.sweep(expired).await, SweepOutcome::Forfeited(actor));
        assert!(f.runtime.is_closed());
        assert_eq!(f.runtime.sweep(expired).await, SweepOutcome::Idle);

        let winner = &f.runtime.seat(opponent(actor)).unwrap().agent_id;
        assert_eq!(f.store.balance(winner).await.unwrap(), 1_000 + 10);
        for seat in 0..2 {
            let session_id = f.runtime.seat(seat).unwrap().session_id;
            let session = f.store.find_session(session_id).await.unwrap().unwrap();
            assert_eq!(session.status, SessionStatus::Closed);
        }
        let record = f.store.find_table(f.runtime.id()).await.unwrap().unwrap();
        assert_eq!(record.status, TableStatus::Closed);
    }

    #[tokio::test]
    async fn test_reconnect_within_grace_restores_active() {
        let f = fixture([1_000, 1_000]).await;
        let outcome = f.runtime.begin_grace(1, "client_closed", f.now).await.unwrap();
        assert!(matches!(outcome, GraceOutcome::Started { .. }));
        assert_eq!(
            f.runtime.begin_grace(1, "client_closed", f.now).await.unwrap(),
            GraceOutcome::AlreadyClosing
        );

        assert!(!f.runtime.reconnect(0, f.now).await);
        assert!(f.runtime.reconnect(1, f.now + TimeDelta::seconds(5)).await);
        assert_eq!(f.runtime.status().await, TableStatus::Active);
        assert_eq!(f.runtime.reconnect_deadline().await, None);
        assert!(f.runtime.turn_deadline().await.is_some());
    }

    #[tokio::test]
    async fn test_reconnect_after_deadline_fails() {
        let f = fixture([1_000, 1_000]).await;
        f.runtime.begin_grace(0, "client_closed", f.now).await.unwrap();
        assert!(!f.runtime.reconnect(0, f.now + TimeDelta::seconds(30)).await);
    }

    #[tokio::test]
    async fn test_actions_blocked_while_closing() {
        let f = fixture([1_000, 1_000]).await;
        let turn = f.runtime.current_turn().await.unwrap();
        f.runtime.begin_grace(turn.actor, "client_closed", f.now).await.unwrap();

        let err = f
            .runtime
            .submit_action(turn.actor, &request(&turn.turn_id, "r1", "call", None), f.now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "table_closing");
        let err = f
            .runtime
            .submit_action(opponent(turn.actor), &request(&turn.turn_id, "r2", "call", None), f.now)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "opponent_disconnected");
    }

    #[tokio::test]
    async fn test_short_stack_closes_table() {
        let f = fixture([1_000, 15]).await;
        assert!(f.runtime.is_closed());
        assert_eq!(f.runtime.reason().await.as_deref(), Some("insufficient_stack"));
        assert_eq!(f.store.balance("bob").await.unwrap(), 15);
        assert_eq!(f.store.balance("alice").await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn test_replay_log_records_every_step() {
        let f = fixture([1_000, 1_000]).await;
        act(&f, "r1", "call", None).await;
        let seq = f.runtime.replay_sequence().await;
        let events = f.store.replay_events(f.runtime.id(), 1, seq).await.unwrap();
        assert_eq!(events.len() as i64, seq);
        let names: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(names[0], "hand_started");
        assert!(names.contains(&"action_applied"));
        assert_eq!(names.last().copied(), Some("turn_started"));
    }
}
