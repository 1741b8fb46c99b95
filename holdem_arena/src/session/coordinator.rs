use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, error, info, warn};
use rand::seq::IndexedRandom;
use serde_json::json;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use uuid::Uuid;

use super::{
    errors::{ArenaError, ArenaResult},
    models::{
        ActionRequest, ActionResponse, JoinMode, JoinRequest, JoinResponse, Room, Session,
        SessionId, SessionStatus, TableId,
    },
};
use crate::auth::AuthManager;
use crate::db::{ArenaStore, RoomRepository, SessionRepository, StoreError};
use crate::game::entities::NUM_SEATS;
use crate::replay::{ReconstructedState, ReplayEvent, ReplayLog, reconstruct};
use crate::stream::{EventBuffer, EventName, Subscription};
use crate::table::{
    ArenaConfig, GraceOutcome, PublicSnapshot, SeatSlot, SeatSnapshot, SweepOutcome,
    TableRecord, TableRuntime, TableStatus,
};

/// Most replay events returned by one history query.
pub const MAX_REPLAY_PAGE: i64 = 1_000;

/// What closing a session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The session is closed
    Closed,
    /// The session's table entered reconnect grace
    GraceStarted { deadline: DateTime<Utc> },
    /// The table was already in reconnect grace
    AlreadyClosing,
    /// The session is being seated; its table enters reconnect grace as
    /// soon as it opens, or the session closes if the match fails
    Deferred,
}

#[derive(Default)]
struct CoordinatorState {
    sessions: HashMap<SessionId, Session>,
    agent_sessions: HashMap<String, SessionId>,
    buffers: HashMap<SessionId, Arc<EventBuffer>>,
    tables: HashMap<TableId, Arc<TableRuntime>>,
    session_tables: HashMap<SessionId, TableId>,
    waiting: HashMap<String, VecDeque<SessionId>>,
    joining: HashSet<String>,
    /// Waiters claimed for a table that is still being opened, with the
    /// reason of any close requested meanwhile.
    matching: HashMap<SessionId, Option<String>>,
}

/// Waiting session claimed from a room queue.
struct Waiter {
    session: Session,
    events: Arc<EventBuffer>,
}

enum CloseTarget {
    Matching,
    Waiting(Option<Arc<EventBuffer>>),
    Seated(Arc<TableRuntime>),
}

/// Top-level orchestrator: matchmaking, session lifecycle, action routing
/// and deadline sweeps.
///
/// The coordinator's own maps sit behind a std mutex that is never held
/// across an `.await`; all storage and table calls happen after it is
/// released. Each [`TableRuntime`] has its own lock.
pub struct SessionCoordinator {
    store: Arc<dyn ArenaStore>,
    auth: AuthManager,
    config: Arc<ArenaConfig>,
    state: Mutex<CoordinatorState>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn ArenaStore>, config: ArenaConfig) -> Self {
        Self {
            auth: AuthManager::new(store.clone()),
            store,
            config: Arc::new(config),
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_buffer(&self, owner: impl Into<String>) -> Arc<EventBuffer> {
        Arc::new(EventBuffer::new(
            owner,
            self.config.event_buffer_capacity,
            self.config.subscriber_queue_capacity,
        ))
    }

    fn join_response(&self, session: &Session) -> JoinResponse {
        JoinResponse {
            session_id: session.id,
            agent_id: session.agent_id.clone(),
            room_id: session.room_id.clone(),
            table_id: session.table_id,
            seat: session.seat,
            status: session.status,
            stream_url: self.config.stream_url(session.id),
            expires_at: session.expires_at,
        }
    }

    pub async fn create_session(&self, request: JoinRequest) -> ArenaResult<JoinResponse> {
        self.create_session_at(request, Utc::now()).await
    }

    /// Authenticate, resume an open session if possible, otherwise join a
    /// room: wait in its queue or match the agent already waiting there.
    pub async fn create_session_at(
        &self,
        request: JoinRequest,
        now: DateTime<Utc>,
    ) -> ArenaResult<JoinResponse> {
        self.auth
            .authenticate(&request.agent_id, &request.api_key)
            .await?;

        if let Some(response) = self.try_resume(&request.agent_id, now).await? {
            return Ok(response);
        }

        {
            let mut state = self.lock();
            if state.agent_sessions.contains_key(&request.agent_id)
                || !state.joining.insert(request.agent_id.clone())
            {
                return Err(ArenaError::AgentAlreadyInSession);
            }
        }
        let result = self.join_room(&request, now).await;
        self.lock().joining.remove(&request.agent_id);
        result
    }

    /// Reconnect an agent whose table is holding its seat in grace.
    async fn try_resume(
        &self,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> ArenaResult<Option<JoinResponse>> {
        let (session, runtime) = {
            let state = self.lock();
            let Some(session) = state
                .agent_sessions
                .get(agent_id)
                .and_then(|id| state.sessions.get(id))
                .cloned()
            else {
                return Ok(None);
            };
            let runtime = state
                .session_tables
                .get(&session.id)
                .and_then(|table_id| state.tables.get(table_id))
                .cloned();
            (session, runtime)
        };

        let Some(runtime) = runtime else {
            return Err(ArenaError::AgentAlreadyInSession);
        };
        let Some(seat) = runtime.seat_of_session(session.id) else {
            return Err(ArenaError::AgentAlreadyInSession);
        };
        if session.is_expired(now) || !runtime.reconnect(seat, now).await {
            return Err(ArenaError::AgentAlreadyInSession);
        }

        info!(
            "Agent {agent_id} resumed session {} at table {}",
            session.id,
            runtime.id()
        );
        Ok(Some(self.join_response(&session)))
    }

    fn new_session(&self, agent_id: &str, room_id: &str, now: DateTime<Utc>) -> Session {
        let ttl = TimeDelta::from_std(self.config.session_ttl()).unwrap_or(TimeDelta::MAX);
        Session {
            id: Uuid::new_v4(),
            agent_id: agent_id.to_string(),
            room_id: room_id.to_string(),
            table_id: None,
            seat: None,
            status: SessionStatus::Waiting,
            created_at: now,
            expires_at: now + ttl,
            closed_reason: None,
        }
    }

    async fn join_room(&self, request: &JoinRequest, now: DateTime<Utc>) -> ArenaResult<JoinResponse> {
        let room = self.select_room(request).await?;
        let session = self.new_session(&request.agent_id, &room.id, now);

        let claimed = {
            let mut state = self.lock();
            Self::claim_waiter(&mut state, &room.id)
        };
        if let Some(waiter) = claimed {
            return self.open_table(room, waiter, session, false, now).await;
        }

        self.store
            .create_session(&session)
            .await
            .map_err(Self::session_conflict)?;

        let enqueued = {
            let mut state = self.lock();
            match Self::claim_waiter(&mut state, &room.id) {
                Some(waiter) => Err(waiter),
                None => {
                    let buffer = self.new_buffer(session.id.to_string());
                    state
                        .waiting
                        .entry(room.id.clone())
                        .or_default()
                        .push_back(session.id);
                    state.sessions.insert(session.id, session.clone());
                    state
                        .agent_sessions
                        .insert(session.agent_id.clone(), session.id);
                    state.buffers.insert(session.id, buffer.clone());
                    Ok(buffer)
                }
            }
        };

        match enqueued {
            Ok(buffer) => {
                buffer.publish(
                    EventName::SessionJoined,
                    json!({
                        "session_id": session.id,
                        "room_id": session.room_id,
                        "status": session.status,
                    }),
                );
                metrics::counter!("arena_sessions_created_total").increment(1);
                info!(
                    "Agent {} waiting in room {} (session {})",
                    session.agent_id, session.room_id, session.id
                );
                Ok(self.join_response(&session))
            }
            Err(waiter) => self.open_table(room, waiter, session, true, now).await,
        }
    }

    async fn select_room(&self, request: &JoinRequest) -> ArenaResult<Room> {
        let balance = self.store.balance(&request.agent_id).await?;
        match request.join_mode {
            JoinMode::Select => {
                let room_id = request
                    .room_id
                    .as_deref()
                    .ok_or_else(|| ArenaError::RoomNotFound(String::new()))?;
                let room = self
                    .store
                    .find_room(room_id)
                    .await?
                    .filter(|room| room.active)
                    .ok_or_else(|| ArenaError::RoomNotFound(room_id.to_string()))?;
                if !room.affordable(balance) {
                    return Err(ArenaError::InsufficientBuyin);
                }
                Ok(room)
            }
            JoinMode::Random => {
                let rooms: Vec<Room> = self
                    .store
                    .list_rooms()
                    .await?
                    .into_iter()
                    .filter(|room| room.affordable(balance))
                    .collect();
                rooms
                    .choose(&mut rand::rng())
                    .cloned()
                    .ok_or(ArenaError::NoAvailableRoom)
            }
        }
    }

    /// Pop the oldest live waiter for `room_id` and mark it as matching.
    fn claim_waiter(state: &mut CoordinatorState, room_id: &str) -> Option<Waiter> {
        let queue = state.waiting.get_mut(room_id)?;
        while let Some(id) = queue.pop_front() {
            let session = state.sessions.get(&id).filter(|s| s.is_open());
            let events = state.buffers.get(&id);
            if let (Some(session), Some(events)) = (session, events) {
                let waiter = Waiter {
                    session: session.clone(),
                    events: events.clone(),
                };
                state.matching.insert(id, None);
                return Some(waiter);
            }
        }
        None
    }

    /// Seat `waiter` and `joiner` at a new table and deal the first hand.
    /// If the table cannot be persisted the waiter goes back to the front
    /// of its queue and only the joiner sees the error.
    async fn open_table(
        &self,
        room: Room,
        waiter: Waiter,
        joiner: Session,
        joiner_persisted: bool,
        now: DateTime<Utc>,
    ) -> ArenaResult<JoinResponse> {
        let table_id = Uuid::new_v4();
        let mut seated = [waiter.session.clone(), joiner.clone()];
        for (seat, session) in seated.iter_mut().enumerate() {
            session.table_id = Some(table_id);
            session.seat = Some(seat);
            session.status = SessionStatus::Active;
        }
        let record = TableRecord {
            id: table_id,
            room_id: room.id.clone(),
            status: TableStatus::Active,
            small_blind: room.small_blind,
            big_blind: room.big_blind,
            created_at: now,
            closed_reason: None,
        };

        if let Err(e) = self.store.create_table_with_sessions(&record, &seated).await {
            error!(
                "Failed to open table in room {} for {} and {}: {e}",
                room.id, waiter.session.agent_id, joiner.agent_id
            );
            let waiter_close = {
                let mut state = self.lock();
                match state.matching.remove(&waiter.session.id).flatten() {
                    Some(reason) => {
                        Self::forget_session(&mut state, waiter.session.id);
                        Some(reason)
                    }
                    None => {
                        if state.sessions.contains_key(&waiter.session.id) {
                            state
                                .waiting
                                .entry(room.id.clone())
                                .or_default()
                                .push_front(waiter.session.id);
                        }
                        None
                    }
                }
            };
            if let Some(reason) = waiter_close {
                waiter.events.close();
                match self.store.close_session(waiter.session.id, &reason, now).await {
                    Ok(()) => info!("Session {} closed: {reason}", waiter.session.id),
                    Err(close_err) => warn!(
                        "Failed to close session {} after match failure: {close_err}",
                        waiter.session.id
                    ),
                }
            }
            if joiner_persisted
                && let Err(close_err) = self.store.close_session(joiner.id, "match_failed", now).await
            {
                warn!("Failed to close session {} after match failure: {close_err}", joiner.id);
            }
            metrics::counter!("arena_match_failures_total").increment(1);
            return Err(Self::session_conflict(e));
        }

        let joiner_events = self.new_buffer(joiner.id.to_string());
        let public = self.new_buffer(table_id.to_string());
        let replay = match ReplayLog::open(self.store.clone(), table_id, self.config.snapshot_interval).await {
            Ok(replay) => replay,
            Err(e) => {
                warn!("Table {table_id}: could not read replay sequence, starting at 0: {e}");
                ReplayLog::new(self.store.clone(), table_id, 0, self.config.snapshot_interval)
            }
        };
        let buffers = [waiter.events.clone(), joiner_events];
        let seats = [0, 1].map(|seat| SeatSlot {
            session_id: seated[seat].id,
            agent_id: seated[seat].agent_id.clone(),
            events: buffers[seat].clone(),
        });
        let runtime = Arc::new(TableRuntime::new(
            table_id,
            room.clone(),
            seats,
            public,
            self.store.clone(),
            self.config.clone(),
            replay,
        ));

        let waiter_close = {
            let mut state = self.lock();
            let waiter_close = state.matching.remove(&waiter.session.id).flatten();
            for (session, events) in seated.iter().zip(buffers.iter()) {
                state.sessions.insert(session.id, session.clone());
                state
                    .agent_sessions
                    .insert(session.agent_id.clone(), session.id);
                state.buffers.insert(session.id, events.clone());
                state.session_tables.insert(session.id, table_id);
            }
            state.tables.insert(table_id, runtime.clone());
            waiter_close
        };

        for seat in 0..NUM_SEATS {
            let opponent = &seated[(seat + 1) % NUM_SEATS];
            buffers[seat].publish(
                EventName::SessionJoined,
                json!({
                    "session_id": seated[seat].id,
                    "room_id": room.id,
                    "table_id": table_id,
                    "seat": seat,
                    "status": SessionStatus::Active,
                    "opponent": opponent.agent_id,
                }),
            );
        }
        metrics::counter!("arena_sessions_created_total").increment(1);
        metrics::counter!("arena_tables_opened_total").increment(1);
        info!(
            "Table {table_id} opened in room {}: {} vs {}",
            room.id, seated[0].agent_id, seated[1].agent_id
        );

        runtime.start(now).await;
        if let Some(reason) = waiter_close {
            info!(
                "Session {} closed while being seated: {reason}",
                waiter.session.id
            );
            if let Err(e) = runtime.begin_grace(0, &reason, now).await {
                debug!("Table {table_id}: deferred close not applied: {e}");
            }
        }
        if runtime.is_closed() {
            self.drop_table(table_id);
        }
        Ok(self.join_response(&seated[1]))
    }

    fn session_conflict(err: StoreError) -> ArenaError {
        match err {
            StoreError::Conflict(_) => ArenaError::AgentAlreadyInSession,
            other => other.into(),
        }
    }

    pub async fn close_session(&self, session_id: SessionId, reason: &str) -> ArenaResult<CloseOutcome> {
        self.close_session_at(session_id, reason, Utc::now()).await
    }

    /// Close a session. A waiting session closes at once; a seated one
    /// starts its table's reconnect grace instead.
    pub async fn close_session_at(
        &self,
        session_id: SessionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ArenaResult<CloseOutcome> {
        let target = {
            let mut state = self.lock();
            if !state.sessions.contains_key(&session_id) {
                None
            } else if let Some(pending) = state.matching.get_mut(&session_id) {
                pending.get_or_insert_with(|| reason.to_string());
                Some(CloseTarget::Matching)
            } else {
                let runtime = state
                    .session_tables
                    .get(&session_id)
                    .and_then(|table_id| state.tables.get(table_id))
                    .cloned();
                Some(match runtime {
                    Some(runtime) => CloseTarget::Seated(runtime),
                    None => CloseTarget::Waiting(Self::forget_session(&mut state, session_id)),
                })
            }
        };

        match target {
            Some(CloseTarget::Matching) => {
                debug!("Session {session_id} is being seated; close deferred");
                Ok(CloseOutcome::Deferred)
            }
            None => {
                let stored = self.store.find_session(session_id).await?;
                match stored {
                    Some(session) if session.is_open() => {
                        self.store.close_session(session_id, reason, now).await?;
                        Ok(CloseOutcome::Closed)
                    }
                    _ => Err(ArenaError::SessionNotFound),
                }
            }
            Some(CloseTarget::Waiting(buffer)) => {
                if let Some(buffer) = buffer {
                    buffer.close();
                }
                self.store.close_session(session_id, reason, now).await?;
                info!("Session {session_id} closed: {reason}");
                Ok(CloseOutcome::Closed)
            }
            Some(CloseTarget::Seated(runtime)) => {
                let seat = runtime
                    .seat_of_session(session_id)
                    .ok_or(ArenaError::SessionNotFound)?;
                match runtime.begin_grace(seat, reason, now).await {
                    Ok(GraceOutcome::Started { deadline }) => Ok(CloseOutcome::GraceStarted { deadline }),
                    Ok(GraceOutcome::AlreadyClosing) => Ok(CloseOutcome::AlreadyClosing),
                    Err(ArenaError::TableClosed) => {
                        self.drop_table(runtime.id());
                        Ok(CloseOutcome::Closed)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    /// Remove a session from every map. Returns its event buffer.
    fn forget_session(
        state: &mut CoordinatorState,
        session_id: SessionId,
    ) -> Option<Arc<EventBuffer>> {
        if let Some(session) = state.sessions.remove(&session_id) {
            if state.agent_sessions.get(&session.agent_id) == Some(&session_id) {
                state.agent_sessions.remove(&session.agent_id);
            }
            if let Some(queue) = state.waiting.get_mut(&session.room_id) {
                queue.retain(|id| *id != session_id);
            }
        }
        state.session_tables.remove(&session_id);
        state.buffers.remove(&session_id)
    }

    /// Forget a closed table and both of its sessions.
    fn drop_table(&self, table_id: TableId) {
        let mut state = self.lock();
        let Some(runtime) = state.tables.remove(&table_id) else {
            return;
        };
        for seat in 0..NUM_SEATS {
            if let Some(slot) = runtime.seat(seat) {
                Self::forget_session(&mut state, slot.session_id);
            }
        }
        debug!("Table {table_id} removed from live tables");
    }

    pub async fn submit_action(&self, request: ActionRequest) -> ArenaResult<ActionResponse> {
        self.submit_action_at(request, Utc::now()).await
    }

    /// Route an action to the session's table.
    ///
    /// A retried `(session_id, request_id)` returns the recorded response
    /// and never reaches the engine twice.
    pub async fn submit_action_at(
        &self,
        mut request: ActionRequest,
        now: DateTime<Utc>,
    ) -> ArenaResult<ActionResponse> {
        let trimmed = request.request_id.trim();
        if trimmed.len() != request.request_id.len() {
            request.request_id = trimmed.to_string();
        }
        let request_id = request.request_id.as_str();
        if request_id.is_empty() || request_id.chars().count() > self.config.max_request_id_len {
            return Err(ArenaError::InvalidRequestId {
                max: self.config.max_request_id_len,
            });
        }
        if request.action.trim().is_empty() {
            return Err(ArenaError::InvalidAction("action is required".to_string()));
        }

        if let Some(prior) = self
            .store
            .find_action_result(request.session_id, &request.request_id)
            .await?
        {
            debug!(
                "Replaying recorded result for {}/{}",
                request.session_id, request.request_id
            );
            return Ok(prior);
        }

        let runtime = {
            let state = self.lock();
            state
                .session_tables
                .get(&request.session_id)
                .and_then(|table_id| state.tables.get(table_id))
                .cloned()
        }
        .ok_or(ArenaError::SessionNotFound)?;
        let seat = runtime
            .seat_of_session(request.session_id)
            .ok_or(ArenaError::SessionNotFound)?;

        let result = runtime.submit_action(seat, &request, now).await;
        if runtime.is_closed() {
            self.drop_table(runtime.id());
        }
        result
    }

    /// Check every live table's deadlines against `now`. Returns the
    /// number of tables that changed state.
    pub async fn sweep_tables(&self, now: DateTime<Utc>) -> usize {
        let runtimes: Vec<Arc<TableRuntime>> = self.lock().tables.values().cloned().collect();
        let mut changed = 0;
        for runtime in runtimes {
            match runtime.sweep(now).await {
                SweepOutcome::Idle => {}
                SweepOutcome::GraceStarted(seat) => {
                    debug!("Table {}: seat {seat} timed out", runtime.id());
                    changed += 1;
                }
                SweepOutcome::Forfeited(seat) => {
                    debug!("Table {}: seat {seat} forfeited", runtime.id());
                    changed += 1;
                }
            }
            if runtime.is_closed() {
                self.drop_table(runtime.id());
            }
        }
        changed
    }

    /// Close every session past its absolute expiry. Returns the number of
    /// sessions acted on.
    pub async fn sweep_sessions(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<SessionId> = self
            .lock()
            .sessions
            .values()
            .filter(|session| session.is_expired(now))
            .map(|session| session.id)
            .collect();

        let mut closed = 0;
        for session_id in expired {
            match self.close_session_at(session_id, "session_expired", now).await {
                Ok(CloseOutcome::AlreadyClosing) | Err(ArenaError::SessionNotFound) => {}
                Ok(_) => closed += 1,
                Err(e) => warn!("Failed to expire session {session_id}: {e}"),
            }
        }
        if closed > 0 {
            info!("Expired {closed} sessions");
        }
        closed
    }

    /// Backlog after `last_event_id` plus live events for a session.
    pub fn subscribe(
        &self,
        session_id: SessionId,
        last_event_id: Option<&str>,
    ) -> ArenaResult<Subscription> {
        let buffer = self
            .lock()
            .buffers
            .get(&session_id)
            .cloned()
            .ok_or(ArenaError::SessionNotFound)?;
        Ok(buffer.subscribe(last_event_id))
    }

    /// Spectator stream for a live table. Carries no hole cards.
    pub fn subscribe_public(
        &self,
        table_id: TableId,
        last_event_id: Option<&str>,
    ) -> ArenaResult<Subscription> {
        let runtime = self.table(table_id).ok_or(ArenaError::TableClosed)?;
        Ok(runtime.public_events().subscribe(last_event_id))
    }

    pub fn table(&self, table_id: TableId) -> Option<Arc<TableRuntime>> {
        self.lock().tables.get(&table_id).cloned()
    }

    pub fn table_for_session(&self, session_id: SessionId) -> Option<Arc<TableRuntime>> {
        let state = self.lock();
        state
            .session_tables
            .get(&session_id)
            .and_then(|table_id| state.tables.get(table_id))
            .cloned()
    }

    pub fn live_tables(&self) -> usize {
        self.lock().tables.len()
    }

    pub fn waiting_in(&self, room_id: &str) -> usize {
        self.lock().waiting.get(room_id).map_or(0, VecDeque::len)
    }

    /// Current session record, from memory or the store.
    pub async fn session(&self, session_id: SessionId) -> ArenaResult<Session> {
        let cached = self.lock().sessions.get(&session_id).cloned();
        match cached {
            Some(session) => Ok(session),
            None => self
                .store
                .find_session(session_id)
                .await?
                .ok_or(ArenaError::SessionNotFound),
        }
    }

    /// Seat-scoped view for a seated session, including its hole cards.
    pub async fn seat_state(&self, session_id: SessionId) -> ArenaResult<SeatSnapshot> {
        let runtime = self
            .table_for_session(session_id)
            .ok_or(ArenaError::SessionNotFound)?;
        let seat = runtime
            .seat_of_session(session_id)
            .ok_or(ArenaError::SessionNotFound)?;
        Ok(runtime.seat_state(seat).await)
    }

    pub async fn public_state(&self, table_id: TableId) -> ArenaResult<PublicSnapshot> {
        let runtime = self.table(table_id).ok_or(ArenaError::TableClosed)?;
        Ok(runtime.public_state().await)
    }

    /// Table state as of replay sequence `seq`.
    pub async fn replay_state_at(&self, table_id: TableId, seq: i64) -> ArenaResult<ReconstructedState> {
        Ok(reconstruct(self.store.as_ref(), table_id, seq).await?)
    }

    /// Up to `limit` replay events starting at `from_seq`.
    pub async fn replay_events(
        &self,
        table_id: TableId,
        from_seq: i64,
        limit: i64,
    ) -> ArenaResult<Vec<ReplayEvent>> {
        let from_seq = from_seq.max(1);
        let limit = limit.clamp(1, MAX_REPLAY_PAGE);
        Ok(self
            .store
            .replay_events(table_id, from_seq, from_seq + limit - 1)
            .await?)
    }

    /// Persisted table record.
    pub async fn table_record(&self, table_id: TableId) -> ArenaResult<TableRecord> {
        self.store
            .find_table(table_id)
            .await?
            .ok_or(ArenaError::TableClosed)
    }

    /// End every live stream. Durable state is left as is.
    pub fn shutdown(&self) {
        let (buffers, tables): (Vec<_>, Vec<_>) = {
            let state = self.lock();
            (
                state.buffers.values().cloned().collect(),
                state.tables.values().cloned().collect(),
            )
        };
        for buffer in &buffers {
            buffer.close();
        }
        for table in &tables {
            table.close_streams();
        }
        info!(
            "Coordinator shut down: closed {} session streams and {} tables",
            buffers.len(),
            tables.len()
        );
    }
}
