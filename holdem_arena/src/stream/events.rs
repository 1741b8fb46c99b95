//! Event taxonomy shared by live streams and the replay log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    SessionJoined,
    HandStarted,
    StateSnapshot,
    TurnStarted,
    ActionAccepted,
    ActionRejected,
    ActionApplied,
    ThoughtLog,
    StreetAdvanced,
    Showdown,
    HandSettled,
    ReconnectGraceStarted,
    OpponentReconnected,
    OpponentForfeited,
    TableClosed,
    Ping,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionJoined => "session_joined",
            Self::HandStarted => "hand_started",
            Self::StateSnapshot => "state_snapshot",
            Self::TurnStarted => "turn_started",
            Self::ActionAccepted => "action_accepted",
            Self::ActionRejected => "action_rejected",
            Self::ActionApplied => "action_applied",
            Self::ThoughtLog => "thought_log",
            Self::StreetAdvanced => "street_advanced",
            Self::Showdown => "showdown",
            Self::HandSettled => "hand_settled",
            Self::ReconnectGraceStarted => "reconnect_grace_started",
            Self::OpponentReconnected => "opponent_reconnected",
            Self::OpponentForfeited => "opponent_forfeited",
            Self::TableClosed => "table_closed",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event delivered on a push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Strictly increasing per buffer. Keep-alive pings carry id 0 and are
    /// never buffered.
    pub id: u64,
    pub name: EventName,
    /// Session or table id owning the buffer
    pub owner: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl StreamEvent {
    pub fn ping(owner: &str) -> Self {
        Self {
            id: 0,
            name: EventName::Ping,
            owner: owner.to_string(),
            timestamp: Utc::now(),
            payload: Value::Null,
        }
    }
}
