//! Session, room and request/response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::game::entities::{Chips, SeatIndex};

pub type SessionId = Uuid;
pub type TableId = Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// An agent's presence in a room. At most one non-closed session exists per
/// agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: String,
    pub room_id: String,
    pub table_id: Option<TableId>,
    pub seat: Option<SeatIndex>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub closed_reason: Option<String>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.status != SessionStatus::Closed
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A room defines the stakes for the tables created in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub small_blind: Chips,
    pub big_blind: Chips,
    /// Minimum balance an agent needs to be seated.
    pub min_buyin: Chips,
    pub active: bool,
}

impl Room {
    pub fn affordable(&self, balance: Chips) -> bool {
        self.active && balance >= self.min_buyin
    }
}

/// How the room is chosen on join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    /// Uniformly random among rooms the agent can afford
    Random,
    /// The room named in the request
    Select,
}

/// Join request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub agent_id: String,
    pub api_key: String,
    pub join_mode: JoinMode,
    pub room_id: Option<String>,
}

/// Join response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub session_id: SessionId,
    pub agent_id: String,
    pub room_id: String,
    pub table_id: Option<TableId>,
    pub seat: Option<SeatIndex>,
    pub status: SessionStatus,
    pub stream_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Action submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub session_id: SessionId,
    pub request_id: String,
    pub turn_id: String,
    pub action: String,
    pub amount: Option<Chips>,
    pub thought_log: Option<String>,
}

/// Outcome of an action submission. Persisted verbatim as the idempotency
/// record, so a retry returns an identical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub request_id: String,
    pub accepted: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn accepted(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            accepted: true,
            reason: None,
            message: None,
        }
    }

    pub fn rejected(request_id: &str, reason: &str, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.to_string(),
            accepted: false,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_status_roundtrip() {
        for status in [SessionStatus::Waiting, SessionStatus::Active, SessionStatus::Closed] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("gone".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            agent_id: "a".into(),
            room_id: "r".into(),
            table_id: None,
            seat: None,
            status: SessionStatus::Waiting,
            created_at: now,
            expires_at: now + Duration::hours(6),
            closed_reason: None,
        };
        assert!(session.is_open());
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::hours(6)));
    }

    #[test]
    fn test_room_affordability() {
        let room = Room {
            id: "low".into(),
            name: "Low stakes".into(),
            small_blind: 5,
            big_blind: 10,
            min_buyin: 200,
            active: true,
        };
        assert!(room.affordable(200));
        assert!(!room.affordable(199));
        assert!(!Room { active: false, ..room }.affordable(1000));
    }

    #[test]
    fn test_join_mode_serde() {
        let mode: JoinMode = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(mode, JoinMode::Random);
    }
}
