//! Durable table records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::game::entities::{Chips, Street};
use crate::session::models::TableId;

/// Table lifecycle: `active` ⇄ `closing` → `closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Active,
    Closing,
    Closed,
}

impl TableStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TableStatus::Active => "active",
            TableStatus::Closing => "closing",
            TableStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "closing" => Ok(Self::Closing),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown table status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRecord {
    pub id: TableId,
    pub room_id: String,
    pub status: TableStatus,
    pub small_blind: Chips,
    pub big_blind: Chips,
    pub created_at: DateTime<Utc>,
    pub closed_reason: Option<String>,
}

/// Summary written when a hand is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandSummary {
    pub table_id: TableId,
    pub hand_no: u64,
    /// Winning agent id or `"split"`.
    pub winner: String,
    pub pot: Chips,
    pub ending_street: Street,
    pub ended_at: DateTime<Utc>,
}
