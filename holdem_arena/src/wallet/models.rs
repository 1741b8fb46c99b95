//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Agent chip account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub agent_id: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Audit row written alongside every balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub agent_id: String,
    pub amount: i64,
    pub balance_after: i64,
    pub direction: EntryDirection,
    pub entry_type: EntryType,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

impl FromStr for EntryDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            other => Err(format!("unknown entry direction: {other}")),
        }
    }
}

/// Why chips moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Initial or administrative top-up
    Funding,
    /// Small or big blind
    Blind,
    /// Chips committed by call, bet, raise or all-in
    Bet,
    /// Pot winnings
    Payout,
    /// Return of chips after a failed operation
    Refund,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::Funding => write!(f, "funding"),
            EntryType::Blind => write!(f, "blind"),
            EntryType::Bet => write!(f, "bet"),
            EntryType::Payout => write!(f, "payout"),
            EntryType::Refund => write!(f, "refund"),
        }
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "funding" => Ok(Self::Funding),
            "blind" => Ok(Self::Blind),
            "bet" => Ok(Self::Bet),
            "payout" => Ok(Self::Payout),
            "refund" => Ok(Self::Refund),
            other => Err(format!("unknown entry type: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_type_text_roundtrip() {
        for ty in [
            EntryType::Funding,
            EntryType::Blind,
            EntryType::Bet,
            EntryType::Payout,
            EntryType::Refund,
        ] {
            assert_eq!(ty.to_string().parse::<EntryType>().unwrap(), ty);
        }
        assert!("rake".parse::<EntryType>().is_err());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(EntryDirection::Debit.to_string(), "debit");
        assert_eq!("credit".parse::<EntryDirection>().unwrap(), EntryDirection::Credit);
    }
}
