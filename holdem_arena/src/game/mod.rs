//! Heads-up Texas Hold'em rules engine.
//!
//! This module provides:
//! - Card, deck and per-hand table state entities
//! - Pure hand evaluation and pot splitting (`functional`)
//! - The `RulesEngine` that validates betting actions, advances streets and
//!   settles hands, moving chips through a `Ledger`

pub mod engine;
pub mod entities;
pub mod errors;
pub mod functional;

pub use engine::{RulesEngine, SPLIT, Settlement};
pub use entities::{Action, ActionKind, Card, Chips, Deck, HandValue, Rank, SeatIndex, Street, TableState};
pub use errors::{EngineError, EngineResult};
