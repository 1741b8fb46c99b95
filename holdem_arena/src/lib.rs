//! # Hold'em Arena
//!
//! A heads-up No-Limit Texas Hold'em arena where autonomous agents are
//! matched in pairs, play hands under a strict turn protocol and settle
//! chips against a double-entry ledger. Every state transition is recorded
//! in an append-only replay log that can reconstruct any table at any
//! sequence.
//!
//! ## Architecture
//!
//! - A [`session::SessionCoordinator`] authenticates agents, queues them per
//!   room and pairs the first waiter with the next joiner.
//! - Each pair gets a [`table::TableRuntime`]: a single lock around a
//!   [`game::RulesEngine`], turn ids, deadlines and the table's replay log.
//! - Blinds, raises and pot awards move chips through a [`wallet::Ledger`]
//!   that records one debit and one credit per transfer.
//! - Events fan out to per-seat and spectator [`stream::EventBuffer`]s that
//!   support resume from a last-seen event id.
//! - Durable state lives behind [`db::ArenaStore`], backed by PostgreSQL or
//!   by an in-memory store for tests.
//!
//! ## Core Modules
//!
//! - [`game`]: cards, hand evaluation, pot splitting and the rules engine
//! - [`session`]: matchmaking, session lifecycle and deadline sweeps
//! - [`table`]: table runtime, snapshots and arena configuration
//! - [`replay`]: replay log writer and state reconstruction
//! - [`stream`]: event buffers and the push-stream loop
//! - [`wallet`]: ledger accounts and transfers
//! - [`auth`]: agent registration and API key checks
//! - [`db`]: storage traits and backends
//!
//! ## Example
//!
//! ```
//! use holdem_arena::game::functional::evaluate;
//! use holdem_arena::game::entities::{Card, Rank, Suit};
//!
//! let cards = [
//!     Card(14, Suit::Spade),
//!     Card(13, Suit::Spade),
//!     Card(12, Suit::Spade),
//!     Card(11, Suit::Spade),
//!     Card(10, Suit::Spade),
//! ];
//! assert_eq!(evaluate(&cards).rank, Rank::StraightFlush);
//! ```

/// Agent registration and API key authentication.
pub mod auth;

/// Storage traits plus PostgreSQL and in-memory backends.
pub mod db;

/// Cards, hand evaluation and the heads-up rules engine.
pub mod game;
pub use game::{
    Action, ActionKind, EngineError, RulesEngine, Settlement,
    entities::{self, Card, Chips, SeatIndex, Street, TableState},
    functional,
};

/// Replay log and state reconstruction.
pub mod replay;

/// Matchmaking and session lifecycle.
pub mod session;
pub use session::{ArenaError, ArenaResult, SessionCoordinator, spawn_sweeps};

/// Event buffers and push streams.
pub mod stream;

/// Live tables.
pub mod table;
pub use table::{ArenaConfig, TableRuntime};

/// Double-entry chip ledger.
pub mod wallet;
