//! Live tables.
//!
//! This module implements:
//! - TableRuntime: one heads-up table with its rules engine, seats, turn
//!   and reconnect deadlines, and replay log behind its own lock
//! - ArenaConfig: timing and capacity settings shared by every table
//! - Seat-scoped and public views pushed to streams
//!
//! ## Lifecycle
//!
//! A table is `active` while hands are dealt, `closing` during a reconnect
//! grace window, and `closed` once a seat forfeits or a hand cannot start.
//! `closing` returns to `active` only when the disconnected seat comes back
//! before its deadline. Deadlines are checked by polling
//! [`TableRuntime::sweep`] with the current time.

pub mod config;
pub mod messages;
pub mod models;
pub mod runtime;

pub use config::ArenaConfig;
pub use messages::{ActionLogEntry, PublicSnapshot, SeatSnapshot, SeatView, TurnInfo};
pub use models::{HandSummary, TableRecord, TableStatus};
pub use runtime::{GraceOutcome, SeatSlot, SweepOutcome, TableRuntime};
