//! Durable, replayable table history.
//!
//! Every mutation at a table is appended to the [`ReplayLog`] with a
//! gap-free global sequence; full-state snapshots are written every
//! [`DEFAULT_SNAPSHOT_INTERVAL`] events so [`reconstruct`] only replays a
//! short tail.

pub mod log;
pub mod models;

pub use log::{DEFAULT_SNAPSHOT_INTERVAL, ReplayLog, reconstruct};
pub use models::{ReconstructedState, ReplayEvent, ReplaySnapshot, ReplayState, SeatState};
