//! Session lifecycle and matchmaking.
//!
//! [`SessionCoordinator`] owns the live tables and the per-room waiting
//! queues. It authenticates agents, pairs them into tables, routes actions
//! and runs the deadline sweeps that drive reconnect grace and forfeits.

pub mod coordinator;
pub mod errors;
pub mod models;
pub mod sweeps;

pub use coordinator::{CloseOutcome, MAX_REPLAY_PAGE, SessionCoordinator};
pub use errors::{ArenaError, ArenaResult};
pub use models::{
    ActionRequest, ActionResponse, JoinMode, JoinRequest, JoinResponse, Room, Session, SessionId,
    SessionStatus, TableId,
};
pub use sweeps::spawn_sweeps;
