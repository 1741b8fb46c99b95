//! Chip ledger: the `Ledger` trait the rules engine moves chips through, plus
//! a PostgreSQL implementation with an audit trail.
//!
//! Every balance change is a guarded `UPDATE` in the same transaction as an
//! insert into `ledger_entries`, so the audit trail always agrees with the
//! balance column.

pub mod errors;
pub mod ledger;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use ledger::Ledger;
pub use manager::WalletManager;
pub use models::{Account, EntryDirection, EntryType, LedgerEntry};
