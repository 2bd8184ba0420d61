//! Daily risk accounting.
//!
//! The [`RiskLedger`] is the single gate every capital-committing action
//! passes through. Reserve, confirm, commit, and release all execute as
//! one critical section whose durable log write happens before the change
//! is considered effective, so the day's state survives a restart.

pub mod ledger;
pub mod wal;

pub use ledger::{CommitOutcome, ReserveOutcome, RiskLedger, RiskState};
pub use wal::{ReplayedDay, RiskWal, WalError, WalRecord};
