//! Position lifecycle and the in-memory position book.
//!
//! The [`PositionStore`] is the single writer for every position record;
//! the coordinator and the monitor mutate positions only through its
//! interface, and every mutation is snapshotted to disk before it is
//! considered effective.

pub mod position;
pub mod store;

pub use position::{FilledLeg, Position, PositionStatus};
pub use store::{PositionStore, StoreError};
