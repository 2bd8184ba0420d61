//! Order execution path.
//!
//! [`ExecutionCoordinator`] is the only route from a scored signal to a
//! live position: it sizes the trade, reserves a risk slot, works the
//! order against the broker with bounded retries, and registers the fill
//! in the position store. Exits flow back through the same coordinator so
//! realized P&L always reaches the risk ledger exactly once.

pub mod coordinator;
pub mod paper;
pub mod sizing;

pub use coordinator::{ExecutionCoordinator, ExitOutcome, SubmitOutcome};
pub use paper::{PaperBroker, PaperMarket, PaperResponse};
pub use sizing::{size_position, SizedOrder};
