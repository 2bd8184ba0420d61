//! Engine wiring: the scheduler-facing entry points, the position
//! monitor, the notification sink and startup reconciliation.

pub mod monitor;
pub mod notify;
pub mod providers;
pub mod reconcile;
pub mod service;

pub use monitor::PositionMonitor;
pub use notify::TracingNotifier;
pub use providers::FileSnapshotProvider;
pub use reconcile::reconcile_pending;
pub use service::TradingEngine;
