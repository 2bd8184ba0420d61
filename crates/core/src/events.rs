use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{DenyReason, ExitReason, PositionId, StrategyKind};

/// Events emitted for the notification channel.
///
/// Every risk denial, order outcome, and forced-close action produces one
/// of these, sufficient to reconstruct the day's decisions from the
/// notification stream alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A qualifying signal was produced.
    SignalGenerated {
        symbol: String,
        strategy: StrategyKind,
        composite_score: f64,
        reasons: Vec<String>,
    },

    /// The tick produced no signal because the feed was partial or stale.
    DataIncomplete { field: String },

    /// The best candidate scored below the entry threshold.
    BelowThreshold { best_score: f64, threshold: f64 },

    /// The risk ledger denied the reservation. A decision, not an error.
    RiskDenied {
        strategy: StrategyKind,
        reason: DenyReason,
    },

    /// Entry order confirmed filled and the position registered.
    OrderPlaced {
        position_id: PositionId,
        symbol: String,
        strategy: StrategyKind,
        quantity: Decimal,
        entry_price: Decimal,
        stop_loss_price: Decimal,
        target_price: Decimal,
    },

    /// Entry order could not be placed; the reservation was released.
    OrderFailed {
        strategy: StrategyKind,
        attempts: u32,
        reason: String,
    },

    /// A position was exited.
    ExitTriggered {
        position_id: PositionId,
        reason: ExitReason,
        exit_price: Decimal,
        realized_pnl: Decimal,
    },

    /// A closing order failed. Fatal: the position remains open under a
    /// hard deadline and needs operator attention.
    ExitFailed {
        position_id: PositionId,
        reason: String,
    },

    /// Daily loss limit crossed; no new entries for the rest of the day.
    CircuitBreakerTripped {
        realized_loss: Decimal,
        limit: Decimal,
    },

    /// End-of-day forced close completed.
    SquareOffCompleted { closed: usize },

    /// Periodic per-position status, independent of whether an exit fired.
    PositionStatus {
        position_id: PositionId,
        current_price: Decimal,
        unrealized_pnl: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// High-severity condition requiring operator attention.
    Alert { message: String },
}

impl EngineEvent {
    /// True for events that require operator attention.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExitFailed { .. } | Self::Alert { .. })
    }
}
