//! The position record and its lifecycle state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use nifty_algo_core::types::{ExitReason, OptionLeg, PositionId, StrategyKind};

/// One leg with its confirmed fill price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledLeg {
    #[serde(flatten)]
    pub leg: OptionLeg,
    pub fill_price: Decimal,
}

/// Lifecycle state. Valid transitions:
/// Pending -> Open | Failed, Open -> Closing, Closing -> Closed | Open.
/// Closed and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Pending,
    Open,
    Closing,
    Closed,
    Failed,
}

impl PositionStatus {
    /// Whether this status counts against the open-position limit.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Open | Self::Closing)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Open)
                | (Self::Pending, Self::Failed)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
                | (Self::Closing, Self::Open)
        )
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// An open or closed market exposure resulting from an accepted signal.
///
/// Prices are normalized to net-value terms: `entry_price` is the net
/// mark of all legs at entry, and stop/target are derived from it once
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: String,
    pub strategy: StrategyKind,
    pub legs: Vec<FilledLeg>,
    pub entry_time: DateTime<Utc>,
    /// Net entry value across legs.
    pub entry_price: Decimal,
    /// Total units (lots x lot size).
    pub quantity: Decimal,
    pub stop_loss_price: Decimal,
    pub target_price: Decimal,
    pub status: PositionStatus,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: Option<Decimal>,
}

impl Position {
    /// Builds an open position, deriving stop and target from the entry
    /// value and the configured percentages.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: PositionId,
        symbol: String,
        strategy: StrategyKind,
        legs: Vec<FilledLeg>,
        entry_price: Decimal,
        quantity: Decimal,
        stop_loss_pct: Decimal,
        target_pct: Decimal,
        entry_time: DateTime<Utc>,
    ) -> Self {
        let band = entry_price.abs();
        Self {
            id,
            symbol,
            strategy,
            legs,
            entry_time,
            entry_price,
            quantity,
            stop_loss_price: entry_price - band * stop_loss_pct,
            target_price: entry_price + band * target_pct,
            status: PositionStatus::Open,
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            realized_pnl: None,
        }
    }

    /// Unrealized P&L at the given net mark.
    #[must_use]
    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        (current_price - self.entry_price) * self.quantity
    }
}
