//! Shared domain types for the trading engine.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque position identifier.
pub type PositionId = Uuid;

/// The options strategies the engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    IronCondor,
    ShortStrangle,
    CalendarSpread,
    AtmDirectional,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IronCondor => write!(f, "iron_condor"),
            Self::ShortStrangle => write!(f, "short_strangle"),
            Self::CalendarSpread => write!(f, "calendar_spread"),
            Self::AtmDirectional => write!(f, "atm_directional"),
        }
    }
}

/// Side of a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegSide {
    Buy,
    Sell,
}

/// One instrument within a multi-leg options strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLeg {
    /// Exchange trading symbol, e.g. `NIFTY25SEP24500CE`.
    pub instrument: String,
    pub side: LegSide,
    pub strike: Decimal,
    pub expiry: NaiveDate,
}

/// Precomputed greeks delivered by the market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub theta: f64,
    pub gamma: f64,
}

/// A market snapshot as delivered by the external data provider.
///
/// Optional fields may be absent when the feed is partial; scoring must
/// treat missing required fields as incomplete data rather than score on
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub spot: Decimal,
    pub volume: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Recent closes, oldest first.
    pub price_history: Vec<f64>,
    pub greeks: Option<Greeks>,
    pub iv: Option<f64>,
    pub iv_percentile: Option<f64>,
    pub vix: Option<f64>,
    pub pcr: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Age of the snapshot relative to `now`, in whole seconds.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_seconds()
    }
}

/// A single instrument quote used by the position monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Reason the risk ledger denied a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    CircuitBreakerTripped,
    TradeLimitReached,
    PositionLimitReached,
    DailyLossLimitReached,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CircuitBreakerTripped => write!(f, "circuit_breaker_tripped"),
            Self::TradeLimitReached => write!(f, "trade_limit_reached"),
            Self::PositionLimitReached => write!(f, "position_limit_reached"),
            Self::DailyLossLimitReached => write!(f, "daily_loss_limit_reached"),
        }
    }
}

/// Reason a position exit was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLossHit,
    TargetHit,
    ForcedSquareOff,
    ManualOverride,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopLossHit => write!(f, "stop_loss"),
            Self::TargetHit => write!(f, "target"),
            Self::ForcedSquareOff => write!(f, "forced_square_off"),
            Self::ManualOverride => write!(f, "manual"),
        }
    }
}

/// Whether an order opens or closes exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderIntent {
    Entry,
    Exit,
}

/// Broker-reported state of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderStatus {
    Filled { fill_price: Decimal },
    Rejected { reason: String },
    Pending,
}

/// A required snapshot field was missing or stale.
///
/// This is a decision outcome, not a fault: the tick is skipped and the
/// diagnostic surfaced through the notification channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteData {
    pub field: &'static str,
}

impl std::fmt::Display for IncompleteData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "incomplete market data: missing or stale `{}`", self.field)
    }
}
