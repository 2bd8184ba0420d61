//! Capped fractional-Kelly position sizing.
//!
//! The raw size is whatever quantity puts the configured fraction of
//! capital at risk between entry and stop. A fractional-Kelly multiplier
//! shrinks that, and a hard lot cap bounds it regardless of how benign
//! the inputs look. Sizing is never unbounded.

use nifty_algo_core::{EngineConfig, RiskConstraints};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// A sized order, in whole lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizedOrder {
    pub lots: u32,
    /// Total units (lots x lot size).
    pub quantity: Decimal,
    /// Worst-case loss at the stop, used as the reservation cost.
    pub estimated_risk: Decimal,
}

/// Sizes a trade given the per-unit loss at the stop.
///
/// Returns `None` when `points_at_risk` is not positive or the sized
/// quantity rounds below one lot; callers must treat that as "do not
/// trade", never as "trade one lot anyway".
#[must_use]
pub fn size_position(
    engine: &EngineConfig,
    risk: &RiskConstraints,
    points_at_risk: Decimal,
) -> Option<SizedOrder> {
    if points_at_risk <= Decimal::ZERO || engine.lot_size == 0 {
        return None;
    }

    let risk_capital = engine.capital * risk.max_risk_per_trade;
    let raw_units = risk_capital / points_at_risk * risk.kelly_fraction;
    let lot_size = Decimal::from(engine.lot_size);
    let lots = (raw_units / lot_size).floor().to_u32()?.min(risk.max_lots);
    if lots == 0 {
        return None;
    }

    let quantity = Decimal::from(lots) * lot_size;
    Some(SizedOrder {
        lots,
        quantity,
        estimated_risk: quantity * points_at_risk,
    })
}
