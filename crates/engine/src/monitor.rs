//! Per-position exit evaluation.
//!
//! Each monitoring tick re-marks every open position from live leg
//! quotes and drives exits through the coordinator. Stop-loss is checked
//! before target on every tick, and the forced square-off path bypasses
//! both. The monitor only ever reads stop and target prices; it never
//! mutates a position directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use nifty_algo_core::{EngineEvent, ExitReason, LegSide, MarketDataProvider, Notifier};
use nifty_algo_execution::{ExecutionCoordinator, ExitOutcome};
use nifty_algo_positions::{Position, PositionStore};
use rust_decimal::Decimal;
use tracing::{debug, error, warn};

pub struct PositionMonitor {
    store: Arc<PositionStore>,
    market: Arc<dyn MarketDataProvider>,
    coordinator: Arc<ExecutionCoordinator>,
    notifier: Arc<dyn Notifier>,
    max_quote_age_secs: u64,
}

impl PositionMonitor {
    pub fn new(
        store: Arc<PositionStore>,
        market: Arc<dyn MarketDataProvider>,
        coordinator: Arc<ExecutionCoordinator>,
        notifier: Arc<dyn Notifier>,
        max_quote_age_secs: u64,
    ) -> Self {
        Self {
            store,
            market,
            coordinator,
            notifier,
            max_quote_age_secs,
        }
    }

    /// Evaluates every open position once. Returns the number of exits
    /// triggered.
    pub async fn tick(&self, now: DateTime<Utc>) -> usize {
        let mut exits = 0;
        for position in self.store.open_positions() {
            let Some(value) = self.net_value(&position, now).await else {
                continue;
            };
            if value <= position.stop_loss_price {
                exits += usize::from(self.try_exit(&position, ExitReason::StopLossHit).await);
            } else if value >= position.target_price {
                exits += usize::from(self.try_exit(&position, ExitReason::TargetHit).await);
            } else {
                self.notifier
                    .notify(&EngineEvent::PositionStatus {
                        position_id: position.id,
                        current_price: value,
                        unrealized_pnl: position.unrealized_pnl(value),
                        timestamp: now,
                    })
                    .await;
            }
        }
        exits
    }

    /// Unconditionally exits every open position, regardless of P&L sign
    /// or distance to stop/target. Idempotent when nothing is open.
    pub async fn square_off(&self) -> usize {
        let mut closed = 0;
        for position in self.store.open_positions() {
            if self.try_exit(&position, ExitReason::ForcedSquareOff).await {
                closed += 1;
            }
        }
        self.notifier
            .notify(&EngineEvent::SquareOffCompleted { closed })
            .await;
        closed
    }

    async fn try_exit(&self, position: &Position, reason: ExitReason) -> bool {
        match self.coordinator.exit(position.id, reason).await {
            Ok(ExitOutcome::Closed { .. }) => true,
            Ok(outcome) => {
                debug!(position_id = %position.id, ?outcome, "exit already handled elsewhere");
                false
            }
            // The coordinator has already reverted the position and
            // escalated; nothing to mask here.
            Err(e) => {
                error!(position_id = %position.id, %reason, error = %e, "exit attempt failed");
                false
            }
        }
    }

    /// Net mark of the position from current leg quotes, or `None` when
    /// any quote is missing or stale (the position is skipped this tick).
    async fn net_value(&self, position: &Position, now: DateTime<Utc>) -> Option<Decimal> {
        let mut value = Decimal::ZERO;
        for filled in &position.legs {
            let quote = match self.market.leg_quote(&filled.leg.instrument).await {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(
                        position_id = %position.id,
                        instrument = %filled.leg.instrument,
                        error = %e,
                        "no quote, skipping position this tick"
                    );
                    return None;
                }
            };
            let age = (now - quote.timestamp).num_seconds();
            if age < 0 || age as u64 > self.max_quote_age_secs {
                warn!(
                    position_id = %position.id,
                    instrument = %filled.leg.instrument,
                    age_secs = age,
                    "stale quote, skipping position this tick"
                );
                return None;
            }
            value += match filled.leg.side {
                LegSide::Buy => quote.price,
                LegSide::Sell => -quote.price,
            };
        }
        Some(value)
    }
}
