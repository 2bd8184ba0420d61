//! Risk-gated order submission and exit handling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nifty_algo_core::{
    BrokerGateway, DenyReason, EngineConfig, EngineError, EngineEvent, ExecutionConfig,
    ExitReason, LegSide, MarketDataProvider, Notifier, OptionLeg, OrderIntent, OrderRequest,
    OrderStatus, PositionId,
};
use nifty_algo_positions::{FilledLeg, Position, PositionStatus, PositionStore, StoreError};
use nifty_algo_risk::{ReserveOutcome, RiskLedger};
use nifty_algo_signals::Signal;
use rust_decimal::Decimal;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::sizing::size_position;

const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of routing a signal through the risk-and-execution path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Filled and registered.
    Placed(PositionId),
    /// The risk ledger said no. A decision, not a fault.
    Denied(DenyReason),
    /// Sizing rounded below one lot; nothing was reserved or placed.
    SizedToZero,
}

/// Result of an exit request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitOutcome {
    Closed {
        exit_price: Decimal,
        realized_pnl: Decimal,
    },
    /// The position was already closed; the prior outcome is returned
    /// and nothing is re-committed to the risk ledger.
    AlreadyClosed {
        exit_price: Decimal,
        realized_pnl: Decimal,
    },
    /// Another caller holds the closing claim on this position.
    InFlight,
}

enum ConfirmOutcome {
    Filled(Decimal),
    Rejected(String),
    TimedOut,
    Unreachable(String),
}

/// The single route from a scored signal to a live position, and from a
/// live position back out.
pub struct ExecutionCoordinator {
    engine_cfg: EngineConfig,
    exec_cfg: ExecutionConfig,
    risk: Arc<RiskLedger>,
    store: Arc<PositionStore>,
    broker: Arc<dyn BrokerGateway>,
    market: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    max_quote_age_secs: u64,
}

impl ExecutionCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine_cfg: EngineConfig,
        exec_cfg: ExecutionConfig,
        risk: Arc<RiskLedger>,
        store: Arc<PositionStore>,
        broker: Arc<dyn BrokerGateway>,
        market: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
        max_quote_age_secs: u64,
    ) -> Self {
        Self {
            engine_cfg,
            exec_cfg,
            risk,
            store,
            broker,
            market,
            notifier,
            max_quote_age_secs,
        }
    }

    /// Sizes the signal, reserves a risk slot, works the entry order and
    /// registers the fill.
    ///
    /// A reservation is never silently dropped: every failure path after
    /// `try_reserve` either confirms or releases it before returning.
    pub async fn submit(&self, signal: &Signal) -> Result<SubmitOutcome, EngineError> {
        let mut leg_prices = Vec::with_capacity(signal.proposed_legs.len());
        let mut est_entry = Decimal::ZERO;
        for leg in &signal.proposed_legs {
            let quote = self.market.leg_quote(&leg.instrument).await?;
            // A dead feed must not set the sizing or the stop/target
            // bands; the monitoring path holds entries to the same bound.
            let age = (Utc::now() - quote.timestamp).num_seconds();
            if age < 0 || age as u64 > self.max_quote_age_secs {
                warn!(instrument = %leg.instrument, age_secs = age, "stale quote, entry aborted");
                return Err(EngineError::StaleQuote {
                    instrument: leg.instrument.clone(),
                    age_secs: age,
                });
            }
            est_entry += match leg.side {
                LegSide::Buy => quote.price,
                LegSide::Sell => -quote.price,
            };
            leg_prices.push(quote.price);
        }

        let constraints = self.risk.constraints();
        let points_at_risk = est_entry.abs() * constraints.stop_loss_pct;
        let Some(sized) = size_position(&self.engine_cfg, constraints, points_at_risk) else {
            warn!(strategy = %signal.strategy, %est_entry, "signal sized below one lot, skipping");
            self.notifier
                .notify(&EngineEvent::OrderFailed {
                    strategy: signal.strategy,
                    attempts: 0,
                    reason: "sized below one lot".to_string(),
                })
                .await;
            return Ok(SubmitOutcome::SizedToZero);
        };

        let id = Uuid::new_v4();
        let reserve = self
            .risk
            .try_reserve(id, sized.estimated_risk)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        if let ReserveOutcome::Denied(reason) = reserve {
            info!(strategy = %signal.strategy, %reason, "risk ledger denied entry");
            self.notifier
                .notify(&EngineEvent::RiskDenied {
                    strategy: signal.strategy,
                    reason,
                })
                .await;
            return Ok(SubmitOutcome::Denied(reason));
        }

        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            legs: signal.proposed_legs.clone(),
            quantity: sized.quantity,
            intent: OrderIntent::Entry,
            tag: id.to_string(),
        };
        match self.work_order(&request).await {
            Ok(fill_price) => {
                self.register_fill(signal, id, sized.quantity, &leg_prices, fill_price)
                    .await?;
                Ok(SubmitOutcome::Placed(id))
            }
            Err(err @ EngineError::OrderConfirmationTimeout { .. }) => {
                // The broker may have filled what it never confirmed;
                // check before releasing real exposure.
                match self.broker.find_order(&request.tag).await {
                    Ok(Some(ticket)) => {
                        if let OrderStatus::Filled { fill_price } = ticket.status {
                            self.notifier
                                .notify(&EngineEvent::Alert {
                                    message: format!(
                                        "order {} filled after confirmation timeout; position {id} registered late",
                                        ticket.order_id
                                    ),
                                })
                                .await;
                            self.register_fill(signal, id, sized.quantity, &leg_prices, fill_price)
                                .await?;
                            return Ok(SubmitOutcome::Placed(id));
                        }
                        self.abandon_entry(signal, id, 1, &err).await;
                        Err(err)
                    }
                    _ => {
                        self.abandon_entry(signal, id, 1, &err).await;
                        Err(err)
                    }
                }
            }
            Err(err) => {
                self.abandon_entry(signal, id, self.exec_cfg.order_retries, &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Closes a position at market and commits its realized P&L.
    ///
    /// Idempotent for already-closed positions. On broker failure the
    /// position reverts to Open and the error escalates; it is never
    /// masked as success.
    pub async fn exit(
        &self,
        id: PositionId,
        reason: ExitReason,
    ) -> Result<ExitOutcome, EngineError> {
        let Some(existing) = self.store.get(id) else {
            return Err(EngineError::ExitFailed {
                position_id: id,
                reason: "unknown position".to_string(),
            });
        };
        if existing.status == PositionStatus::Closed {
            return Ok(ExitOutcome::AlreadyClosed {
                exit_price: existing.exit_price.unwrap_or(Decimal::ZERO),
                realized_pnl: existing.realized_pnl.unwrap_or(Decimal::ZERO),
            });
        }

        let position = match self.store.begin_close(id) {
            Ok(position) => position,
            Err(StoreError::InvalidTransition { from, .. }) if from == PositionStatus::Closing => {
                return Ok(ExitOutcome::InFlight);
            }
            Err(StoreError::Persistence(e)) => {
                return Err(EngineError::PersistenceUnavailable(e));
            }
            Err(e) => {
                return Err(EngineError::ExitFailed {
                    position_id: id,
                    reason: e.to_string(),
                });
            }
        };

        let request = OrderRequest {
            symbol: position.symbol.clone(),
            legs: closing_legs(&position.legs),
            quantity: position.quantity,
            intent: OrderIntent::Exit,
            tag: format!("{id}-exit"),
        };
        let exit_price = match self.work_order(&request).await {
            Ok(price) => price,
            Err(err) => {
                let detail = err.to_string();
                if let Err(revert) = self.store.abort_close(id) {
                    error!(position_id = %id, %revert, "failed to revert position to open");
                    self.notifier
                        .notify(&EngineEvent::Alert {
                            message: format!("position {id} stuck in closing state: {revert}"),
                        })
                        .await;
                }
                self.notifier
                    .notify(&EngineEvent::ExitFailed {
                        position_id: id,
                        reason: detail.clone(),
                    })
                    .await;
                return Err(EngineError::ExitFailed {
                    position_id: id,
                    reason: detail,
                });
            }
        };

        let realized_pnl = (exit_price - position.entry_price) * position.quantity;
        self.store
            .complete_close(id, exit_price, realized_pnl, reason, Utc::now())
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        let committed = self
            .risk
            .commit(id, realized_pnl)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        if committed.breaker_tripped_now {
            let state = self.risk.state();
            self.notifier
                .notify(&EngineEvent::CircuitBreakerTripped {
                    realized_loss: state.realized_loss_today,
                    limit: self.risk.constraints().daily_loss_limit,
                })
                .await;
        }
        info!(position_id = %id, %reason, %exit_price, %realized_pnl, "position closed");
        self.notifier
            .notify(&EngineEvent::ExitTriggered {
                position_id: id,
                reason,
                exit_price,
                realized_pnl,
            })
            .await;
        Ok(ExitOutcome::Closed {
            exit_price,
            realized_pnl,
        })
    }

    async fn register_fill(
        &self,
        signal: &Signal,
        id: PositionId,
        quantity: Decimal,
        leg_prices: &[Decimal],
        fill_price: Decimal,
    ) -> Result<(), EngineError> {
        let constraints = self.risk.constraints();
        let legs = signal
            .proposed_legs
            .iter()
            .zip(leg_prices)
            .map(|(leg, &price)| FilledLeg {
                leg: leg.clone(),
                fill_price: price,
            })
            .collect();
        let position = Position::open(
            id,
            signal.symbol.clone(),
            signal.strategy,
            legs,
            fill_price,
            quantity,
            constraints.stop_loss_pct,
            constraints.target_pct,
            Utc::now(),
        );
        let stop_loss_price = position.stop_loss_price;
        let target_price = position.target_price;

        if let Err(e) = self.store.insert_open(position) {
            // The fill is real even though registration failed. Escalate
            // rather than release, so exposure is never uncounted.
            self.notifier
                .notify(&EngineEvent::Alert {
                    message: format!("filled position {id} could not be persisted: {e}"),
                })
                .await;
            return Err(EngineError::PersistenceUnavailable(e.to_string()));
        }
        self.risk
            .confirm(id)
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;

        info!(
            position_id = %id,
            strategy = %signal.strategy,
            %quantity,
            entry_price = %fill_price,
            "entry filled and registered"
        );
        self.notifier
            .notify(&EngineEvent::OrderPlaced {
                position_id: id,
                symbol: signal.symbol.clone(),
                strategy: signal.strategy,
                quantity,
                entry_price: fill_price,
                stop_loss_price,
                target_price,
            })
            .await;
        Ok(())
    }

    async fn abandon_entry(
        &self,
        signal: &Signal,
        id: PositionId,
        attempts: u32,
        err: &EngineError,
    ) {
        if let Err(release_err) = self.risk.release(id) {
            error!(position_id = %id, %release_err, "failed to release reservation");
            self.notifier
                .notify(&EngineEvent::Alert {
                    message: format!(
                        "reservation {id} could not be released; risk counters may overcount: {release_err}"
                    ),
                })
                .await;
        }
        warn!(strategy = %signal.strategy, %err, "entry abandoned, reservation released");
        self.notifier
            .notify(&EngineEvent::OrderFailed {
                strategy: signal.strategy,
                attempts,
                reason: err.to_string(),
            })
            .await;
    }

    /// Places an order with bounded retries and linear backoff. Pending
    /// tickets are polled until filled, rejected or timed out.
    async fn work_order(&self, request: &OrderRequest) -> Result<Decimal, EngineError> {
        let attempts = self.exec_cfg.order_retries.max(1);
        let place_timeout = Duration::from_secs(self.exec_cfg.order_timeout_secs);
        let mut last_reason = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                sleep(Duration::from_millis(
                    self.exec_cfg.retry_backoff_ms * u64::from(attempt - 1),
                ))
                .await;
            }
            let placed = timeout(place_timeout, self.broker.place_order(request)).await;
            let ticket = match placed {
                Err(_) => {
                    last_reason = "order placement timed out".to_string();
                    warn!(tag = %request.tag, attempt, "order placement timed out");
                    continue;
                }
                Ok(Err(e)) => {
                    last_reason = e.to_string();
                    warn!(tag = %request.tag, attempt, error = %e, "order placement failed");
                    continue;
                }
                Ok(Ok(ticket)) => ticket,
            };
            match ticket.status {
                OrderStatus::Filled { fill_price } => return Ok(fill_price),
                OrderStatus::Rejected { reason } => {
                    warn!(tag = %request.tag, attempt, %reason, "order rejected");
                    last_reason = reason;
                }
                OrderStatus::Pending => match self.await_confirmation(&ticket.order_id).await {
                    ConfirmOutcome::Filled(fill_price) => return Ok(fill_price),
                    ConfirmOutcome::Rejected(reason) => last_reason = reason,
                    ConfirmOutcome::Unreachable(reason) => last_reason = reason,
                    ConfirmOutcome::TimedOut => {
                        return Err(EngineError::OrderConfirmationTimeout {
                            timeout_secs: self.exec_cfg.order_timeout_secs,
                        });
                    }
                },
            }
        }
        Err(EngineError::OrderPlacementFailed {
            attempts,
            reason: last_reason,
        })
    }

    async fn await_confirmation(&self, order_id: &str) -> ConfirmOutcome {
        let deadline = Instant::now() + Duration::from_secs(self.exec_cfg.order_timeout_secs);
        loop {
            match self.broker.order_status(order_id).await {
                Ok(OrderStatus::Filled { fill_price }) => {
                    return ConfirmOutcome::Filled(fill_price);
                }
                Ok(OrderStatus::Rejected { reason }) => return ConfirmOutcome::Rejected(reason),
                Ok(OrderStatus::Pending) => {
                    if Instant::now() >= deadline {
                        return ConfirmOutcome::TimedOut;
                    }
                    sleep(CONFIRM_POLL_INTERVAL).await;
                }
                Err(e) => return ConfirmOutcome::Unreachable(e.to_string()),
            }
        }
    }
}

/// The order legs that flatten an open position.
fn closing_legs(legs: &[FilledLeg]) -> Vec<OptionLeg> {
    legs.iter()
        .map(|filled| {
            let mut leg = filled.leg.clone();
            leg.side = match leg.side {
                LegSide::Buy => LegSide::Sell,
                LegSide::Sell => LegSide::Buy,
            };
            leg
        })
        .collect()
}
