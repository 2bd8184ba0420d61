//! The trading engine facade: startup wiring and the scheduler-facing
//! entry points.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use nifty_algo_core::{
    AppConfig, BrokerGateway, ClockGate, EngineError, EngineEvent, MarketDataProvider, Notifier,
    TradeAction,
};
use nifty_algo_execution::{ExecutionCoordinator, SubmitOutcome};
use nifty_algo_positions::{Position, PositionStore};
use nifty_algo_risk::{RiskLedger, RiskState, RiskWal};
use nifty_algo_signals::{Evaluation, Signal, SignalEngine};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::monitor::PositionMonitor;
use crate::reconcile::reconcile_pending;

pub struct TradingEngine {
    config: AppConfig,
    clock: ClockGate,
    signals: SignalEngine,
    coordinator: Arc<ExecutionCoordinator>,
    monitor: PositionMonitor,
    market: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
    risk: Arc<RiskLedger>,
    store: Arc<PositionStore>,
}

impl TradingEngine {
    /// Opens durable state for the current trading day, reconciles any
    /// reservations that were in flight at the last shutdown, and wires
    /// the tick handlers.
    pub async fn start(
        config: AppConfig,
        broker: Arc<dyn BrokerGateway>,
        market: Arc<dyn MarketDataProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let today = ClockGate::local_date(Utc::now());
        let wal = RiskWal::new(config.storage.wal_path.clone());
        let (risk, pending) = RiskLedger::open(config.risk.clone(), wal, today)
            .context("opening risk ledger")?;
        let risk = Arc::new(risk);
        let store = Arc::new(PositionStore::open(config.storage.positions_path.clone()));
        if !pending.is_empty() {
            info!(count = pending.len(), "reconciling in-flight reservations");
            reconcile_pending(&pending, &risk, &store, broker.as_ref(), notifier.as_ref())
                .await
                .context("reconciling pending reservations")?;
        }

        let signals =
            SignalEngine::new(config.signal.clone()).context("building signal engine")?;
        let coordinator = Arc::new(ExecutionCoordinator::new(
            config.engine.clone(),
            config.execution.clone(),
            Arc::clone(&risk),
            Arc::clone(&store),
            broker,
            Arc::clone(&market),
            Arc::clone(&notifier),
            config.signal.max_snapshot_age_secs,
        ));
        let monitor = PositionMonitor::new(
            Arc::clone(&store),
            Arc::clone(&market),
            Arc::clone(&coordinator),
            Arc::clone(&notifier),
            config.signal.max_snapshot_age_secs,
        );

        info!(symbol = %config.engine.symbol, day = %today, "trading engine started");
        Ok(Self {
            clock: ClockGate::new(&config.session),
            config,
            signals,
            coordinator,
            monitor,
            market,
            notifier,
            risk,
            store,
        })
    }

    /// One signal-generation tick: gate, snapshot, evaluate, submit.
    ///
    /// Returns `None` when no order was attempted (outside the entry
    /// window, incomplete data, or no qualifying signal).
    pub async fn on_signal_tick(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmitOutcome>, EngineError> {
        self.roll_risk_day(now)?;
        let local = ClockGate::local_time(now);
        if !self.clock.is_permitted(local, TradeAction::EnterPosition) {
            debug!(%local, "outside entry window, signal tick skipped");
            return Ok(None);
        }

        let snapshot = self.market.snapshot(&self.config.engine.symbol).await?;
        match self.signals.evaluate(&snapshot, now) {
            Evaluation::Emit(signal) => {
                self.notifier
                    .notify(&EngineEvent::SignalGenerated {
                        symbol: signal.symbol.clone(),
                        strategy: signal.strategy,
                        composite_score: signal.composite_score,
                        reasons: signal.reasons.clone(),
                    })
                    .await;
                let outcome = self.coordinator.submit(&signal).await?;
                Ok(Some(outcome))
            }
            Evaluation::BelowThreshold { best_score, .. } => {
                self.notifier
                    .notify(&EngineEvent::BelowThreshold {
                        best_score,
                        threshold: self.config.signal.min_composite_score,
                    })
                    .await;
                Ok(None)
            }
            Evaluation::Incomplete(missing) => {
                self.notifier
                    .notify(&EngineEvent::DataIncomplete {
                        field: missing.field.to_string(),
                    })
                    .await;
                Ok(None)
            }
        }
    }

    /// One monitoring tick. Once the square-off deadline passes this
    /// becomes the forced-close path, so a missed earlier tick cannot
    /// leave positions open past the deadline.
    pub async fn on_monitor_tick(&self, now: DateTime<Utc>) -> usize {
        // A failed rollover leaves yesterday's (stricter) state in force;
        // exits must still run.
        if let Err(e) = self.roll_risk_day(now) {
            warn!(error = %e, "trading day rollover could not be logged");
        }
        if self.clock.square_off_due(ClockGate::local_time(now)) {
            self.monitor.square_off().await
        } else {
            self.monitor.tick(now).await
        }
    }

    /// Unconditionally exits all open positions. Idempotent when none
    /// are open.
    pub async fn on_forced_close(&self) -> usize {
        self.monitor.square_off().await
    }

    /// Routes an externally-triggered candidate through the same
    /// clock-and-risk gates as scheduler-driven entries. No trigger
    /// origin bypasses the risk ledger.
    pub async fn on_external_order_signal(
        &self,
        signal: &Signal,
        now: DateTime<Utc>,
    ) -> Result<Option<SubmitOutcome>, EngineError> {
        self.roll_risk_day(now)?;
        let local = ClockGate::local_time(now);
        if !self.clock.is_permitted(local, TradeAction::EnterPosition) {
            warn!(%local, strategy = %signal.strategy, "external signal outside entry window, discarded");
            return Ok(None);
        }
        let outcome = self.coordinator.submit(signal).await?;
        Ok(Some(outcome))
    }

    /// A long-running daemon crosses midnight without restarting; the
    /// first tick of each new local date starts a fresh risk day.
    fn roll_risk_day(&self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.risk
            .roll_day(ClockGate::local_date(now))
            .map_err(|e| EngineError::PersistenceUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Daemon loop: signal and monitor cadences on independent timers.
    /// Runs until a fatal persistence failure.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut signal_tick =
            interval(Duration::from_secs(self.config.engine.signal_interval_secs));
        let mut monitor_tick =
            interval(Duration::from_secs(self.config.engine.monitor_interval_secs));
        signal_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        monitor_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = signal_tick.tick() => {
                    match self.on_signal_tick(Utc::now()).await {
                        Ok(_) => {}
                        Err(e @ EngineError::PersistenceUnavailable(_)) => {
                            return Err(e).context("risk-affecting state cannot be persisted");
                        }
                        Err(e) => warn!(error = %e, "signal tick failed"),
                    }
                }
                _ = monitor_tick.tick() => {
                    self.on_monitor_tick(Utc::now()).await;
                }
            }
        }
    }

    #[must_use]
    pub fn risk_state(&self) -> RiskState {
        self.risk.state()
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.store.open_positions()
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use chrono::{NaiveDate, TimeZone};
    use nifty_algo_core::{
        DenyReason, Greeks, LegSide, MarketSnapshot, OptionLeg, StrategyKind,
    };
    use nifty_algo_execution::{PaperBroker, PaperMarket};
    use nifty_algo_positions::PositionStatus;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    struct Harness {
        engine: TradingEngine,
        broker: Arc<PaperBroker>,
        market: Arc<PaperMarket>,
        notifier: Arc<MemoryNotifier>,
        _dir: TempDir,
    }

    async fn harness(capital: Decimal) -> Harness {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.engine.capital = capital;
        config.execution.retry_backoff_ms = 1;
        config.storage.wal_path = dir.path().join("risk-wal.jsonl");
        config.storage.positions_path = dir.path().join("positions.json");

        let broker = Arc::new(PaperBroker::new(dec!(100)));
        let market = Arc::new(PaperMarket::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let engine = TradingEngine::start(
            config,
            Arc::clone(&broker) as Arc<dyn BrokerGateway>,
            Arc::clone(&market) as Arc<dyn MarketDataProvider>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )
        .await
        .unwrap();
        Harness {
            engine,
            broker,
            market,
            notifier,
            _dir: dir,
        }
    }

    /// 05:00 UTC on a Monday = 10:30 IST, mid-session.
    fn mid_session() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 5, 0, 0).unwrap()
    }

    /// 20:00 UTC = 01:30 IST the next day, well outside market hours.
    fn overnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 24, 20, 0, 0).unwrap()
    }

    fn calm_snapshot(at: DateTime<Utc>) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "NIFTY".to_string(),
            spot: dec!(24510),
            volume: dec!(250000),
            bid: dec!(24509),
            ask: dec!(24511),
            price_history: (0..40)
                .map(|i| 24_500.0 + if i % 2 == 0 { 2.0 } else { -2.0 })
                .collect(),
            greeks: Some(Greeks {
                delta: 0.04,
                theta: 12.0,
                gamma: 0.001,
            }),
            iv: Some(16.0),
            iv_percentile: Some(85.0),
            vix: Some(13.0),
            pcr: Some(1.0),
            timestamp: at,
        }
    }

    fn quote_condor_legs(market: &PaperMarket) {
        // The condor the engine will build around spot 24510 on 2026-08-24:
        // weekly expiry Thursday 2026-08-27, ATM 24500.
        market.set_quote("NIFTY26AUG24600CE", dec!(100));
        market.set_quote("NIFTY26AUG24400PE", dec!(90));
        market.set_quote("NIFTY26AUG24800CE", dec!(20));
        market.set_quote("NIFTY26AUG24200PE", dec!(15));
    }

    fn directional_signal(instrument: &str) -> Signal {
        Signal {
            symbol: "NIFTY".to_string(),
            strategy: StrategyKind::AtmDirectional,
            component_scores: vec![],
            composite_score: 85.0,
            proposed_legs: vec![OptionLeg {
                instrument: instrument.to_string(),
                side: LegSide::Buy,
                strike: dec!(24500),
                expiry: NaiveDate::from_ymd_opt(2026, 8, 27).unwrap(),
            }],
            reasons: vec![],
            generated_at: Utc::now(),
        }
    }

    // =========================================================================
    // Signal tick
    // =========================================================================

    #[tokio::test]
    async fn calm_market_tick_places_an_iron_condor() {
        let h = harness(dec!(5000000)).await;
        let now = mid_session();
        h.market.set_snapshot(calm_snapshot(now));
        quote_condor_legs(&h.market);
        // Net credit: sells 100 + 90 against hedges 20 + 15.
        h.broker.set_mark(dec!(-155));

        let outcome = h.engine.on_signal_tick(now).await.unwrap();
        let Some(SubmitOutcome::Placed(id)) = outcome else {
            panic!("expected a placed condor, got {outcome:?}");
        };
        let positions = h.engine.open_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].id, id);
        assert_eq!(positions[0].strategy, StrategyKind::IronCondor);
        assert_eq!(positions[0].legs.len(), 4);
        assert_eq!(positions[0].entry_price, dec!(-155));
        // Stop and target band a credit position in net-value terms.
        assert_eq!(positions[0].stop_loss_price, dec!(-217));
        assert_eq!(positions[0].target_price, dec!(-93));
        assert!(h
            .notifier
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::SignalGenerated { strategy: StrategyKind::IronCondor, .. })));
    }

    #[tokio::test]
    async fn hostile_market_tick_stays_flat() {
        let h = harness(dec!(5000000)).await;
        let now = mid_session();
        let mut snapshot = calm_snapshot(now);
        // Panic VIX and a hard trend: nothing scores through.
        snapshot.vix = Some(34.0);
        snapshot.price_history = (0..40).map(|i| 24_000.0 + 40.0 * f64::from(i)).collect();
        h.market.set_snapshot(snapshot);

        let outcome = h.engine.on_signal_tick(now).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(h.broker.placed_count(), 0);
        assert!(h
            .notifier
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::BelowThreshold { .. })));
    }

    #[tokio::test]
    async fn partial_feed_skips_the_tick() {
        let h = harness(dec!(5000000)).await;
        let now = mid_session();
        let mut snapshot = calm_snapshot(now);
        snapshot.vix = None;
        h.market.set_snapshot(snapshot);

        let outcome = h.engine.on_signal_tick(now).await.unwrap();
        assert!(outcome.is_none());
        assert!(h.notifier.events().iter().any(
            |e| matches!(e, EngineEvent::DataIncomplete { field } if field == "vix")
        ));
    }

    #[tokio::test]
    async fn stale_snapshot_skips_the_tick() {
        let h = harness(dec!(5000000)).await;
        let now = mid_session();
        h.market
            .set_snapshot(calm_snapshot(now - chrono::Duration::seconds(400)));

        let outcome = h.engine.on_signal_tick(now).await.unwrap();
        assert!(outcome.is_none());
        assert!(h.notifier.events().iter().any(
            |e| matches!(e, EngineEvent::DataIncomplete { field } if field == "snapshot_age")
        ));
    }

    #[tokio::test]
    async fn overnight_tick_does_not_even_fetch_a_snapshot() {
        let h = harness(dec!(5000000)).await;
        // No snapshot configured: a fetch would error, proving the gate
        // short-circuits first.
        let outcome = h.engine.on_signal_tick(overnight()).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(h.broker.placed_count(), 0);
    }

    // =========================================================================
    // External signals
    // =========================================================================

    #[tokio::test]
    async fn external_signal_rides_the_same_risk_path() {
        let h = harness(dec!(500000)).await;
        h.market.set_quote("LEG-X", dec!(100));

        let outcome = h
            .engine
            .on_external_order_signal(&directional_signal("LEG-X"), mid_session())
            .await
            .unwrap();
        assert!(matches!(outcome, Some(SubmitOutcome::Placed(_))));

        // Risk limits bind external triggers exactly the same way.
        for _ in 0..2 {
            h.engine
                .on_external_order_signal(&directional_signal("LEG-X"), mid_session())
                .await
                .unwrap();
        }
        let outcome = h
            .engine
            .on_external_order_signal(&directional_signal("LEG-X"), mid_session())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Some(SubmitOutcome::Denied(DenyReason::TradeLimitReached))
        );
    }

    #[tokio::test]
    async fn external_signal_outside_hours_is_discarded() {
        let h = harness(dec!(500000)).await;
        h.market.set_quote("LEG-X", dec!(100));
        let outcome = h
            .engine
            .on_external_order_signal(&directional_signal("LEG-X"), overnight())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(h.broker.placed_count(), 0);
    }

    // =========================================================================
    // Forced close
    // =========================================================================

    #[tokio::test]
    async fn forced_close_flattens_three_positions_and_is_idempotent() {
        let h = harness(dec!(500000)).await;
        for instrument in ["LEG-A", "LEG-B", "LEG-C"] {
            h.market.set_quote(instrument, dec!(100));
            let outcome = h
                .engine
                .on_external_order_signal(&directional_signal(instrument), mid_session())
                .await
                .unwrap();
            assert!(matches!(outcome, Some(SubmitOutcome::Placed(_))));
        }
        h.broker.set_mark(dec!(95));

        assert_eq!(h.engine.on_forced_close().await, 3);
        assert!(h.engine.open_positions().is_empty());
        let square_off_exits = h
            .notifier
            .events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    EngineEvent::ExitTriggered {
                        reason: nifty_algo_core::ExitReason::ForcedSquareOff,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(square_off_exits, 3);

        assert_eq!(h.engine.on_forced_close().await, 0);
    }

    #[tokio::test]
    async fn monitor_tick_becomes_square_off_past_the_deadline() {
        let h = harness(dec!(500000)).await;
        h.market.set_quote("LEG-A", dec!(100));
        h.engine
            .on_external_order_signal(&directional_signal("LEG-A"), mid_session())
            .await
            .unwrap();
        // Mark is comfortably inside the stop/target band; only the
        // deadline forces the exit.
        h.market.set_quote("LEG-A", dec!(105));
        h.broker.set_mark(dec!(105));

        // 10:00 UTC = 15:30 IST, past the 15:29 square-off.
        let late = Utc.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap();
        assert_eq!(h.engine.on_monitor_tick(late).await, 1);
        let positions = h.engine.open_positions();
        assert!(positions.is_empty());
    }

    // =========================================================================
    // Day rollover
    // =========================================================================

    #[tokio::test]
    async fn overnight_daemon_starts_a_fresh_risk_day_on_the_first_next_day_tick() {
        let h = harness(dec!(500000)).await;
        h.market.set_quote("LEG-A", dec!(100));
        h.engine
            .on_external_order_signal(&directional_signal("LEG-A"), mid_session())
            .await
            .unwrap();
        assert_eq!(h.engine.risk_state().trades_today, 1);

        // Same process, next local date. No restart reopens the ledger.
        let tomorrow = Utc::now() + chrono::Duration::days(1);
        h.engine.on_monitor_tick(tomorrow).await;

        let state = h.engine.risk_state();
        assert_eq!(state.trading_day, ClockGate::local_date(tomorrow));
        assert_eq!(state.trades_today, 0);
        assert_eq!(state.realized_loss_today, dec!(0));
        assert!(!state.circuit_breaker_tripped);
    }

    // =========================================================================
    // Restart
    // =========================================================================

    #[tokio::test]
    async fn risk_state_survives_an_engine_restart() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.risk.daily_loss_limit = dec!(1500);
        config.execution.retry_backoff_ms = 1;
        config.storage.wal_path = dir.path().join("risk-wal.jsonl");
        config.storage.positions_path = dir.path().join("positions.json");

        let broker = Arc::new(PaperBroker::new(dec!(100)));
        let market = Arc::new(PaperMarket::new());
        market.set_quote("LEG-A", dec!(100));
        let notifier = Arc::new(MemoryNotifier::new());

        let engine = TradingEngine::start(
            config.clone(),
            Arc::clone(&broker) as Arc<dyn BrokerGateway>,
            Arc::clone(&market) as Arc<dyn MarketDataProvider>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )
        .await
        .unwrap();
        engine
            .on_external_order_signal(&directional_signal("LEG-A"), mid_session())
            .await
            .unwrap();
        // Stop out for -2000, past the 1500 limit.
        broker.set_mark(dec!(60));
        market.set_quote_at("LEG-A", dec!(55), mid_session());
        engine.on_monitor_tick(mid_session()).await;
        assert!(engine.risk_state().circuit_breaker_tripped);
        drop(engine);

        let restarted = TradingEngine::start(
            config,
            Arc::clone(&broker) as Arc<dyn BrokerGateway>,
            Arc::clone(&market) as Arc<dyn MarketDataProvider>,
            notifier as Arc<dyn Notifier>,
        )
        .await
        .unwrap();
        assert!(restarted.risk_state().circuit_breaker_tripped);
        // Fresh quote so the breaker, not quote age, decides the outcome.
        market.set_quote("LEG-A", dec!(55));
        let outcome = restarted
            .on_external_order_signal(&directional_signal("LEG-A"), mid_session())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            Some(SubmitOutcome::Denied(DenyReason::CircuitBreakerTripped))
        );
    }

    #[tokio::test]
    async fn position_book_round_trips_across_restart() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.execution.retry_backoff_ms = 1;
        config.storage.wal_path = dir.path().join("risk-wal.jsonl");
        config.storage.positions_path = dir.path().join("positions.json");

        let broker = Arc::new(PaperBroker::new(dec!(100)));
        let market = Arc::new(PaperMarket::new());
        market.set_quote("LEG-A", dec!(100));
        let notifier = Arc::new(MemoryNotifier::new());

        let engine = TradingEngine::start(
            config.clone(),
            Arc::clone(&broker) as Arc<dyn BrokerGateway>,
            Arc::clone(&market) as Arc<dyn MarketDataProvider>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )
        .await
        .unwrap();
        engine
            .on_external_order_signal(&directional_signal("LEG-A"), mid_session())
            .await
            .unwrap();
        let before = engine.open_positions().remove(0);
        drop(engine);

        let restarted = TradingEngine::start(
            config,
            Arc::clone(&broker) as Arc<dyn BrokerGateway>,
            Arc::clone(&market) as Arc<dyn MarketDataProvider>,
            notifier as Arc<dyn Notifier>,
        )
        .await
        .unwrap();
        let after = restarted.open_positions().remove(0);
        assert_eq!(after.id, before.id);
        assert_eq!(after.status, PositionStatus::Open);
        assert_eq!(after.entry_price, before.entry_price);
        assert_eq!(after.stop_loss_price, before.stop_loss_price);
        assert_eq!(after.target_price, before.target_price);
        assert_eq!(after.quantity, before.quantity);
    }
}
