use std::path::PathBuf;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::StrategyKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub risk: RiskConstraints,
    pub session: SessionConfig,
    pub signal: SignalConfig,
    pub execution: ExecutionConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Underlying index symbol.
    pub symbol: String,
    /// Account capital the sizing rule works against.
    pub capital: Decimal,
    /// Contract multiplier (units per lot).
    pub lot_size: u32,
    /// Daemon cadence for signal evaluation.
    pub signal_interval_secs: u64,
    /// Daemon cadence for position monitoring.
    pub monitor_interval_secs: u64,
}

/// Hard capital-protection constraints. Never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConstraints {
    pub daily_loss_limit: Decimal,
    pub max_trades_per_day: u32,
    pub max_open_positions: u32,
    /// Stop loss as a fraction of entry value (0.40 = 40%).
    pub stop_loss_pct: Decimal,
    /// Profit target as a fraction of entry value.
    pub target_pct: Decimal,
    /// Fraction of capital risked per trade.
    pub max_risk_per_trade: Decimal,
    /// Fractional Kelly multiplier applied on top of the risk-based size.
    pub kelly_fraction: Decimal,
    /// Per-trade lot cap.
    pub max_lots: u32,
}

/// Exchange session windows, in exchange-local (IST) wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    /// All open positions are unconditionally exited at this time.
    pub square_off: NaiveTime,
    /// No entries within this many minutes of open or close.
    pub entry_buffer_mins: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub technical: f64,
    pub greeks: f64,
    pub sentiment: f64,
    pub liquidity: f64,
}

impl SignalWeights {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.technical + self.greeks + self.sentiment + self.liquidity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Composite score at or above which a signal qualifies.
    pub min_composite_score: f64,
    pub weights: SignalWeights,
    /// Deterministic tie-break order when candidates score equal.
    pub strategy_priority: Vec<StrategyKind>,
    /// Snapshots older than this are rejected as incomplete data.
    pub max_snapshot_age_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Order placement attempts before the reservation is released.
    pub order_retries: u32,
    /// Base backoff between attempts; grows linearly per attempt.
    pub retry_backoff_ms: u64,
    /// Broker calls exceeding this are treated as failed.
    pub order_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Append-only risk ledger write-ahead log.
    pub wal_path: PathBuf,
    /// Position book snapshot file.
    pub positions_path: PathBuf,
    /// Market snapshot drop file written by the external feed.
    pub snapshot_path: PathBuf,
    /// Per-instrument quote drop file written by the external feed.
    pub quotes_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                symbol: "NIFTY".to_string(),
                capital: Decimal::new(500_000, 0),
                lot_size: 50,
                signal_interval_secs: 60,
                monitor_interval_secs: 300,
            },
            risk: RiskConstraints::default(),
            session: SessionConfig::default(),
            signal: SignalConfig::default(),
            execution: ExecutionConfig {
                order_retries: 3,
                retry_backoff_ms: 500,
                order_timeout_secs: 10,
            },
            storage: StorageConfig {
                wal_path: PathBuf::from("data/risk-wal.jsonl"),
                positions_path: PathBuf::from("data/positions.json"),
                snapshot_path: PathBuf::from("data/snapshot.json"),
                quotes_path: PathBuf::from("data/quotes.json"),
            },
        }
    }
}

impl Default for RiskConstraints {
    fn default() -> Self {
        Self {
            daily_loss_limit: Decimal::new(20_000, 0),
            max_trades_per_day: 3,
            max_open_positions: 4,
            stop_loss_pct: Decimal::new(40, 2),
            target_pct: Decimal::new(40, 2),
            max_risk_per_trade: Decimal::new(2, 2),
            kelly_fraction: Decimal::new(25, 2),
            max_lots: 1,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            market_open: NaiveTime::from_hms_opt(9, 15, 0).expect("valid time"),
            market_close: NaiveTime::from_hms_opt(15, 30, 0).expect("valid time"),
            square_off: NaiveTime::from_hms_opt(15, 29, 0).expect("valid time"),
            entry_buffer_mins: 30,
        }
    }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_composite_score: 70.0,
            weights: SignalWeights {
                technical: 0.40,
                greeks: 0.30,
                sentiment: 0.20,
                liquidity: 0.10,
            },
            strategy_priority: vec![
                StrategyKind::IronCondor,
                StrategyKind::ShortStrangle,
                StrategyKind::CalendarSpread,
                StrategyKind::AtmDirectional,
            ],
            max_snapshot_age_secs: 120,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_risk_constraints_match_policy() {
        let risk = RiskConstraints::default();
        assert_eq!(risk.daily_loss_limit, dec!(20000));
        assert_eq!(risk.max_trades_per_day, 3);
        assert_eq!(risk.max_open_positions, 4);
        assert_eq!(risk.stop_loss_pct, dec!(0.40));
        assert_eq!(risk.target_pct, dec!(0.40));
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = SignalConfig::default().weights;
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn default_config_serializes_round_trip() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.engine.symbol, "NIFTY");
        assert_eq!(back.session.square_off, config.session.square_off);
    }
}
