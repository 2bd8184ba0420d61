//! Technical sub-scorer: RSI, MACD and trend slope over the close series.

use nifty_algo_core::{IncompleteData, MarketSnapshot, StrategyKind};

use crate::indicators::{macd, rsi, slope};
use crate::scorer::{Scorer, SubScore};

/// Minimum closes needed before indicator output is treated as signal
/// rather than noise.
const MIN_HISTORY: usize = 15;

#[derive(Debug, Default)]
pub struct TechnicalScorer;

impl Scorer for TechnicalScorer {
    fn name(&self) -> &'static str {
        "technical"
    }

    fn score(
        &self,
        snapshot: &MarketSnapshot,
        strategy: StrategyKind,
    ) -> Result<SubScore, IncompleteData> {
        let closes = &snapshot.price_history;
        if closes.len() < MIN_HISTORY {
            return Err(IncompleteData {
                field: "price_history",
            });
        }
        let last = closes[closes.len() - 1];
        if last <= 0.0 {
            return Err(IncompleteData {
                field: "price_history",
            });
        }

        let rsi_value = rsi(closes, 14);
        let (_, _, histogram) = macd(closes, 12, 26, 9);
        // Slope as percent of spot per bar, so the trend measure is
        // comparable across index levels.
        let slope_pct = slope(closes) / last * 100.0;
        let trend_strength = (slope_pct.abs() * 200.0).min(100.0);
        let rsi_distance = (rsi_value - 50.0).abs() * 2.0;

        let score = match strategy {
            // Premium sellers want a quiet, range-bound market.
            StrategyKind::IronCondor | StrategyKind::ShortStrangle | StrategyKind::CalendarSpread => {
                0.5 * (100.0 - rsi_distance) + 0.5 * (100.0 - trend_strength)
            }
            // Directional entries want conviction plus a MACD that agrees
            // with the trend direction.
            StrategyKind::AtmDirectional => {
                let aligned = histogram.signum() == slope_pct.signum();
                let alignment = if aligned { 100.0 } else { 0.0 };
                0.5 * rsi_distance.min(100.0) + 0.3 * trend_strength + 0.2 * alignment
            }
        };

        Ok(SubScore::new(self.name(), score).with_reason(format!(
            "rsi={rsi_value:.1} slope={slope_pct:.3}%/bar macd_hist={histogram:.2}"
        )))
    }
}
