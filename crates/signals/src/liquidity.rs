//! Liquidity sub-scorer: quote spread tightness and traded volume.

use nifty_algo_core::{IncompleteData, MarketSnapshot, StrategyKind};
use rust_decimal::prelude::ToPrimitive;

use crate::scorer::{Scorer, SubScore};

/// Spread at or below this fraction of mid scores full marks.
const TIGHT_SPREAD_PCT: f64 = 0.0005;
/// Spread at or above this fraction of mid scores zero.
const WIDE_SPREAD_PCT: f64 = 0.005;
/// Session volume at or above this scores full marks.
const DEEP_VOLUME: f64 = 100_000.0;

#[derive(Debug, Default)]
pub struct LiquidityScorer;

impl Scorer for LiquidityScorer {
    fn name(&self) -> &'static str {
        "liquidity"
    }

    fn score(
        &self,
        snapshot: &MarketSnapshot,
        _strategy: StrategyKind,
    ) -> Result<SubScore, IncompleteData> {
        let bid = snapshot.bid.to_f64().ok_or(IncompleteData { field: "bid" })?;
        let ask = snapshot.ask.to_f64().ok_or(IncompleteData { field: "ask" })?;
        let volume = snapshot
            .volume
            .to_f64()
            .ok_or(IncompleteData { field: "volume" })?;
        if bid <= 0.0 || ask < bid {
            return Err(IncompleteData { field: "bid_ask" });
        }

        let mid = (bid + ask) / 2.0;
        let spread_pct = (ask - bid) / mid;
        let spread_fit = if spread_pct <= TIGHT_SPREAD_PCT {
            100.0
        } else {
            ((WIDE_SPREAD_PCT - spread_pct) / (WIDE_SPREAD_PCT - TIGHT_SPREAD_PCT) * 100.0)
                .max(0.0)
        };
        let depth_fit = (volume / DEEP_VOLUME * 100.0).min(100.0);

        let score = 0.6 * spread_fit + 0.4 * depth_fit;
        Ok(SubScore::new(self.name(), score).with_reason(format!(
            "spread={:.3}% volume={volume:.0}",
            spread_pct * 100.0
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn snapshot(bid: Decimal, ask: Decimal, volume: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "NIFTY".to_string(),
            spot: dec!(24500),
            volume,
            bid,
            ask,
            price_history: vec![24_500.0; 30],
            greeks: None,
            iv: None,
            iv_percentile: None,
            vix: None,
            pcr: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn tight_deep_book_scores_full_marks() {
        let snap = snapshot(dec!(24499), dec!(24501), dec!(250000));
        let sub = LiquidityScorer
            .score(&snap, StrategyKind::IronCondor)
            .unwrap();
        assert!((sub.score - 100.0).abs() < 1e-9, "score = {}", sub.score);
    }

    #[test]
    fn wide_spread_scores_poorly() {
        let snap = snapshot(dec!(24300), dec!(24700), dec!(250000));
        let sub = LiquidityScorer
            .score(&snap, StrategyKind::IronCondor)
            .unwrap();
        assert!(sub.score <= 40.0, "score = {}", sub.score);
    }

    #[test]
    fn crossed_book_is_incomplete_data() {
        let snap = snapshot(dec!(24501), dec!(24499), dec!(250000));
        let err = LiquidityScorer
            .score(&snap, StrategyKind::IronCondor)
            .unwrap_err();
        assert_eq!(err.field, "bid_ask");
    }

    #[test]
    fn thin_volume_drags_the_score() {
        let deep = LiquidityScorer
            .score(
                &snapshot(dec!(24499), dec!(24501), dec!(250000)),
                StrategyKind::IronCondor,
            )
            .unwrap();
        let thin = LiquidityScorer
            .score(
                &snapshot(dec!(24499), dec!(24501), dec!(5000)),
                StrategyKind::IronCondor,
            )
            .unwrap();
        assert!(thin.score < deep.score);
    }
}
