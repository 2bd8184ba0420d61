//! Sentiment sub-scorer: VIX regime and put-call ratio balance.

use nifty_algo_core::{IncompleteData, MarketSnapshot, StrategyKind};

use crate::scorer::{Scorer, SubScore};

/// India VIX band considered a calm, sellable regime.
const VIX_CALM_LOW: f64 = 10.0;
const VIX_CALM_HIGH: f64 = 18.0;

#[derive(Debug, Default)]
pub struct SentimentScorer;

impl Scorer for SentimentScorer {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    fn score(
        &self,
        snapshot: &MarketSnapshot,
        strategy: StrategyKind,
    ) -> Result<SubScore, IncompleteData> {
        let vix = snapshot.vix.ok_or(IncompleteData { field: "vix" })?;
        let pcr = snapshot.pcr.ok_or(IncompleteData { field: "pcr" })?;

        let vix_calm = if (VIX_CALM_LOW..=VIX_CALM_HIGH).contains(&vix) {
            100.0
        } else {
            let distance = if vix < VIX_CALM_LOW {
                VIX_CALM_LOW - vix
            } else {
                vix - VIX_CALM_HIGH
            };
            (100.0 - distance * 12.5).max(0.0)
        };
        // PCR near 1.0 reads as balanced positioning; the further from
        // parity, the more one-sided the crowd.
        let pcr_skew = ((pcr - 1.0).abs() * 100.0).min(100.0);

        let score = match strategy {
            StrategyKind::IronCondor | StrategyKind::ShortStrangle | StrategyKind::CalendarSpread => {
                0.6 * vix_calm + 0.4 * (100.0 - pcr_skew)
            }
            // One-sided positioning is the directional edge.
            StrategyKind::AtmDirectional => 0.4 * vix_calm + 0.6 * pcr_skew,
        };

        Ok(SubScore::new(self.name(), score)
            .with_reason(format!("vix={vix:.1} pcr={pcr:.2}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snapshot(vix: Option<f64>, pcr: Option<f64>) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "NIFTY".to_string(),
            spot: dec!(24500),
            volume: dec!(125000),
            bid: dec!(24499),
            ask: dec!(24501),
            price_history: vec![24_500.0; 30],
            greeks: None,
            iv: None,
            iv_percentile: None,
            vix,
            pcr,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn missing_vix_or_pcr_is_incomplete() {
        assert_eq!(
            SentimentScorer
                .score(&snapshot(None, Some(1.0)), StrategyKind::IronCondor)
                .unwrap_err()
                .field,
            "vix"
        );
        assert_eq!(
            SentimentScorer
                .score(&snapshot(Some(13.0), None), StrategyKind::IronCondor)
                .unwrap_err()
                .field,
            "pcr"
        );
    }

    #[test]
    fn calm_balanced_market_scores_high_for_sellers() {
        let sub = SentimentScorer
            .score(&snapshot(Some(13.0), Some(1.0)), StrategyKind::ShortStrangle)
            .unwrap();
        assert!(sub.score > 95.0, "score = {}", sub.score);
    }

    #[test]
    fn panic_vix_suppresses_selling_strategies() {
        let calm = SentimentScorer
            .score(&snapshot(Some(13.0), Some(1.0)), StrategyKind::IronCondor)
            .unwrap();
        let panic = SentimentScorer
            .score(&snapshot(Some(26.0), Some(1.0)), StrategyKind::IronCondor)
            .unwrap();
        assert!(panic.score < calm.score);
    }

    #[test]
    fn skewed_pcr_rewards_directional() {
        let balanced = SentimentScorer
            .score(&snapshot(Some(13.0), Some(1.0)), StrategyKind::AtmDirectional)
            .unwrap();
        let skewed = SentimentScorer
            .score(&snapshot(Some(13.0), Some(1.7)), StrategyKind::AtmDirectional)
            .unwrap();
        assert!(skewed.score > balanced.score);
    }
}
