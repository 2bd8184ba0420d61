//! Options-greeks sub-scorer: IV regime and greek exposure fit.

use nifty_algo_core::{IncompleteData, MarketSnapshot, StrategyKind};

use crate::scorer::{Scorer, SubScore};

#[derive(Debug, Default)]
pub struct GreeksScorer;

impl Scorer for GreeksScorer {
    fn name(&self) -> &'static str {
        "greeks"
    }

    fn score(
        &self,
        snapshot: &MarketSnapshot,
        strategy: StrategyKind,
    ) -> Result<SubScore, IncompleteData> {
        let greeks = snapshot.greeks.ok_or(IncompleteData { field: "greeks" })?;
        let iv_percentile = snapshot
            .iv_percentile
            .ok_or(IncompleteData {
                field: "iv_percentile",
            })?
            .clamp(0.0, 100.0);

        let delta_neutrality = (1.0 - greeks.delta.abs().min(1.0)) * 100.0;
        let theta_capture = if greeks.theta > 0.0 { 100.0 } else { 0.0 };

        let score = match strategy {
            // Selling premium: rich IV and a position that collects theta
            // near delta-neutral.
            StrategyKind::IronCondor | StrategyKind::ShortStrangle => {
                0.5 * iv_percentile + 0.3 * theta_capture + 0.2 * delta_neutrality
            }
            // Calendars want a mid-range IV regime: cheap enough to own
            // the back month, rich enough to sell the front.
            StrategyKind::CalendarSpread => {
                let mid_iv_fit = 100.0 - (iv_percentile - 50.0).abs() * 2.0;
                0.6 * mid_iv_fit + 0.4 * delta_neutrality
            }
            // Buying premium: cheap IV and meaningful delta exposure.
            StrategyKind::AtmDirectional => {
                let cheap_iv = 100.0 - iv_percentile;
                let delta_exposure = greeks.delta.abs().min(1.0) * 100.0;
                0.6 * cheap_iv + 0.4 * delta_exposure
            }
        };

        Ok(SubScore::new(self.name(), score).with_reason(format!(
            "iv_pctile={iv_percentile:.0} delta={:.2} theta={:.2}",
            greeks.delta, greeks.theta
        )))
    }
}
