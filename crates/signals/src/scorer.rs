//! The pluggable sub-scorer capability.

use nifty_algo_core::{IncompleteData, MarketSnapshot, StrategyKind};

/// One sub-signal's contribution to a strategy's composite score.
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    /// Scorer name, stable across runs (used as the component key).
    pub name: &'static str,
    /// Bounded to [0, 100].
    pub score: f64,
    /// Human-readable scoring rationale for the notification stream.
    pub reasons: Vec<String>,
}

impl SubScore {
    #[must_use]
    pub fn new(name: &'static str, score: f64) -> Self {
        Self {
            name,
            score: score.clamp(0.0, 100.0),
            reasons: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reasons.push(reason.into());
        self
    }
}

/// A pure grading function over a market snapshot.
///
/// Implementations must not fabricate values for absent snapshot fields:
/// a missing required input is an [`IncompleteData`] outcome, never a
/// default score.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Grade `snapshot` for `strategy`, returning a score in [0, 100].
    fn score(
        &self,
        snapshot: &MarketSnapshot,
        strategy: StrategyKind,
    ) -> Result<SubScore, IncompleteData>;
}
