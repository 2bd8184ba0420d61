//! Composite signal evaluation.

use chrono::{DateTime, Utc};
use nifty_algo_core::{
    IncompleteData, MarketSnapshot, OptionLeg, SignalConfig, StrategyKind,
};
use thiserror::Error;
use tracing::debug;

use crate::greeks::GreeksScorer;
use crate::legs::build_legs;
use crate::liquidity::LiquidityScorer;
use crate::scorer::Scorer;
use crate::sentiment::SentimentScorer;
use crate::technical::TechnicalScorer;

const WEIGHT_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum SignalEngineError {
    #[error("scorer weights sum to {sum}, expected 1.0")]
    WeightSum { sum: f64 },
    #[error("strategy priority list is empty")]
    EmptyPriority,
}

/// One sub-scorer's contribution to the composite.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScore {
    pub name: &'static str,
    pub score: f64,
    pub weight: f64,
}

/// A scored trade candidate. Immutable once created; consumed exactly
/// once by the execution path or discarded.
#[derive(Debug, Clone)]
pub struct Signal {
    pub symbol: String,
    pub strategy: StrategyKind,
    pub component_scores: Vec<ComponentScore>,
    pub composite_score: f64,
    pub proposed_legs: Vec<OptionLeg>,
    pub reasons: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Outcome of one evaluation tick.
#[derive(Debug)]
pub enum Evaluation {
    /// Best candidate cleared the threshold.
    Emit(Signal),
    /// Every candidate scored below the threshold.
    BelowThreshold {
        best_strategy: StrategyKind,
        best_score: f64,
    },
    /// A required snapshot field was missing or the snapshot was stale.
    /// Scoring on defaults is never an option.
    Incomplete(IncompleteData),
}

pub struct SignalEngine {
    config: SignalConfig,
    scorers: Vec<(Box<dyn Scorer>, f64)>,
}

impl std::fmt::Debug for SignalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalEngine")
            .field("config", &self.config)
            .field("scorers", &self.scorers.len())
            .finish()
    }
}

impl SignalEngine {
    /// Engine with the standard four scorers weighted per configuration.
    pub fn new(config: SignalConfig) -> Result<Self, SignalEngineError> {
        let weights = config.weights;
        let scorers: Vec<(Box<dyn Scorer>, f64)> = vec![
            (Box::new(TechnicalScorer), weights.technical),
            (Box::new(GreeksScorer), weights.greeks),
            (Box::new(SentimentScorer), weights.sentiment),
            (Box::new(LiquidityScorer), weights.liquidity),
        ];
        Self::with_scorers(config, scorers)
    }

    /// Engine with caller-supplied scorers. New sub-signals plug in here
    /// without touching the aggregation logic.
    pub fn with_scorers(
        config: SignalConfig,
        scorers: Vec<(Box<dyn Scorer>, f64)>,
    ) -> Result<Self, SignalEngineError> {
        let sum: f64 = scorers.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(SignalEngineError::WeightSum { sum });
        }
        if config.strategy_priority.is_empty() {
            return Err(SignalEngineError::EmptyPriority);
        }
        Ok(Self { config, scorers })
    }

    /// Score every candidate strategy against the snapshot and return the
    /// single best, provided it clears the threshold.
    ///
    /// Deterministic: identical snapshot and configuration always produce
    /// the identical outcome. Equal composites resolve to the earlier
    /// entry in the configured priority order.
    pub fn evaluate(&self, snapshot: &MarketSnapshot, now: DateTime<Utc>) -> Evaluation {
        let age = snapshot.age_secs(now);
        if age < 0 || age as u64 > self.config.max_snapshot_age_secs {
            return Evaluation::Incomplete(IncompleteData {
                field: "snapshot_age",
            });
        }

        let mut best: Option<(StrategyKind, f64, Vec<ComponentScore>, Vec<String>)> = None;
        for &strategy in &self.config.strategy_priority {
            let mut components = Vec::with_capacity(self.scorers.len());
            let mut reasons = Vec::new();
            let mut composite = 0.0;
            for (scorer, weight) in &self.scorers {
                match scorer.score(snapshot, strategy) {
                    Ok(sub) => {
                        composite += weight * sub.score;
                        components.push(ComponentScore {
                            name: sub.name,
                            score: sub.score,
                            weight: *weight,
                        });
                        reasons.extend(sub.reasons);
                    }
                    Err(missing) => return Evaluation::Incomplete(missing),
                }
            }
            let composite = composite.clamp(0.0, 100.0);
            debug!(%strategy, composite, "scored candidate");
            // Strict comparison keeps the earlier priority entry on ties.
            if best.as_ref().map_or(true, |(_, score, _, _)| composite > *score) {
                best = Some((strategy, composite, components, reasons));
            }
        }

        match best {
            Some((strategy, composite, components, reasons))
                if composite >= self.config.min_composite_score =>
            {
                Evaluation::Emit(Signal {
                    symbol: snapshot.symbol.clone(),
                    strategy,
                    component_scores: components,
                    composite_score: composite,
                    proposed_legs: build_legs(
                        &snapshot.symbol,
                        strategy,
                        snapshot.spot,
                        now.date_naive(),
                    ),
                    reasons,
                    generated_at: now,
                })
            }
            Some((strategy, composite, _, _)) => Evaluation::BelowThreshold {
                best_strategy: strategy,
                best_score: composite,
            },
            // Constructor rejects an empty priority list.
            None => Evaluation::Incomplete(IncompleteData {
                field: "strategy_priority",
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}
