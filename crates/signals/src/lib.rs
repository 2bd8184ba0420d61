//! Signal scoring pipeline.
//!
//! Four pluggable sub-scorers (technical, greeks, sentiment, liquidity)
//! each grade a market snapshot for a candidate strategy. The engine
//! aggregates them into a weighted composite, picks the best-scoring
//! strategy for the tick, and emits a [`Signal`] only when the composite
//! clears the configured threshold.

pub mod engine;
pub mod indicators;
pub mod legs;
pub mod scorer;

mod greeks;
mod liquidity;
mod sentiment;
mod technical;

pub use engine::{ComponentScore, Evaluation, Signal, SignalEngine, SignalEngineError};
pub use greeks::GreeksScorer;
pub use legs::{atm_strike, build_legs, next_weekly_expiry};
pub use liquidity::LiquidityScorer;
pub use scorer::{Scorer, SubScore};
pub use sentiment::SentimentScorer;
pub use technical::TechnicalScorer;
