use thiserror::Error;

use crate::types::PositionId;

/// Faults the engine can surface.
///
/// Expected decision outcomes (risk denial, incomplete data) are not
/// errors; they are modelled as enum outcomes and notification events.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Entry order could not be placed within the retry bound.
    #[error("order placement failed after {attempts} attempts: {reason}")]
    OrderPlacementFailed { attempts: u32, reason: String },

    /// Broker never confirmed the order within the timeout.
    #[error("order confirmation timed out after {timeout_secs}s")]
    OrderConfirmationTimeout { timeout_secs: u64 },

    /// A closing order failed. The position reverts to open and the
    /// failure escalates; under a forced-close deadline this must never
    /// be masked.
    #[error("exit failed for position {position_id}: {reason}")]
    ExitFailed {
        position_id: PositionId,
        reason: String,
    },

    /// Durable logging is unavailable; no risk-affecting decision is
    /// final until logged, so mutation paths stop here.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// The broker gateway could not be reached at all.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// A leg quote is too old (or timestamped in the future) to price a
    /// trade against.
    #[error("stale quote for {instrument}: {age_secs}s old")]
    StaleQuote { instrument: String, age_secs: i64 },
}
