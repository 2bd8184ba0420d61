//! Market data from feed drop files.
//!
//! An external feed process writes the latest snapshot and quote book as
//! JSON; the engine only ever reads them. Staleness is carried in the
//! timestamps and judged by the consumers, not here.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use nifty_algo_core::{EngineError, MarketDataProvider, MarketSnapshot, Quote};
use tracing::debug;

pub struct FileSnapshotProvider {
    snapshot_path: PathBuf,
    quotes_path: PathBuf,
}

impl FileSnapshotProvider {
    #[must_use]
    pub fn new(snapshot_path: PathBuf, quotes_path: PathBuf) -> Self {
        Self {
            snapshot_path,
            quotes_path,
        }
    }
}

#[async_trait]
impl MarketDataProvider for FileSnapshotProvider {
    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, EngineError> {
        let raw = tokio::fs::read(&self.snapshot_path)
            .await
            .map_err(|e| EngineError::BrokerUnavailable(format!("snapshot feed: {e}")))?;
        let snapshot: MarketSnapshot = serde_json::from_slice(&raw)
            .map_err(|e| EngineError::BrokerUnavailable(format!("snapshot feed: {e}")))?;
        if snapshot.symbol != symbol {
            return Err(EngineError::BrokerUnavailable(format!(
                "snapshot feed carries {}, wanted {symbol}",
                snapshot.symbol
            )));
        }
        debug!(%symbol, timestamp = %snapshot.timestamp, "read feed snapshot");
        Ok(snapshot)
    }

    async fn leg_quote(&self, instrument: &str) -> Result<Quote, EngineError> {
        let raw = tokio::fs::read(&self.quotes_path)
            .await
            .map_err(|e| EngineError::BrokerUnavailable(format!("quote feed: {e}")))?;
        let quotes: HashMap<String, Quote> = serde_json::from_slice(&raw)
            .map_err(|e| EngineError::BrokerUnavailable(format!("quote feed: {e}")))?;
        quotes
            .get(instrument)
            .copied()
            .ok_or_else(|| EngineError::BrokerUnavailable(format!("no quote for {instrument}")))
    }
}
