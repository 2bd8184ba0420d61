//! Append-only write-ahead log for risk ledger transitions.
//!
//! One JSON record per line. Records are never rewritten or deleted;
//! a new trading day simply appends a `DayStarted` marker, so prior days
//! remain in the file for audit.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use nifty_algo_core::types::PositionId;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One ledger transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalRecord {
    /// First record of each trading day; resets replay state.
    DayStarted { day: NaiveDate },
    /// A reservation was approved and the counters incremented.
    Reserved { id: PositionId, cost: Decimal },
    /// The reserved order was confirmed filled; position is live.
    Confirmed { id: PositionId },
    /// A reservation was rolled back after a failed placement.
    Released { id: PositionId },
    /// A position closed with this realized P&L.
    Committed { id: PositionId, pnl: Decimal },
    /// The daily loss limit was crossed. One-way for the day.
    BreakerTripped { realized_loss: Decimal },
}

/// State reconstructed from the log for one trading day.
#[derive(Debug, Clone, Default)]
pub struct ReplayedDay {
    pub day: Option<NaiveDate>,
    pub realized_loss: Decimal,
    pub trades: u32,
    pub open_positions: u32,
    pub breaker_tripped: bool,
    /// Reservations that were neither confirmed, released, nor committed.
    /// These must be reconciled against the broker at startup.
    pub pending: Vec<(PositionId, Decimal)>,
}

#[derive(Debug, Clone)]
pub struct RiskWal {
    path: PathBuf,
}

impl RiskWal {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one record and flushes it to disk.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or written; callers must treat
    /// the transition as not having happened.
    pub fn append(&self, record: &WalRecord) -> Result<(), WalError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;

        debug!(path = %self.path.display(), ?record, "WAL append");
        Ok(())
    }

    /// Replays the log and returns the state of the most recent day.
    ///
    /// A missing file yields an empty replay. Unparseable lines are
    /// skipped with a warning rather than aborting startup.
    ///
    /// # Errors
    ///
    /// Fails only on IO errors reading an existing file.
    pub fn replay(&self) -> Result<ReplayedDay, WalError> {
        let mut day = ReplayedDay::default();
        if !self.path.exists() {
            return Ok(day);
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        // Reservation cost by id, for the pending set.
        let mut reserved: HashMap<PositionId, Decimal> = HashMap::new();
        let mut confirmed: HashMap<PositionId, Decimal> = HashMap::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: WalRecord = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!(line = lineno + 1, error = %e, "skipping unparseable WAL line");
                    continue;
                }
            };

            match record {
                WalRecord::DayStarted { day: d } => {
                    day = ReplayedDay {
                        day: Some(d),
                        ..ReplayedDay::default()
                    };
                    reserved.clear();
                    confirmed.clear();
                }
                WalRecord::Reserved { id, cost } => {
                    day.trades += 1;
                    day.open_positions += 1;
                    reserved.insert(id, cost);
                }
                WalRecord::Confirmed { id } => {
                    if let Some(cost) = reserved.remove(&id) {
                        confirmed.insert(id, cost);
                    }
                }
                WalRecord::Released { id } => {
                    day.trades = day.trades.saturating_sub(1);
                    day.open_positions = day.open_positions.saturating_sub(1);
                    reserved.remove(&id);
                }
                WalRecord::Committed { id, pnl } => {
                    day.open_positions = day.open_positions.saturating_sub(1);
                    if pnl < Decimal::ZERO {
                        day.realized_loss += -pnl;
                    }
                    reserved.remove(&id);
                    confirmed.remove(&id);
                }
                WalRecord::BreakerTripped { .. } => {
                    day.breaker_tripped = true;
                }
            }
        }

        day.pending = reserved.into_iter().collect();
        day.pending.sort_by_key(|(id, _)| *id);
        Ok(day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn temp_wal() -> (TempDir, RiskWal) {
        let dir = TempDir::new().unwrap();
        let wal = RiskWal::new(dir.path().join("wal.jsonl"));
        (dir, wal)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn replay_of_missing_file_is_empty() {
        let (_dir, wal) = temp_wal();
        let replayed = wal.replay().unwrap();
        assert!(replayed.day.is_none());
        assert_eq!(replayed.trades, 0);
        assert!(replayed.pending.is_empty());
    }

    #[test]
    fn replay_reconstructs_counters() {
        let (_dir, wal) = temp_wal();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 28) }).unwrap();
        wal.append(&WalRecord::Reserved { id: a, cost: dec!(5000) }).unwrap();
        wal.append(&WalRecord::Confirmed { id: a }).unwrap();
        wal.append(&WalRecord::Reserved { id: b, cost: dec!(4000) }).unwrap();
        wal.append(&WalRecord::Released { id: b }).unwrap();
        wal.append(&WalRecord::Committed { id: a, pnl: dec!(-1200) }).unwrap();

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.day, Some(day(2026, 8, 28)));
        assert_eq!(replayed.trades, 1);
        assert_eq!(replayed.open_positions, 0);
        assert_eq!(replayed.realized_loss, dec!(1200));
        assert!(replayed.pending.is_empty());
    }

    #[test]
    fn gains_do_not_reduce_the_loss_accumulator() {
        let (_dir, wal) = temp_wal();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 28) }).unwrap();
        wal.append(&WalRecord::Reserved { id: a, cost: dec!(5000) }).unwrap();
        wal.append(&WalRecord::Committed { id: a, pnl: dec!(-3000) }).unwrap();
        wal.append(&WalRecord::Reserved { id: b, cost: dec!(5000) }).unwrap();
        wal.append(&WalRecord::Committed { id: b, pnl: dec!(9000) }).unwrap();

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.realized_loss, dec!(3000));
    }

    #[test]
    fn unconfirmed_reservation_shows_up_as_pending() {
        let (_dir, wal) = temp_wal();
        let a = Uuid::new_v4();

        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 28) }).unwrap();
        wal.append(&WalRecord::Reserved { id: a, cost: dec!(5000) }).unwrap();

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.pending, vec![(a, dec!(5000))]);
        assert_eq!(replayed.open_positions, 1);
    }

    #[test]
    fn new_day_marker_resets_replay_state() {
        let (_dir, wal) = temp_wal();
        let a = Uuid::new_v4();

        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 27) }).unwrap();
        wal.append(&WalRecord::Reserved { id: a, cost: dec!(5000) }).unwrap();
        wal.append(&WalRecord::BreakerTripped { realized_loss: dec!(21000) }).unwrap();
        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 28) }).unwrap();

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.day, Some(day(2026, 8, 28)));
        assert_eq!(replayed.trades, 0);
        assert!(!replayed.breaker_tripped);
        assert!(replayed.pending.is_empty());
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let (_dir, wal) = temp_wal();
        wal.append(&WalRecord::DayStarted { day: day(2026, 8, 28) }).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(wal.path()).unwrap();
            writeln!(file, "not valid json {{").unwrap();
        }
        wal.append(&WalRecord::Reserved { id: Uuid::new_v4(), cost: dec!(100) }).unwrap();

        let replayed = wal.replay().unwrap();
        assert_eq!(replayed.trades, 1);
    }
}
