//! The authoritative in-memory position book, snapshotted to a JSON file
//! after every mutation so positions survive restarts.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use nifty_algo_core::types::{ExitReason, PositionId};

use crate::position::{Position, PositionStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("position {0} not found")]
    NotFound(PositionId),

    #[error("invalid status transition {from} -> {to} for position {id}")]
    InvalidTransition {
        id: PositionId,
        from: PositionStatus,
        to: PositionStatus,
    },

    /// The snapshot could not be written. Fatal for mutation paths: a
    /// position change that is not durable is not a change.
    #[error("persistence unavailable: {0}")]
    Persistence(String),
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedBook {
    positions: Vec<Position>,
    saved_at: DateTime<Utc>,
}

pub struct PositionStore {
    inner: RwLock<HashMap<PositionId, Position>>,
    path: PathBuf,
}

impl PositionStore {
    /// Opens the store, loading any persisted book.
    ///
    /// A missing or corrupt snapshot file starts an empty book with a
    /// warning rather than refusing to start.
    #[must_use]
    pub fn open(path: PathBuf) -> Self {
        let positions = if path.exists() {
            match Self::load_book(&path) {
                Ok(book) => {
                    info!(
                        path = %path.display(),
                        count = book.positions.len(),
                        "Loaded persisted position book"
                    );
                    book.positions.into_iter().map(|p| (p.id, p)).collect()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt position book, starting empty");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self {
            inner: RwLock::new(positions),
            path,
        }
    }

    fn load_book(path: &PathBuf) -> Result<PersistedBook, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| e.to_string())
    }

    /// Writes the current book to disk. Caller must hold the write lock.
    fn persist(&self, positions: &HashMap<PositionId, Position>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Persistence(e.to_string()))?;
            }
        }
        let book = PersistedBook {
            positions: positions.values().cloned().collect(),
            saved_at: Utc::now(),
        };
        let file =
            File::create(&self.path).map_err(|e| StoreError::Persistence(e.to_string()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &book)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;
        debug!(path = %self.path.display(), count = book.positions.len(), "Persisted position book");
        Ok(())
    }

    /// Registers a freshly opened position.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot cannot be written; the position is not
    /// registered in that case.
    pub fn insert_open(&self, position: Position) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let mut next = inner.clone();
        next.insert(position.id, position);
        self.persist(&next)?;
        *inner = next;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: PositionId) -> Option<Position> {
        self.inner.read().get(&id).cloned()
    }

    /// All positions currently open (eligible for monitoring).
    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        let mut open: Vec<Position> = self
            .inner
            .read()
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect();
        open.sort_by_key(|p| p.entry_time);
        open
    }

    /// Count of positions holding a risk slot.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner.read().values().filter(|p| p.status.is_live()).count()
    }

    /// Claims a position for closing (Open -> Closing).
    ///
    /// Acts as the per-position writer lock: a position already Closing
    /// (or terminal) cannot be claimed again, so two monitoring ticks
    /// can never drive the same exit twice.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the position is not Open, `NotFound` if
    /// unknown, `Persistence` if the snapshot write fails.
    pub fn begin_close(&self, id: PositionId) -> Result<Position, StoreError> {
        self.transition(id, PositionStatus::Closing, |_| {})
    }

    /// Completes a close (Closing -> Closed) and freezes the record.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`begin_close`](Self::begin_close).
    pub fn complete_close(
        &self,
        id: PositionId,
        exit_price: Decimal,
        realized_pnl: Decimal,
        reason: ExitReason,
        exit_time: DateTime<Utc>,
    ) -> Result<Position, StoreError> {
        self.transition(id, PositionStatus::Closed, |p| {
            p.exit_price = Some(exit_price);
            p.realized_pnl = Some(realized_pnl);
            p.exit_reason = Some(reason);
            p.exit_time = Some(exit_time);
        })
    }

    /// Reverts a failed close (Closing -> Open).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`begin_close`](Self::begin_close).
    pub fn abort_close(&self, id: PositionId) -> Result<Position, StoreError> {
        self.transition(id, PositionStatus::Open, |_| {})
    }

    fn transition(
        &self,
        id: PositionId,
        to: PositionStatus,
        apply: impl FnOnce(&mut Position),
    ) -> Result<Position, StoreError> {
        let mut inner = self.inner.write();
        let current = inner.get(&id).ok_or(StoreError::NotFound(id))?;
        if !current.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let mut next = inner.clone();
        let Some(position) = next.get_mut(&id) else {
            return Err(StoreError::NotFound(id));
        };
        position.status = to;
        apply(position);
        let updated = position.clone();

        self.persist(&next)?;
        *inner = next;
        Ok(updated)
    }
}

// =============================================================================
// Tests
// =============================================================================
