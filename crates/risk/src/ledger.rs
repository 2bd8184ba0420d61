//! The risk ledger: atomic reserve/confirm/commit/release over the daily
//! counters, with every transition logged before it takes effect.

use chrono::NaiveDate;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nifty_algo_core::config::RiskConstraints;
use nifty_algo_core::types::{DenyReason, PositionId};

use crate::wal::{RiskWal, WalError, WalRecord};

/// Per-trading-day aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    pub trading_day: NaiveDate,
    /// Non-negative accumulator. Gains never subtract from it.
    pub realized_loss_today: Decimal,
    pub trades_today: u32,
    pub open_positions_count: u32,
    /// One-way flag: once true, stays true for the rest of the day.
    pub circuit_breaker_tripped: bool,
}

impl RiskState {
    #[must_use]
    pub fn fresh(trading_day: NaiveDate) -> Self {
        Self {
            trading_day,
            realized_loss_today: Decimal::ZERO,
            trades_today: 0,
            open_positions_count: 0,
            circuit_breaker_tripped: false,
        }
    }
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Approved,
    Denied(DenyReason),
}

/// Outcome of committing a closed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOutcome {
    /// True when this commit crossed the daily loss limit.
    pub breaker_tripped_now: bool,
}

/// Authoritative gate for every capital-committing action.
///
/// All four limit checks and the counter increments happen inside one
/// mutex-guarded critical section that also performs the WAL append, so
/// two concurrent reservations can never both take the last free slot,
/// and no transition is effective before it is durable.
pub struct RiskLedger {
    constraints: RiskConstraints,
    wal: RiskWal,
    state: Mutex<RiskState>,
}

impl std::fmt::Debug for RiskLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RiskLedger")
            .field("constraints", &self.constraints)
            .field("state", &*state)
            .finish()
    }
}

impl RiskLedger {
    /// Opens the ledger for `today`, replaying the WAL.
    ///
    /// If the log's most recent day is `today` its state is restored
    /// (including a tripped breaker); otherwise a fresh day is started
    /// and marked in the log. Pending reservations from the replay are
    /// returned through [`RiskLedger::pending_from_replay`].
    ///
    /// # Errors
    ///
    /// Fails if the WAL cannot be read or the day marker cannot be
    /// written.
    pub fn open(
        constraints: RiskConstraints,
        wal: RiskWal,
        today: NaiveDate,
    ) -> Result<(Self, Vec<(PositionId, Decimal)>), WalError> {
        let replayed = wal.replay()?;

        let (state, pending) = if replayed.day == Some(today) {
            info!(
                day = %today,
                trades = replayed.trades,
                open = replayed.open_positions,
                loss = %replayed.realized_loss,
                tripped = replayed.breaker_tripped,
                pending = replayed.pending.len(),
                "Restored risk state from WAL"
            );
            (
                RiskState {
                    trading_day: today,
                    realized_loss_today: replayed.realized_loss,
                    trades_today: replayed.trades,
                    open_positions_count: replayed.open_positions,
                    circuit_breaker_tripped: replayed.breaker_tripped,
                },
                replayed.pending,
            )
        } else {
            wal.append(&WalRecord::DayStarted { day: today })?;
            info!(day = %today, "Started new trading day");
            (RiskState::fresh(today), Vec::new())
        };

        Ok((
            Self {
                constraints,
                wal,
                state: Mutex::new(state),
            },
            pending,
        ))
    }

    /// Starts a fresh day when `today` is later than the day the ledger
    /// is tracking. Returns whether a rollover happened.
    ///
    /// The previous day's counters are archived in the log and the
    /// breaker re-arms; pending reservations cannot exist here because a
    /// long-running process confirmed or released every one before the
    /// prior session ended. A `today` at or before the tracked day is a
    /// no-op: a backwards local date means clock skew, not a new session.
    ///
    /// # Errors
    ///
    /// Fails if the WAL append fails, in which case the old day stays in
    /// force.
    pub fn roll_day(&self, today: NaiveDate) -> Result<bool, WalError> {
        let mut state = self.state.lock();
        if today <= state.trading_day {
            return Ok(false);
        }
        self.wal.append(&WalRecord::DayStarted { day: today })?;
        info!(previous = %state.trading_day, day = %today, "Rolled over to a new trading day");
        *state = RiskState::fresh(today);
        Ok(true)
    }

    /// Attempts to reserve capacity for a new trade.
    ///
    /// Checks, in order: circuit breaker, trade count, open-position
    /// count, daily loss. On approval the trade and position counters are
    /// incremented and the reservation logged; the caller must later
    /// [`confirm`](Self::confirm), [`release`](Self::release), or (after
    /// close) [`commit`](Self::commit) it.
    ///
    /// # Errors
    ///
    /// Fails only when the WAL append fails, in which case no counter
    /// changes.
    pub fn try_reserve(
        &self,
        id: PositionId,
        trade_cost: Decimal,
    ) -> Result<ReserveOutcome, WalError> {
        let mut state = self.state.lock();

        if state.circuit_breaker_tripped {
            return Ok(ReserveOutcome::Denied(DenyReason::CircuitBreakerTripped));
        }
        if state.trades_today >= self.constraints.max_trades_per_day {
            return Ok(ReserveOutcome::Denied(DenyReason::TradeLimitReached));
        }
        if state.open_positions_count >= self.constraints.max_open_positions {
            return Ok(ReserveOutcome::Denied(DenyReason::PositionLimitReached));
        }
        if state.realized_loss_today >= self.constraints.daily_loss_limit {
            return Ok(ReserveOutcome::Denied(DenyReason::DailyLossLimitReached));
        }

        // Durable before effective.
        self.wal.append(&WalRecord::Reserved { id, cost: trade_cost })?;
        state.trades_today += 1;
        state.open_positions_count += 1;

        Ok(ReserveOutcome::Approved)
    }

    /// Marks a reservation's order as confirmed filled.
    ///
    /// # Errors
    ///
    /// Fails if the WAL append fails.
    pub fn confirm(&self, id: PositionId) -> Result<(), WalError> {
        let _state = self.state.lock();
        self.wal.append(&WalRecord::Confirmed { id })
    }

    /// Rolls back a reservation whose order was never filled.
    ///
    /// Decrements both counters the reservation took; the attempt does
    /// not count as a completed trade.
    ///
    /// # Errors
    ///
    /// Fails if the WAL append fails, in which case no counter changes.
    pub fn release(&self, id: PositionId) -> Result<(), WalError> {
        let mut state = self.state.lock();
        self.wal.append(&WalRecord::Released { id })?;
        state.trades_today = state.trades_today.saturating_sub(1);
        state.open_positions_count = state.open_positions_count.saturating_sub(1);
        warn!(position_id = %id, "Released risk reservation");
        Ok(())
    }

    /// Records a closed position's realized P&L. Called exactly once per
    /// closed position.
    ///
    /// Losses accumulate; gains leave the loss counter untouched. When
    /// the accumulated loss crosses the daily limit the circuit breaker
    /// trips permanently for the day.
    ///
    /// # Errors
    ///
    /// Fails if the WAL append fails, in which case no counter changes.
    pub fn commit(&self, id: PositionId, realized_pnl: Decimal) -> Result<CommitOutcome, WalError> {
        let mut state = self.state.lock();

        self.wal.append(&WalRecord::Committed { id, pnl: realized_pnl })?;
        state.open_positions_count = state.open_positions_count.saturating_sub(1);

        if realized_pnl < Decimal::ZERO {
            state.realized_loss_today += -realized_pnl;
        }

        let mut tripped_now = false;
        if !state.circuit_breaker_tripped
            && state.realized_loss_today >= self.constraints.daily_loss_limit
        {
            self.wal.append(&WalRecord::BreakerTripped {
                realized_loss: state.realized_loss_today,
            })?;
            state.circuit_breaker_tripped = true;
            tripped_now = true;
            warn!(
                loss = %state.realized_loss_today,
                limit = %self.constraints.daily_loss_limit,
                "Daily loss limit crossed, circuit breaker tripped"
            );
        }

        Ok(CommitOutcome {
            breaker_tripped_now: tripped_now,
        })
    }

    /// Snapshot of the current day's state.
    #[must_use]
    pub fn state(&self) -> RiskState {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.state.lock().circuit_breaker_tripped
    }

    #[must_use]
    pub fn constraints(&self) -> &RiskConstraints {
        &self.constraints
    }
}

// =============================================================================
// Tests
// =============================================================================
