//! Pure time-window policy for the exchange session.
//!
//! All comparisons are against exchange-local (IST) wall-clock time; the
//! caller converts from UTC with [`ClockGate::local_time`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Asia::Kolkata;

use crate::config::SessionConfig;

/// Action categories the gate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    /// Opening new exposure. Only inside market hours, outside the
    /// open/close entry buffers, and before the square-off window.
    EnterPosition,
    /// Re-evaluating already-open positions. Always permitted so the
    /// forced close still happens even if a prior tick was missed.
    MonitorPositions,
    /// Unconditional end-of-day exit.
    SquareOff,
}

#[derive(Debug, Clone)]
pub struct ClockGate {
    open: NaiveTime,
    close: NaiveTime,
    square_off: NaiveTime,
    entry_buffer: Duration,
}

impl ClockGate {
    #[must_use]
    pub fn new(session: &SessionConfig) -> Self {
        Self {
            open: session.market_open,
            close: session.market_close,
            square_off: session.square_off,
            entry_buffer: Duration::minutes(i64::from(session.entry_buffer_mins)),
        }
    }

    /// Converts a UTC instant to exchange-local wall-clock time.
    #[must_use]
    pub fn local_time(now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&Kolkata).time()
    }

    /// The exchange-local calendar date, which defines the trading day.
    #[must_use]
    pub fn local_date(now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&Kolkata).date_naive()
    }

    /// Whether `action` is permitted at local time `now`.
    #[must_use]
    pub fn is_permitted(&self, now: NaiveTime, action: TradeAction) -> bool {
        match action {
            TradeAction::MonitorPositions => true,
            TradeAction::SquareOff => now >= self.square_off,
            TradeAction::EnterPosition => {
                if now < self.open || now >= self.close || now >= self.square_off {
                    return false;
                }
                // No entries right after the open or into the close.
                now >= self.open + self.entry_buffer && now < self.close - self.entry_buffer
            }
        }
    }

    /// True once the forced square-off window has started.
    #[must_use]
    pub fn square_off_due(&self, now: NaiveTime) -> bool {
        now >= self.square_off
    }
}
