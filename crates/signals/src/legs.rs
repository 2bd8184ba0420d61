//! Concrete leg construction for each strategy.
//!
//! Strikes are anchored on the ATM strike (spot rounded to the nearest
//! 100) and expiries on the weekly Thursday cycle.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use nifty_algo_core::{LegSide, OptionLeg, StrategyKind};
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    fn suffix(self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

/// Nearest-100 strike for the given spot.
#[must_use]
pub fn atm_strike(spot: Decimal) -> Decimal {
    let hundred = Decimal::new(100, 0);
    (spot / hundred).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * hundred
}

/// The weekly Thursday expiry on or after `today`.
#[must_use]
pub fn next_weekly_expiry(today: NaiveDate) -> NaiveDate {
    let offset = (Weekday::Thu.num_days_from_monday() + 7
        - today.weekday().num_days_from_monday())
        % 7;
    today + Duration::days(i64::from(offset))
}

fn leg(
    symbol: &str,
    side: LegSide,
    kind: OptionKind,
    strike: Decimal,
    expiry: NaiveDate,
) -> OptionLeg {
    let instrument = format!(
        "{symbol}{}{}{}",
        expiry.format("%y%b").to_string().to_uppercase(),
        strike.normalize(),
        kind.suffix()
    );
    OptionLeg {
        instrument,
        side,
        strike,
        expiry,
    }
}

/// The ordered legs a strategy implies at the current spot.
///
/// Sell legs come first so that hedging buys are placed against known
/// short exposure when the order is worked leg by leg.
#[must_use]
pub fn build_legs(
    symbol: &str,
    strategy: StrategyKind,
    spot: Decimal,
    today: NaiveDate,
) -> Vec<OptionLeg> {
    let atm = atm_strike(spot);
    let near = next_weekly_expiry(today);
    let step = Decimal::new(100, 0);

    match strategy {
        StrategyKind::IronCondor => vec![
            leg(symbol, LegSide::Sell, OptionKind::Call, atm + step, near),
            leg(symbol, LegSide::Sell, OptionKind::Put, atm - step, near),
            leg(
                symbol,
                LegSide::Buy,
                OptionKind::Call,
                atm + step * Decimal::new(3, 0),
                near,
            ),
            leg(
                symbol,
                LegSide::Buy,
                OptionKind::Put,
                atm - step * Decimal::new(3, 0),
                near,
            ),
        ],
        StrategyKind::ShortStrangle => vec![
            leg(
                symbol,
                LegSide::Sell,
                OptionKind::Call,
                atm + step * Decimal::new(2, 0),
                near,
            ),
            leg(
                symbol,
                LegSide::Sell,
                OptionKind::Put,
                atm - step * Decimal::new(2, 0),
                near,
            ),
        ],
        StrategyKind::CalendarSpread => {
            let far = next_weekly_expiry(near + Duration::days(1));
            vec![
                leg(symbol, LegSide::Sell, OptionKind::Call, atm, near),
                leg(symbol, LegSide::Buy, OptionKind::Call, atm, far),
            ]
        }
        StrategyKind::AtmDirectional => {
            vec![leg(symbol, LegSide::Buy, OptionKind::Call, atm, near)]
        }
    }
}
