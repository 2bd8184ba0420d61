//! Pure technical indicator math over a close-price series.
//!
//! All functions take closes oldest-first and never panic on short input;
//! where a full lookback is unavailable they fall back to a neutral value
//! so the caller can still score (the caller decides whether the series
//! is long enough to be meaningful at all).

/// Relative Strength Index over `period` closes.
///
/// Returns 50.0 (neutral) when the series is too short to compute a
/// single full period.
#[must_use]
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }
    let window = &closes[closes.len() - period - 1..];
    let mut gains = 0.0;
    let mut losses = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }
    if losses == 0.0 {
        return 100.0;
    }
    let rs = (gains / period as f64) / (losses / period as f64);
    100.0 - 100.0 / (1.0 + rs)
}

/// Exponential moving average of the full series with the standard
/// `2 / (period + 1)` smoothing factor.
#[must_use]
pub fn ema(closes: &[f64], period: usize) -> f64 {
    match closes.first() {
        None => 0.0,
        Some(&first) => {
            let k = 2.0 / (period as f64 + 1.0);
            closes[1..]
                .iter()
                .fold(first, |acc, &close| close * k + acc * (1.0 - k))
        }
    }
}

/// MACD line, signal line and histogram (12/26/9 by convention).
///
/// The signal line is approximated as an EMA of the MACD value series
/// computed over trailing prefixes, which is stable for the short
/// intraday histories this engine works with.
#[must_use]
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> (f64, f64, f64) {
    if closes.len() < 2 {
        return (0.0, 0.0, 0.0);
    }
    let macd_series: Vec<f64> = (1..=closes.len())
        .map(|end| ema(&closes[..end], fast) - ema(&closes[..end], slow))
        .collect();
    let macd_line = *macd_series.last().unwrap_or(&0.0);
    let signal_line = ema(&macd_series, signal_period);
    (macd_line, signal_line, macd_line - signal_line)
}

/// Least-squares slope of the series, in price units per bar.
///
/// Returns 0.0 for fewer than two points.
#[must_use]
pub fn slope(closes: &[f64]) -> f64 {
    let n = closes.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y = closes.iter().sum::<f64>() / n_f;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in closes.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: f64, step: f64, len: usize) -> Vec<f64> {
        (0..len).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn rsi_of_monotonic_rise_saturates_high() {
        let closes = ramp(100.0, 1.0, 20);
        assert!((rsi(&closes, 14) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_of_monotonic_fall_saturates_low() {
        let closes = ramp(200.0, -1.0, 20);
        assert!(rsi(&closes, 14) < 1.0);
    }

    #[test]
    fn rsi_short_series_is_neutral() {
        assert!((rsi(&[100.0, 101.0], 14) - 50.0).abs() < f64::EPSILON);
        assert!((rsi(&[], 14) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_alternating_series_is_near_fifty() {
        let closes: Vec<f64> = (0..30)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let value = rsi(&closes, 14);
        assert!(value > 40.0 && value < 60.0, "rsi = {value}");
    }

    #[test]
    fn ema_of_constant_series_is_the_constant() {
        let closes = vec![250.0; 40];
        assert!((ema(&closes, 12) - 250.0).abs() < 1e-9);
    }

    #[test]
    fn macd_histogram_is_positive_in_an_uptrend() {
        let closes = ramp(100.0, 2.0, 60);
        let (line, _, histogram) = macd(&closes, 12, 26, 9);
        assert!(line > 0.0);
        assert!(histogram >= 0.0);
    }

    #[test]
    fn slope_recovers_a_linear_trend_exactly() {
        let closes = ramp(24_000.0, 12.5, 30);
        assert!((slope(&closes) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn slope_of_flat_series_is_zero() {
        assert!((slope(&[100.0; 10])).abs() < 1e-9);
        assert!((slope(&[100.0])).abs() < f64::EPSILON);
    }
}
