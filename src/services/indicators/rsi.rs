//! Relative Strength Index with Wilder smoothing.

use super::{IndicatorError, NEUTRAL_RSI};
use crate::types::Bar;

/// Wilder-smoothed RSI over the closes of `bars`.
///
/// Values range from 0-100. The first `period` deltas seed the average gain
/// and loss; every later delta is folded in with
/// `avg = (avg * (period - 1) + value) / period`.
///
/// With fewer than `period + 1` bars there is no signal and [`NEUTRAL_RSI`]
/// is returned. A zero average loss yields exactly 100.
pub fn rsi(bars: &[Bar], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod);
    }
    if bars.len() < period + 1 {
        return Ok(NEUTRAL_RSI);
    }

    let p = period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..=period {
        let change = bars[i].close - bars[i - 1].close;
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= p;
    avg_loss /= p;

    for i in (period + 1)..bars.len() {
        let change = bars[i].close - bars[i - 1].close;
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
    }

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}
