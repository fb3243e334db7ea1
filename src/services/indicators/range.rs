//! High/low ranges and position within a range.

use super::IndicatorError;
use crate::types::Bar;

/// Highest high and lowest low over a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub high: f64,
    pub low: f64,
}

/// Max high and min low over the last `window` bars, or over the whole
/// series when it is shorter than the window.
pub fn range(bars: &[Bar], window: usize) -> Result<PriceRange, IndicatorError> {
    if bars.is_empty() {
        return Err(IndicatorError::EmptySeries);
    }

    let start = bars.len().saturating_sub(window);
    let tail = &bars[start..];

    let high = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    Ok(PriceRange { high, low })
}

/// Where `price` sits between `low` and `high`, clamped to [0, 1].
/// A flat range (high == low) gives 0.5.
pub fn position_in_range(price: f64, high: f64, low: f64) -> Result<f64, IndicatorError> {
    if high == low {
        return Ok(0.5);
    }
    if high < low {
        return Err(IndicatorError::InvertedRange { high, low });
    }

    Ok(((price - low) / (high - low)).clamp(0.0, 1.0))
}
