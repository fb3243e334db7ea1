//! Simple moving average.

use super::IndicatorError;
use crate::types::Bar;

/// Arithmetic mean of the last `period` prices.
pub fn moving_average(prices: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod);
    }
    if prices.len() < period {
        return Err(IndicatorError::InsufficientData {
            needed: period,
            available: prices.len(),
        });
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Ok(sum / period as f64)
}

/// Moving average over the closes of a bar series.
pub fn moving_average_of_closes(bars: &[Bar], period: usize) -> Result<f64, IndicatorError> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    moving_average(&closes, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_of_last_period() {
        let prices = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(moving_average(&prices, 2).unwrap(), 4.5);
        assert_eq!(moving_average(&prices, 5).unwrap(), 3.0);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert_eq!(
            moving_average(&[1.0, 2.0], 0),
            Err(IndicatorError::InvalidPeriod)
        );
    }

    #[test]
    fn test_short_series_rejected() {
        assert_eq!(
            moving_average(&[1.0, 2.0], 3),
            Err(IndicatorError::InsufficientData {
                needed: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_closes_of_bars() {
        let bars: Vec<Bar> = (1..=4).map(|i| Bar::flat(i, i as f64 * 10.0)).collect();
        assert_eq!(moving_average_of_closes(&bars, 2).unwrap(), 35.0);
    }
}
