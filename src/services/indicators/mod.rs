//! Technical indicator functions.
//!
//! Pure reductions over a bar series. Input errors (bad period, empty series,
//! inverted range) are rejected with [`IndicatorError`]; insufficient history
//! for RSI is not an error and yields the neutral value instead.

pub mod ma;
pub mod range;
pub mod rsi;

pub use ma::{moving_average, moving_average_of_closes};
pub use range::{position_in_range, range, PriceRange};
pub use rsi::rsi;

use thiserror::Error;

/// Look-back period for both RSI series.
pub const RSI_PERIOD: usize = 14;
/// RSI returned when the series is too short to compute one.
pub const NEUTRAL_RSI: f64 = 50.0;
/// Trading days in a 52-week window.
pub const WINDOW_52W: usize = 252;
/// Trading days in a 30-day window.
pub const WINDOW_30D: usize = 22;
/// Daily bars behind the long moving average.
pub const MA200_PERIOD: usize = 200;
pub const MA20W_PERIOD: usize = 20;
pub const MA50W_PERIOD: usize = 50;

/// Indicator input errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("Period must be positive")]
    InvalidPeriod,

    #[error("Not enough data: need {needed} values, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Empty price series")]
    EmptySeries,

    #[error("Invalid range: high {high} is below low {low}")]
    InvertedRange { high: f64, low: f64 },
}
