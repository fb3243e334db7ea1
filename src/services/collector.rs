//! Indicator collection.
//!
//! Fetches the raw series from a [`DataFetcher`] and reduces it to a
//! [`MarketIndicators`] set. Fetch failures abort the cycle; individual
//! indicator failures degrade to documented defaults.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::services::indicators::{
    self, moving_average_of_closes, position_in_range, IndicatorError, PriceRange, MA200_PERIOD,
    MA20W_PERIOD, MA50W_PERIOD, NEUTRAL_RSI, RSI_PERIOD, WINDOW_30D, WINDOW_52W,
};
use crate::sources::{DataFetcher, FetchError};
use crate::types::{Bar, MarketIndicators, PriceSeries};

/// Daily bars requested per cycle.
pub const DAILY_BARS: usize = 300;
/// Weekly bars requested per cycle.
pub const WEEKLY_BARS: usize = 60;

pub struct Collector {
    fetcher: Arc<dyn DataFetcher>,
    symbol: String,
}

impl Collector {
    pub fn new(fetcher: Arc<dyn DataFetcher>, symbol: impl Into<String>) -> Self {
        Self {
            fetcher,
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn source_name(&self) -> &'static str {
        self.fetcher.name()
    }

    /// Fetch daily bars, weekly bars and the current price.
    pub async fn fetch_series(&self) -> Result<PriceSeries, FetchError> {
        let daily_bars = self.fetcher.fetch_daily_bars(&self.symbol, DAILY_BARS).await?;
        let weekly_bars = self.fetcher.fetch_weekly_bars(&self.symbol, WEEKLY_BARS).await?;
        let current_price = self.fetcher.fetch_current_price(&self.symbol).await?;

        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(FetchError::NoData(format!(
                "unusable price {} for {}",
                current_price, self.symbol
            )));
        }

        debug!(
            "Fetched {} daily / {} weekly bars for {} from {}, price {:.2}",
            daily_bars.len(),
            weekly_bars.len(),
            self.symbol,
            self.fetcher.name(),
            current_price
        );

        Ok(PriceSeries {
            symbol: self.symbol.clone(),
            daily_bars,
            weekly_bars,
            current_price,
            fetched_at: Utc::now().timestamp_millis(),
        })
    }

    /// Fetch and compute the full indicator set.
    pub async fn collect(&self) -> Result<MarketIndicators, FetchError> {
        let series = self.fetch_series().await?;
        Ok(compute_indicators(&series))
    }
}

fn or_fallback(name: &str, result: Result<f64, IndicatorError>, fallback: f64) -> f64 {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!("{} unavailable ({}), using {:.2}", name, e, fallback);
            fallback
        }
    }
}

fn range_or_price(name: &str, bars: &[Bar], window: usize, price: f64) -> PriceRange {
    indicators::range(bars, window).unwrap_or_else(|e| {
        warn!("{} range unavailable ({}), using current price", name, e);
        PriceRange {
            high: price,
            low: price,
        }
    })
}

/// Reduce a price series to indicators. Never fails: moving averages fall
/// back to the current price, RSI to neutral, ranges to the current price
/// and the 52-week position to the middle.
pub fn compute_indicators(series: &PriceSeries) -> MarketIndicators {
    let price = series.current_price;
    let daily = &series.daily_bars;
    let weekly = &series.weekly_bars;

    let ma200 = or_fallback("MA200", moving_average_of_closes(daily, MA200_PERIOD), price);
    let ma20w = or_fallback("MA20w", moving_average_of_closes(weekly, MA20W_PERIOD), price);
    let ma50w = or_fallback("MA50w", moving_average_of_closes(weekly, MA50W_PERIOD), price);

    let weekly_rsi = or_fallback("Weekly RSI", indicators::rsi(weekly, RSI_PERIOD), NEUTRAL_RSI);
    let daily_rsi = or_fallback("Daily RSI", indicators::rsi(daily, RSI_PERIOD), NEUTRAL_RSI);

    let r52 = range_or_price("52-week", daily, WINDOW_52W, price);
    let r30 = range_or_price("30-day", daily, WINDOW_30D, price);

    let position_52w = or_fallback(
        "52-week position",
        position_in_range(price, r52.high, r52.low),
        0.5,
    );

    MarketIndicators {
        current_price: price,
        ma200,
        ma20w,
        ma50w,
        weekly_rsi,
        daily_rsi,
        high_52w: r52.high,
        low_52w: r52.low,
        high_30d: r30.high,
        low_30d: r30.low,
        position_52w,
    }
}
