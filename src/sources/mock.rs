//! Deterministic fetcher for development and tests.

use chrono::{Duration, Utc};

use super::{DataFetcher, FetchError, FetchFuture};
use crate::types::Bar;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Serves fixed bars when given, otherwise bars drifting 0.1% per bar
/// around `price`.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    price: f64,
    daily: Option<Vec<Bar>>,
    weekly: Option<Vec<Bar>>,
    fail: bool,
}

impl MockFetcher {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            ..Self::default()
        }
    }

    pub fn with_daily(mut self, bars: Vec<Bar>) -> Self {
        self.daily = Some(bars);
        self
    }

    pub fn with_weekly(mut self, bars: Vec<Bar>) -> Self {
        self.weekly = Some(bars);
        self
    }

    /// Every call fails with a data-unavailable error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), FetchError> {
        if self.fail {
            return Err(FetchError::NoData("mock source configured to fail".into()));
        }
        Ok(())
    }
}

/// `count` bars, one per `step_ms`, ending now.
pub fn generate_bars(base_price: f64, count: usize, step_ms: i64) -> Vec<Bar> {
    let now = Utc::now().timestamp_millis();
    let half = (count / 2) as f64;
    (0..count)
        .map(|i| {
            let p = base_price * (1.0 + (i as f64 - half) * 0.001);
            let time = now - (count - i) as i64 * step_ms;
            Bar::new(time, p * 0.999, p * 1.005, p * 0.995, p, 1_000_000.0)
        })
        .collect()
}

impl DataFetcher for MockFetcher {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn fetch_daily_bars<'a>(&'a self, _symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            self.check()?;
            Ok(match &self.daily {
                Some(bars) => bars.clone(),
                None => generate_bars(self.price, count, DAY_MS),
            })
        })
    }

    fn fetch_weekly_bars<'a>(&'a self, _symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            self.check()?;
            Ok(match &self.weekly {
                Some(bars) => bars.clone(),
                None => generate_bars(self.price, count, Duration::weeks(1).num_milliseconds()),
            })
        })
    }

    fn fetch_current_price<'a>(&'a self, _symbol: &'a str) -> FetchFuture<'a, f64> {
        Box::pin(async move {
            self.check()?;
            Ok(self.price)
        })
    }
}
