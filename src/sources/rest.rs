//! Bar-vendor REST source.
//!
//! Endpoints under `{base}/api/v1`: `bars/daily`, `bars/weekly` and `quote`,
//! all keyed by `symbol`. Sources that only serve daily bars are handled by
//! aggregating daily bars into ISO weeks.

use chrono::{DateTime, Datelike};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{http_client, DataFetcher, FetchError, FetchFuture};
use crate::types::Bar;

#[derive(Debug, Deserialize)]
struct RestBar {
    /// Unix seconds.
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl From<RestBar> for Bar {
    fn from(b: RestBar) -> Self {
        Bar::new(b.timestamp * 1000, b.open, b.high, b.low, b.close, b.volume)
    }
}

#[derive(Debug, Deserialize)]
struct RestQuote {
    price: f64,
}

pub struct RestFetcher {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl RestFetcher {
    pub fn new(base_url: String, api_key: Option<String>, proxy: Option<&str>) -> Result<Self, FetchError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: http_client(proxy)?,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = format!("{}/api/v1/{}", self.base_url, path);
        debug!("Fetching {}", url);
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn fetch_bars(&self, kind: &str, symbol: &str, limit: usize) -> Result<Vec<Bar>, FetchError> {
        let limit = limit.to_string();
        let response = self
            .get(&format!("bars/{}", kind))
            .query(&[("symbol", symbol), ("limit", limit.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let raw: Vec<RestBar> = response.json().await?;
        let mut bars: Vec<Bar> = raw.into_iter().map(Bar::from).collect();
        bars.sort_by_key(|b| b.time);
        Ok(bars)
    }
}

/// Fold daily bars (oldest first) into ISO-week bars.
pub fn aggregate_weekly(daily: &[Bar]) -> Vec<Bar> {
    let mut weeks: Vec<(u32, i32, Bar)> = Vec::new();

    for bar in daily {
        let Some(dt) = DateTime::from_timestamp_millis(bar.time) else {
            continue;
        };
        let iso = dt.iso_week();
        let key = (iso.week(), iso.year());

        match weeks.last_mut() {
            Some((week, year, agg)) if (*week, *year) == key => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            }
            _ => weeks.push((key.0, key.1, *bar)),
        }
    }

    weeks.into_iter().map(|(_, _, bar)| bar).collect()
}

impl DataFetcher for RestFetcher {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn fetch_daily_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(self.fetch_bars("daily", symbol, count))
    }

    fn fetch_weekly_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            match self.fetch_bars("weekly", symbol, count).await {
                Ok(bars) => Ok(bars),
                Err(e) => {
                    warn!("Weekly bars unavailable ({}), aggregating daily bars", e);
                    let daily = self.fetch_bars("daily", symbol, count * 7).await?;
                    Ok(aggregate_weekly(&daily))
                }
            }
        })
    }

    fn fetch_current_price<'a>(&'a self, symbol: &'a str) -> FetchFuture<'a, f64> {
        Box::pin(async move {
            let response = self.get("quote").query(&[("symbol", symbol)]).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status().as_u16()));
            }
            let quote: RestQuote = response.json().await?;
            Ok(quote.price)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32, close: f64) -> Bar {
        let t = Utc.with_ymd_and_hms(y, m, d, 14, 30, 0).unwrap().timestamp_millis();
        Bar::new(t, close - 1.0, close + 2.0, close - 2.0, close, 10.0)
    }

    #[test]
    fn test_aggregate_weekly() {
        // Mon 2024-01-01 .. Fri 2024-01-05, then Mon 2024-01-08 .. Tue 2024-01-09.
        let daily = vec![
            day(2024, 1, 1, 100.0),
            day(2024, 1, 2, 104.0),
            day(2024, 1, 3, 98.0),
            day(2024, 1, 5, 101.0),
            day(2024, 1, 8, 110.0),
            day(2024, 1, 9, 111.0),
        ];
        let weekly = aggregate_weekly(&daily);
        assert_eq!(weekly.len(), 2);

        let w1 = weekly[0];
        assert_eq!(w1.time, daily[0].time);
        assert_eq!(w1.open, 99.0);
        assert_eq!(w1.high, 106.0);
        assert_eq!(w1.low, 96.0);
        assert_eq!(w1.close, 101.0);
        assert_eq!(w1.volume, 40.0);

        assert_eq!(weekly[1].close, 111.0);
    }

    #[test]
    fn test_aggregate_across_year_boundary() {
        // 2024-12-30 (Mon) and 2025-01-02 (Thu) share ISO week 1 of 2025.
        let daily = vec![day(2024, 12, 30, 100.0), day(2025, 1, 2, 105.0)];
        assert_eq!(aggregate_weekly(&daily).len(), 1);
    }

    #[test]
    fn test_rest_bar_conversion() {
        let raw: Vec<RestBar> = serde_json::from_str(
            r#"[{"timestamp":1700000000,"open":1,"high":2,"low":0.5,"close":1.5}]"#,
        )
        .unwrap();
        let bar: Bar = raw.into_iter().next().unwrap().into();
        assert_eq!(bar.time, 1_700_000_000_000);
        assert_eq!(bar.volume, 0.0);
    }

    #[test]
    fn test_base_url_trimmed() {
        let f = RestFetcher::new("http://localhost:9000/".into(), Some(String::new()), None).unwrap();
        assert_eq!(f.base_url, "http://localhost:9000");
        assert!(f.api_key.is_none());
    }
}
