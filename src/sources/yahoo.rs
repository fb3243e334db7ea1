//! Yahoo Finance chart API.
//!
//! Unofficial endpoint, no key required. Index symbols are mapped to their
//! Yahoo tickers (`SPX500` -> `^GSPC`).

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, keep_last, DataFetcher, FetchError, FetchFuture};
use crate::types::Bar;

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance chart response.
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

/// Parsed chart: bars oldest first plus the live quote if present.
#[derive(Debug)]
struct Chart {
    bars: Vec<Bar>,
    market_price: Option<f64>,
}

/// Map an internal symbol to its Yahoo ticker.
pub fn yahoo_symbol(symbol: &str) -> String {
    match symbol {
        "SPX500" | "SPX" | "SP500" => "^GSPC".to_string(),
        other => other.to_uppercase().replace('.', "-"),
    }
}

/// Smallest Yahoo range covering `days` daily bars.
fn daily_range(days: usize) -> &'static str {
    match days {
        0..=30 => "1mo",
        31..=90 => "3mo",
        91..=180 => "6mo",
        181..=365 => "1y",
        _ => "2y",
    }
}

fn weekly_range(weeks: usize) -> &'static str {
    match weeks {
        0..=26 => "6mo",
        27..=52 => "1y",
        _ => "2y",
    }
}

fn parse_chart(data: YahooChartResponse) -> Result<Chart, FetchError> {
    if let Some(error) = data.chart.error {
        return Err(FetchError::Api(format!("{} - {}", error.code, error.description)));
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::NoData("empty chart result".into()))?;

    let timestamps = result
        .timestamp
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FetchError::NoData("no timestamps in chart".into()))?;

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::NoData("no quote data in chart".into()))?;

    let opens = quote.open.unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();

    let at = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten().unwrap_or(0.0);

    let mut bars: Vec<Bar> = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = at(&closes, i);
            // Holidays and partial sessions come back as nulls.
            if close <= 0.0 {
                return None;
            }
            Some(Bar::new(
                ts * 1000,
                at(&opens, i),
                at(&highs, i),
                at(&lows, i),
                close,
                at(&volumes, i),
            ))
        })
        .collect();
    bars.sort_by_key(|b| b.time);

    Ok(Chart {
        bars,
        market_price: result.meta.regular_market_price,
    })
}

/// Yahoo Finance fetcher.
pub struct YahooFetcher {
    client: Client,
}

impl YahooFetcher {
    pub fn new(proxy: Option<&str>) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(proxy)?,
        })
    }

    async fn fetch_chart(&self, symbol: &str, interval: &str, range: &str) -> Result<Chart, FetchError> {
        let url = format!(
            "{}/{}?interval={}&range={}&includePrePost=false",
            CHART_URL,
            yahoo_symbol(symbol),
            interval,
            range
        );

        debug!("Fetching Yahoo Finance data: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let data: YahooChartResponse = response.json().await?;
        parse_chart(data)
    }
}

impl DataFetcher for YahooFetcher {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch_daily_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            let chart = self.fetch_chart(symbol, "1d", daily_range(count)).await?;
            Ok(keep_last(chart.bars, count))
        })
    }

    fn fetch_weekly_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            let chart = self.fetch_chart(symbol, "1wk", weekly_range(count)).await?;
            Ok(keep_last(chart.bars, count))
        })
    }

    fn fetch_current_price<'a>(&'a self, symbol: &'a str) -> FetchFuture<'a, f64> {
        Box::pin(async move {
            let chart = self.fetch_chart(symbol, "1d", "5d").await?;
            chart
                .market_price
                .filter(|p| *p > 0.0)
                .or_else(|| chart.bars.last().map(|b| b.close))
                .ok_or_else(|| FetchError::NoData(format!("no price for {}", symbol)))
        })
    }
}
