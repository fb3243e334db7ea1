//! Market data sources.

pub mod mock;
pub mod rest;
pub mod yahoo;

pub use mock::MockFetcher;
pub use rest::RestFetcher;
pub use yahoo::YahooFetcher;

use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, DataSourceKind};
use crate::types::Bar;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Data-unavailable errors. Any of these aborts the current cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream API error: {0}")]
    Api(String),

    #[error("no data: {0}")]
    NoData(String),
}

pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// A source of bars and quotes for one instrument.
pub trait DataFetcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Up to `count` daily bars, oldest first.
    fn fetch_daily_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>>;

    /// Up to `count` weekly bars, oldest first.
    fn fetch_weekly_bars<'a>(&'a self, symbol: &'a str, count: usize) -> FetchFuture<'a, Vec<Bar>>;

    fn fetch_current_price<'a>(&'a self, symbol: &'a str) -> FetchFuture<'a, f64>;
}

/// HTTP client shared by the network fetchers.
pub(crate) fn http_client(proxy: Option<&str>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT);
    if let Some(url) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(url)?);
    }
    Ok(builder.build()?)
}

/// Keep the newest `count` bars.
pub(crate) fn keep_last(mut bars: Vec<Bar>, count: usize) -> Vec<Bar> {
    if bars.len() > count {
        bars.drain(..bars.len() - count);
    }
    bars
}

/// Build the fetcher selected by configuration.
pub fn build_fetcher(config: &Config) -> Result<Arc<dyn DataFetcher>, FetchError> {
    let proxy = config.https_proxy.as_deref();
    let fetcher: Arc<dyn DataFetcher> = match config.data_source {
        DataSourceKind::Yahoo => Arc::new(YahooFetcher::new(proxy)?),
        DataSourceKind::Rest => {
            let base_url = config
                .data_source_base_url
                .clone()
                .ok_or_else(|| FetchError::Api("DATA_SOURCE_BASE_URL is not set".into()))?;
            Arc::new(RestFetcher::new(
                base_url,
                config.data_source_api_key.clone(),
                proxy,
            )?)
        }
        DataSourceKind::Mock => Arc::new(MockFetcher::new(config.mock_price)),
    };
    Ok(fetcher)
}
