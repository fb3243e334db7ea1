use serde::{Deserialize, Serialize};

/// One OHLCV candlestick for a fixed period (day or week).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Bar open time in unix milliseconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a bar.
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A flat bar where every price equals `close`.
    pub fn flat(time: i64, close: f64) -> Self {
        Self::new(time, close, close, close, close, 0.0)
    }
}

/// Extract the closing prices of a bar series, oldest first.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Everything the scoring model reads, computed fresh every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndicators {
    pub current_price: f64,
    /// 200-day simple moving average.
    pub ma200: f64,
    /// 20-week simple moving average.
    pub ma20w: f64,
    /// 50-week simple moving average.
    pub ma50w: f64,
    pub weekly_rsi: f64,
    pub daily_rsi: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub high_30d: f64,
    pub low_30d: f64,
    /// Position of the price inside the 52-week range, 0.0 to 1.0.
    pub position_52w: f64,
}

impl MarketIndicators {
    /// Percentage deviation of the price from MA200, if MA200 is usable.
    pub fn ma200_deviation_pct(&self) -> Option<f64> {
        if self.ma200 == 0.0 {
            return None;
        }
        Some((self.current_price - self.ma200) / self.ma200 * 100.0)
    }
}

/// Raw price history for one instrument as handed over by a data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSeries {
    pub symbol: String,
    pub daily_bars: Vec<Bar>,
    pub weekly_bars: Vec<Bar>,
    pub current_price: f64,
    /// Fetch time in unix milliseconds.
    pub fetched_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closes_preserves_order() {
        let bars = vec![Bar::flat(1, 10.0), Bar::flat(2, 11.0), Bar::flat(3, 9.5)];
        assert_eq!(closes(&bars), vec![10.0, 11.0, 9.5]);
    }

    #[test]
    fn test_ma200_deviation() {
        let ind = MarketIndicators {
            current_price: 110.0,
            ma200: 100.0,
            ..Default::default()
        };
        let dev = ind.ma200_deviation_pct().unwrap();
        assert!((dev - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ma200_deviation_unavailable_when_zero() {
        let ind = MarketIndicators {
            current_price: 110.0,
            ma200: 0.0,
            ..Default::default()
        };
        assert!(ind.ma200_deviation_pct().is_none());
    }

    #[test]
    fn test_bar_serialization() {
        let bar = Bar::new(1_700_000_000_000, 1.0, 2.0, 0.5, 1.5, 100.0);
        let json = serde_json::to_string(&bar).unwrap();
        assert!(json.contains("\"time\":1700000000000"));
        let back: Bar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bar);
    }
}
