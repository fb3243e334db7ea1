//! Factor scorers.
//!
//! Each scorer is a step function over one metric. Ladders are ordered
//! `(upper_bound, score)` pairs; the first bound the metric does not exceed
//! wins. A NaN metric scores 0 and is reported as unavailable.

use crate::types::{FactorScore, MarketIndicators};

pub const MA200_DEVIATION: &str = "MA200 deviation";
pub const WEEKLY_RSI: &str = "Weekly RSI";
pub const DAILY_RSI: &str = "Daily RSI";
pub const POSITION_52W: &str = "52-week position";
pub const TREND_TRACKER: &str = "Trend tracker";

pub const MA200_WEIGHT: f64 = 0.35;
pub const WEEKLY_RSI_WEIGHT: f64 = 0.25;
pub const DAILY_RSI_WEIGHT: f64 = 0.15;
pub const POSITION_52W_WEIGHT: f64 = 0.10;
pub const TREND_WEIGHT: f64 = 0.15;

/// All factor weights, in evaluation output order.
pub const WEIGHTS: [f64; 5] = [
    MA200_WEIGHT,
    WEEKLY_RSI_WEIGHT,
    DAILY_RSI_WEIGHT,
    POSITION_52W_WEIGHT,
    TREND_WEIGHT,
];

/// Deviation from MA200 in percent.
const MA200_LADDER: &[(f64, f64)] = &[
    (-20.0, 2.0),
    (-10.0, 1.5),
    (-5.0, 1.0),
    (0.0, 0.5),
    (5.0, 0.0),
    (10.0, -0.5),
    (15.0, -1.0),
    (20.0, -1.5),
];
const MA200_ABOVE: f64 = -2.0;

/// Shared by the weekly and daily RSI factors.
const RSI_LADDER: &[(f64, f64)] = &[
    (25.0, 2.0),
    (30.0, 1.5),
    (40.0, 1.0),
    (45.0, 0.5),
    (55.0, 0.0),
    (60.0, -0.5),
    (70.0, -1.0),
    (80.0, -1.5),
];
const RSI_ABOVE: f64 = -2.0;

/// 52-week position in percent. Above the last bound the score depends on
/// the other factors.
const POSITION_LADDER: &[(f64, f64)] = &[
    (10.0, 2.0),
    (20.0, 1.5),
    (30.0, 1.0),
    (40.0, 0.5),
    (60.0, 0.0),
    (70.0, -0.5),
    (80.0, -1.0),
    (95.0, -1.5),
];
/// Other-factor mean below which a position above 95% scores the full -2.
const POSITION_CONFIRMATION: f64 = -1.0;

/// Distance (fraction of the level) that counts as touching a 30-day extreme.
const EXTREME_PROXIMITY: f64 = 0.01;

/// First-match lookup; `above` applies past the last bound.
fn ladder(steps: &[(f64, f64)], above: f64, value: f64) -> f64 {
    steps
        .iter()
        .find(|(bound, _)| value <= *bound)
        .map(|(_, score)| *score)
        .unwrap_or(above)
}

fn unavailable(name: &'static str, weight: f64, what: &str) -> FactorScore {
    FactorScore::new(name, 0.0, weight, format!("{what} unavailable"))
}

/// Price deviation from the 200-day average.
pub fn score_ma200_deviation(ind: &MarketIndicators) -> FactorScore {
    let Some(deviation) = ind.ma200_deviation_pct().filter(|d| !d.is_nan()) else {
        return unavailable(MA200_DEVIATION, MA200_WEIGHT, "MA200");
    };

    let score = ladder(MA200_LADDER, MA200_ABOVE, deviation);
    FactorScore::new(
        MA200_DEVIATION,
        score,
        MA200_WEIGHT,
        format!("deviation {deviation:+.1}%"),
    )
}

fn score_rsi(name: &'static str, weight: f64, rsi: f64) -> FactorScore {
    if rsi.is_nan() {
        return unavailable(name, weight, "RSI");
    }
    let score = ladder(RSI_LADDER, RSI_ABOVE, rsi);
    FactorScore::new(name, score, weight, format!("RSI={rsi:.0}"))
}

/// Weekly RSI(14).
pub fn score_weekly_rsi(ind: &MarketIndicators) -> FactorScore {
    score_rsi(WEEKLY_RSI, WEEKLY_RSI_WEIGHT, ind.weekly_rsi)
}

/// Daily RSI(14).
pub fn score_daily_rsi(ind: &MarketIndicators) -> FactorScore {
    score_rsi(DAILY_RSI, DAILY_RSI_WEIGHT, ind.daily_rsi)
}

/// Position in the 52-week range.
///
/// Above 95% the full -2 is only given when `other_factors_mean` (the mean
/// raw score of the other four factors) is below -1; otherwise it is -1.
pub fn score_52w_position(ind: &MarketIndicators, other_factors_mean: f64) -> FactorScore {
    let pos = ind.position_52w * 100.0;
    if pos.is_nan() {
        return unavailable(POSITION_52W, POSITION_52W_WEIGHT, "52-week position");
    }

    let score = POSITION_LADDER
        .iter()
        .find(|(bound, _)| pos <= *bound)
        .map(|(_, score)| *score)
        .unwrap_or(if other_factors_mean < POSITION_CONFIRMATION {
            -2.0
        } else {
            -1.0
        });

    FactorScore::new(
        POSITION_52W,
        score,
        POSITION_52W_WEIGHT,
        format!("position={pos:.0}%"),
    )
}

fn near(price: f64, level: f64) -> bool {
    level > 0.0 && ((price - level).abs() / level) < EXTREME_PROXIMITY
}

/// Moving-average alignment plus proximity to the 30-day extremes.
pub fn score_trend(ind: &MarketIndicators) -> FactorScore {
    let bullish = ind.current_price > ind.ma20w && ind.ma20w > ind.ma50w;
    let bearish = ind.current_price < ind.ma20w && ind.ma20w < ind.ma50w;

    let (score, commentary) = if bullish && near(ind.current_price, ind.high_30d) {
        (1.5, "bullish alignment at 30-day high")
    } else if bullish {
        (1.0, "bullish alignment")
    } else if bearish && near(ind.current_price, ind.low_30d) {
        (-1.0, "bearish alignment at 30-day low")
    } else if bearish {
        (-0.5, "bearish alignment")
    } else {
        (0.0, "range-bound")
    };

    FactorScore::new(TREND_TRACKER, score, TREND_WEIGHT, commentary)
}
