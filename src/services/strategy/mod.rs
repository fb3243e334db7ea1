//! Multi-factor scoring model.

pub mod factors;
pub mod tiers;

pub use tiers::{map_tier, FLOOR_TIER, TIERS};

use tracing::debug;

use crate::types::{MarketIndicators, TradeSignal, TriggerType};

/// RSI level above which a take-profit warning is attached.
pub const TAKE_PROFIT_RSI: f64 = 85.0;

/// Score a set of indicators. The signal carries no amounts yet; those are
/// filled in by the fund manager.
pub fn evaluate(ind: &MarketIndicators) -> TradeSignal {
    evaluate_with_trigger(ind, TriggerType::Weekly)
}

pub fn evaluate_with_trigger(ind: &MarketIndicators, trigger: TriggerType) -> TradeSignal {
    let ma200 = factors::score_ma200_deviation(ind);
    let weekly = factors::score_weekly_rsi(ind);
    let daily = factors::score_daily_rsi(ind);
    let trend = factors::score_trend(ind);

    // The position factor needs the other four raw scores first.
    let others_mean = (ma200.raw_score + weekly.raw_score + daily.raw_score + trend.raw_score) / 4.0;
    let position = factors::score_52w_position(ind, others_mean);

    let factors = vec![ma200, weekly, daily, position, trend];
    let total_score: f64 = factors.iter().map(|f| f.weighted).sum();
    let tier = map_tier(total_score);

    let warning = take_profit_warning(ind);

    debug!(
        "Evaluated {}: total={:.3} tier={} warning={}",
        trigger,
        total_score,
        tier.label(),
        warning.is_some()
    );

    TradeSignal {
        factors,
        total_score,
        tier,
        base_amount: 0.0,
        final_amount: 0.0,
        reserve_used: 0.0,
        trigger,
        warning,
    }
}

/// Warning text when either RSI is above [`TAKE_PROFIT_RSI`].
pub fn take_profit_warning(ind: &MarketIndicators) -> Option<String> {
    if ind.daily_rsi > TAKE_PROFIT_RSI || ind.weekly_rsi > TAKE_PROFIT_RSI {
        Some(format!(
            "Overbought: daily RSI {:.0}, weekly RSI {:.0}. Consider taking partial profit.",
            ind.daily_rsi, ind.weekly_rsi
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TierLevel;

    fn normal_market() -> MarketIndicators {
        MarketIndicators {
            current_price: 5800.0,
            ma200: 5700.0,
            ma20w: 5750.0,
            ma50w: 5600.0,
            weekly_rsi: 50.0,
            daily_rsi: 50.0,
            high_52w: 6000.0,
            low_52w: 5000.0,
            high_30d: 6000.0,
            low_30d: 5500.0,
            position_52w: 0.8,
        }
    }

    #[test]
    fn test_normal_market() {
        let signal = evaluate(&normal_market());
        assert_eq!(signal.factors.len(), 5);
        assert!(signal.warning.is_none());
        assert!((signal.total_score - 0.05).abs() < 1e-9);
        assert_eq!(signal.tier.level, TierLevel::Normal);
        assert_eq!(signal.trigger, TriggerType::Weekly);
    }

    #[test]
    fn test_factor_order() {
        let signal = evaluate(&normal_market());
        let names: Vec<_> = signal.factors.iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            [
                factors::MA200_DEVIATION,
                factors::WEEKLY_RSI,
                factors::DAILY_RSI,
                factors::POSITION_52W,
                factors::TREND_TRACKER,
            ]
        );
    }

    #[test]
    fn test_oversold_market() {
        let ind = MarketIndicators {
            current_price: 4500.0,
            ma200: 5700.0,
            ma20w: 5000.0,
            ma50w: 5300.0,
            weekly_rsi: 22.0,
            daily_rsi: 18.0,
            high_52w: 6000.0,
            low_52w: 4400.0,
            high_30d: 5200.0,
            low_30d: 4480.0,
            position_52w: 0.0625,
        };
        let signal = evaluate(&ind);
        assert!(signal.total_score >= 1.0, "total {}", signal.total_score);
        assert!(signal.tier.reserve_use > 0.0);
    }

    #[test]
    fn test_overbought_warns() {
        let weekly_hot = MarketIndicators {
            weekly_rsi: 88.0,
            ..normal_market()
        };
        let signal = evaluate(&weekly_hot);
        assert!(signal.warning.as_deref().is_some_and(|w| !w.is_empty()));

        let daily_hot = MarketIndicators {
            daily_rsi: 90.0,
            ..normal_market()
        };
        assert!(evaluate(&daily_hot).warning.is_some());

        let exactly_85 = MarketIndicators {
            daily_rsi: 85.0,
            weekly_rsi: 85.0,
            ..normal_market()
        };
        assert!(evaluate(&exactly_85).warning.is_none());
    }

    #[test]
    fn test_overbought_scores_negative() {
        let ind = MarketIndicators {
            current_price: 6900.0,
            ma200: 5700.0,
            weekly_rsi: 88.0,
            daily_rsi: 90.0,
            position_52w: 1.0,
            ..normal_market()
        };
        let signal = evaluate(&ind);
        assert!(signal.total_score <= -0.5, "total {}", signal.total_score);
    }

    #[test]
    fn test_position_confirmation_uses_other_factors() {
        // Mild overextension: others average above -1, position capped at -1.
        let mild = MarketIndicators {
            current_price: 5990.0,
            ma200: 5800.0,
            ma20w: 5900.0,
            ma50w: 5700.0,
            weekly_rsi: 55.0,
            daily_rsi: 55.0,
            position_52w: 0.99,
            ..normal_market()
        };
        let signal = evaluate(&mild);
        assert_eq!(signal.factor(factors::POSITION_52W).unwrap().raw_score, -1.0);

        // Broad overextension: others average below -1, full -2.
        let broad = MarketIndicators {
            ma200: 4800.0,
            ma20w: 5500.0,
            ma50w: 5700.0,
            weekly_rsi: 82.0,
            daily_rsi: 82.0,
            ..mild
        };
        let signal = evaluate(&broad);
        assert_eq!(signal.factor(factors::POSITION_52W).unwrap().raw_score, -2.0);
    }

    #[test]
    fn test_deterministic() {
        let a = evaluate(&normal_market());
        let b = evaluate(&normal_market());
        assert_eq!(a, b);
    }

    #[test]
    fn test_manual_trigger() {
        let signal = evaluate_with_trigger(&normal_market(), TriggerType::Manual);
        assert_eq!(signal.trigger, TriggerType::Manual);
    }
}
