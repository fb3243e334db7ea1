//! Human-readable messages (Telegram HTML).

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;

use crate::types::{FundState, MarketIndicators, RebalanceAction, TradeSignal};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn date(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Weekly evaluation report.
pub fn weekly_report(ind: &MarketIndicators, signal: &TradeSignal) -> String {
    let mut b = String::new();

    let _ = writeln!(
        b,
        "📊 <b>MarketSentinel weekly report</b> | {} ({})\n",
        date(Local::now()),
        signal.trigger
    );

    let _ = writeln!(b, "Price: {:.2}", ind.current_price);
    let _ = writeln!(
        b,
        "MA200: {:.2} (deviation {:+.1}%)",
        ind.ma200,
        ind.ma200_deviation_pct().unwrap_or(0.0)
    );
    let _ = writeln!(b, "MA20w: {:.2} | MA50w: {:.2}", ind.ma20w, ind.ma50w);
    let _ = writeln!(
        b,
        "RSI weekly/daily: {:.1} / {:.1}\n",
        ind.weekly_rsi, ind.daily_rsi
    );

    b.push_str("📈 <b>Factor scores:</b>\n");
    for f in &signal.factors {
        let _ = writeln!(
            b,
            "  {} ({}): {:+.1} (×{:.2}) = {:+.3}",
            f.name,
            escape_html(&f.commentary),
            f.raw_score,
            f.weight,
            f.weighted
        );
    }
    b.push_str("  ─────────────────\n");
    let _ = writeln!(b, "  Total: {:+.3}\n", signal.total_score);

    let _ = writeln!(
        b,
        "💰 <b>This week:</b> {} {:.2}x",
        signal.tier.label(),
        signal.tier.multiplier
    );
    let _ = writeln!(
        b,
        "   Invest: {:.0} (base {:.0})",
        signal.final_amount, signal.base_amount
    );
    if signal.reserve_used > 0.0 {
        let _ = writeln!(b, "   From reserve: {:.0}", signal.reserve_used);
    }

    if let Some(warning) = &signal.warning {
        let _ = write!(b, "\n⚠️ {}\n", escape_html(warning));
    }

    b
}

/// Current pool balances.
pub fn fund_status(state: &FundState) -> String {
    let mut b = String::from("📦 <b>Fund status</b>\n\n");
    let _ = writeln!(b, "Monthly budget: {:.0}", state.monthly_budget);
    let _ = writeln!(b, "Weekly base N: {:.0}", state.weekly_base_n);
    let _ = writeln!(b, "Regular pool: {:.0}", state.regular_balance);
    let _ = writeln!(b, "Reserve pool: {:.0}", state.reserve_balance);
    let _ = writeln!(
        b,
        "Bottom-fish used this week: {}",
        if state.bottom_fish_used_this_week { "yes" } else { "no" }
    );
    let _ = writeln!(b, "High-score streak: {} weeks", state.consecutive_high_score_weeks);
    let _ = writeln!(b, "Updated: {}", state.updated_at.format("%Y-%m-%d %H:%M UTC"));
    b
}

/// Monthly replenishment summary.
pub fn monthly_summary(state: &FundState) -> String {
    let mut b = String::new();
    let _ = writeln!(b, "📅 <b>Monthly summary</b> | {}\n", Local::now().format("%Y-%m"));
    let _ = writeln!(b, "Regular pool: {:.0}", state.regular_balance);
    let _ = writeln!(b, "Reserve pool: {:.0}", state.reserve_balance);

    if let Some(avg) = state.average_recent_score() {
        let _ = writeln!(
            b,
            "Average recent score: {:+.3} ({} weeks)",
            avg,
            state.recent_scores.len()
        );
    }

    b.push_str("\nMonthly replenishment done ✅");
    b
}

/// Intra-week bottom-fish withdrawal.
pub fn bottom_fish(ind: &MarketIndicators, total_score: f64, amount: f64) -> String {
    format!(
        "🎣 <b>Bottom-fish triggered</b>\n\nDaily RSI: {:.1}\nPrice: {:.2}\nScore: {:+.3}\nAmount from reserve: {:.0}",
        ind.daily_rsi, ind.current_price, total_score, amount
    )
}

/// Overbought warning from the daily check.
pub fn take_profit(ind: &MarketIndicators, warning: &str) -> String {
    format!(
        "🔔 <b>Take-profit alert</b>\n\nDaily RSI: {:.1} | Weekly RSI: {:.1}\nPrice: {:.2}\n\n{}",
        ind.daily_rsi,
        ind.weekly_rsi,
        ind.current_price,
        escape_html(warning)
    )
}

/// Quarterly rebalance outcome.
pub fn quarterly(action: &RebalanceAction, state: &FundState) -> String {
    let mut b = String::from("🔄 <b>Quarterly rebalance</b>\n\n");
    let _ = writeln!(b, "{}", action.describe());
    if action.amount() > 0.0 {
        let _ = writeln!(b, "Amount: {:.0}", action.amount());
    }
    let _ = writeln!(b, "Regular pool: {:.0}", state.regular_balance);
    let _ = writeln!(b, "Reserve pool: {:.0}", state.reserve_balance);
    b
}

/// A cycle that could not run.
pub fn cycle_failed(task: &str, reason: &str, at: DateTime<Utc>) -> String {
    format!(
        "❌ <b>{} failed</b> at {}\n\n{}",
        escape_html(task),
        at.format("%Y-%m-%d %H:%M UTC"),
        escape_html(reason)
    )
}

pub fn help() -> String {
    [
        "🤖 <b>MarketSentinel commands</b>",
        "",
        "/weekly - run the weekly evaluation now",
        "/fund - show fund status",
        "/monthly - show the monthly summary",
        "/help - this message",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategy;

    fn indicators() -> MarketIndicators {
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
    fn test_weekly_report_lists_factors() {
        let ind = indicators();
        let mut signal = strategy::evaluate(&ind);
        signal.fill_amounts(1616.0, 1616.0, 0.0);

        let text = weekly_report(&ind, &signal);
        for f in &signal.factors {
            assert!(text.contains(f.name), "missing {}", f.name);
        }
        assert!(text.contains("normal"));
        assert!(text.contains("Invest: 1616"));
        assert!(!text.contains("From reserve"));
        assert!(!text.contains("⚠️"));
    }

    #[test]
    fn test_weekly_report_includes_warning() {
        let ind = MarketIndicators {
            weekly_rsi: 88.0,
            ..indicators()
        };
        let signal = strategy::evaluate(&ind);
        assert!(weekly_report(&ind, &signal).contains("⚠️"));
    }

    #[test]
    fn test_fund_status() {
        let text = fund_status(&FundState::seeded(10_000.0));
        assert!(text.contains("Regular pool: 7000"));
        assert!(text.contains("Reserve pool: 3000"));
        assert!(text.contains("Bottom-fish used this week: no"));
    }

    #[test]
    fn test_monthly_summary_average() {
        let mut state = FundState::seeded(10_000.0);
        assert!(!monthly_summary(&state).contains("Average"));
        state.push_score(0.5);
        state.push_score(1.5);
        assert!(monthly_summary(&state).contains("+1.000 (2 weeks)"));
    }

    #[test]
    fn test_quarterly_message() {
        let state = FundState::seeded(10_000.0);
        let text = quarterly(&RebalanceAction::TransferExcess(120.0), &state);
        assert!(text.contains("Amount: 120"));
        assert!(!quarterly(&RebalanceAction::NoAction, &state).contains("Amount"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&c"), "a&lt;b&gt;&amp;c");
    }

    #[test]
    fn test_help_lists_commands() {
        let text = help();
        for cmd in ["/weekly", "/fund", "/monthly"] {
            assert!(text.contains(cmd));
        }
    }
}
