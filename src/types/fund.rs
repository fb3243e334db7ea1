use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Share of the monthly budget routed to the regular pool.
pub const REGULAR_SHARE: f64 = 0.70;
/// Share of the monthly budget routed to the reserve pool.
pub const RESERVE_SHARE: f64 = 0.30;
/// Average number of weeks per month used to derive the weekly base.
pub const WEEKS_PER_MONTH: f64 = 4.33;
/// Length of the trailing score window.
pub const MAX_RECENT_SCORES: usize = 12;

/// Dual-pool fund state. This is the only durable entity; the on-disk JSON
/// uses exactly these field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundState {
    pub monthly_budget: f64,
    /// Weekly base N, fixed when the state is seeded.
    pub weekly_base_n: f64,
    pub regular_balance: f64,
    pub reserve_balance: f64,
    pub bottom_fish_used_this_week: bool,
    pub consecutive_high_score_weeks: u32,
    /// Oldest first, at most [`MAX_RECENT_SCORES`] entries.
    #[serde(default)]
    pub recent_scores: VecDeque<f64>,
    #[serde(default)]
    pub last_replenish_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_rebalance_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl FundState {
    /// Fresh state for a monthly budget: 70% regular, 30% reserve,
    /// N = 70% of the budget spread over 4.33 weeks.
    pub fn seeded(monthly_budget: f64) -> Self {
        Self {
            monthly_budget,
            weekly_base_n: monthly_budget * REGULAR_SHARE / WEEKS_PER_MONTH,
            regular_balance: monthly_budget * REGULAR_SHARE,
            reserve_balance: monthly_budget * RESERVE_SHARE,
            bottom_fish_used_this_week: false,
            consecutive_high_score_weeks: 0,
            recent_scores: VecDeque::with_capacity(MAX_RECENT_SCORES),
            last_replenish_at: None,
            last_rebalance_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether this state was never seeded (zero budget).
    pub fn is_unseeded(&self) -> bool {
        self.monthly_budget == 0.0
    }

    /// Push a score into the trailing window, evicting the oldest entries.
    pub fn push_score(&mut self, score: f64) {
        self.recent_scores.push_back(score);
        while self.recent_scores.len() > MAX_RECENT_SCORES {
            self.recent_scores.pop_front();
        }
    }

    /// Mean of the trailing score window, if any scores were recorded.
    pub fn average_recent_score(&self) -> Option<f64> {
        if self.recent_scores.is_empty() {
            return None;
        }
        Some(self.recent_scores.iter().sum::<f64>() / self.recent_scores.len() as f64)
    }

    pub fn total_balance(&self) -> f64 {
        self.regular_balance + self.reserve_balance
    }
}

/// Outcome of a quarterly rebalance. Exactly one branch applies per call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "amount", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebalanceAction {
    /// Reserve above 6N; the excess moved to the regular pool.
    TransferExcess(f64),
    /// Sustained high scores with a thin reserve; reserve topped up to 3N.
    EmergencyTopup(f64),
    NoAction,
}

impl RebalanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransferExcess(_) => "TRANSFER_EXCESS",
            Self::EmergencyTopup(_) => "EMERGENCY_TOPUP",
            Self::NoAction => "NO_ACTION",
        }
    }

    /// Amount moved by the rebalance.
    pub fn amount(&self) -> f64 {
        match self {
            Self::TransferExcess(a) | Self::EmergencyTopup(a) => *a,
            Self::NoAction => 0.0,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::TransferExcess(_) => "Reserve pool above 6N, excess moved back to the regular pool",
            Self::EmergencyTopup(_) => "Sustained high scores with a thin reserve, reserve topped up to 3N",
            Self::NoAction => "Quarterly rebalance: no adjustment needed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_split() {
        let state = FundState::seeded(10_000.0);
        assert!((state.regular_balance - 7_000.0).abs() < 1e-9);
        assert!((state.reserve_balance - 3_000.0).abs() < 1e-9);
        assert!((state.weekly_base_n - 7_000.0 / 4.33).abs() < 1e-9);
        assert!(!state.is_unseeded());
        assert!(state.recent_scores.is_empty());
    }

    #[test]
    fn test_push_score_evicts_oldest() {
        let mut state = FundState::seeded(1_000.0);
        for i in 0..15 {
            state.push_score(i as f64);
        }
        assert_eq!(state.recent_scores.len(), MAX_RECENT_SCORES);
        assert_eq!(state.recent_scores.front().copied(), Some(3.0));
        assert_eq!(state.recent_scores.back().copied(), Some(14.0));
    }

    #[test]
    fn test_average_recent_score() {
        let mut state = FundState::seeded(1_000.0);
        assert!(state.average_recent_score().is_none());
        state.push_score(1.0);
        state.push_score(-0.5);
        assert!((state.average_recent_score().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_json_field_names() {
        let state = FundState::seeded(1_000.0);
        let json = serde_json::to_string(&state).unwrap();
        for field in [
            "monthly_budget",
            "weekly_base_n",
            "regular_balance",
            "reserve_balance",
            "bottom_fish_used_this_week",
            "consecutive_high_score_weeks",
            "recent_scores",
            "last_replenish_at",
            "last_rebalance_at",
            "updated_at",
        ] {
            assert!(json.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_rebalance_action_amount() {
        assert_eq!(RebalanceAction::TransferExcess(12.5).amount(), 12.5);
        assert_eq!(RebalanceAction::NoAction.amount(), 0.0);
        assert_eq!(RebalanceAction::EmergencyTopup(1.0).as_str(), "EMERGENCY_TOPUP");
    }
}
