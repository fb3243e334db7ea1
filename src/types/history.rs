//! Records handed to the history store.

use serde::{Deserialize, Serialize};

use super::{FundState, MarketIndicators, RebalanceAction, TradeSignal, TriggerType};

/// Everything known about one weekly evaluation.
#[derive(Debug, Clone, Copy)]
pub struct WeeklySnapshot<'a> {
    pub indicators: &'a MarketIndicators,
    pub signal: &'a TradeSignal,
    pub fund: &'a FundState,
}

/// A daily-check event (bottom-fish withdrawal or take-profit warning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCheckEvent {
    pub daily_rsi: f64,
    pub weekly_rsi: f64,
    pub price: f64,
    pub event_type: TriggerType,
    pub amount: f64,
    pub total_score: f64,
}

/// A pool balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundEvent {
    /// Unix seconds.
    pub timestamp: i64,
    pub event_type: TriggerType,
    pub regular_before: f64,
    pub regular_after: f64,
    pub reserve_before: f64,
    pub reserve_after: f64,
    pub amount: f64,
    pub note: String,
}

impl FundEvent {
    /// Build an event from the state before and after a mutation.
    pub fn between(
        event_type: TriggerType,
        before: &FundState,
        after: &FundState,
        amount: f64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp(),
            event_type,
            regular_before: before.regular_balance,
            regular_after: after.regular_balance,
            reserve_before: before.reserve_balance,
            reserve_after: after.reserve_balance,
            amount,
            note: note.into(),
        }
    }
}

/// A monthly replenishment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEvent {
    pub regular_added: f64,
    pub reserve_added: f64,
    pub regular_after: f64,
    pub reserve_after: f64,
    pub avg_score: f64,
}

/// A quarterly rebalance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyEvent {
    pub action: RebalanceAction,
    pub regular_after: f64,
    pub reserve_after: f64,
    pub note: String,
}
