use serde::{Deserialize, Serialize};
use std::fmt;

/// What caused a signal or fund movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    Weekly,
    BottomFish,
    TakeProfit,
    Monthly,
    Quarterly,
    Manual,
}

impl TriggerType {
    /// Event key used by the history store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::BottomFish => "BOTTOM_FISH",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::Monthly => "MONTHLY",
            Self::Quarterly => "QUARTERLY",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One factor's contribution to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactorScore {
    pub name: &'static str,
    /// Discrete ladder value, usually within [-2.0, 2.0] in 0.5 steps.
    pub raw_score: f64,
    pub weight: f64,
    /// `raw_score * weight`.
    pub weighted: f64,
    pub commentary: String,
}

impl FactorScore {
    pub fn new(name: &'static str, raw_score: f64, weight: f64, commentary: impl Into<String>) -> Self {
        Self {
            name,
            raw_score,
            weight,
            weighted: raw_score * weight,
            commentary: commentary.into(),
        }
    }
}

/// Discrete investment-sizing levels, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierLevel {
    #[serde(rename = "extreme-heavy")]
    ExtremeHeavy,
    #[serde(rename = "heavy")]
    Heavy,
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "reduced")]
    Reduced,
    #[serde(rename = "light/watch")]
    LightWatch,
    #[serde(rename = "minimum")]
    Minimum,
}

impl TierLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExtremeHeavy => "extreme-heavy",
            Self::Heavy => "heavy",
            Self::Add => "add",
            Self::Normal => "normal",
            Self::Reduced => "reduced",
            Self::LightWatch => "light/watch",
            Self::Minimum => "minimum",
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Sizing policy selected by the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentTier {
    pub level: TierLevel,
    /// Applied to the weekly base N and drawn from the regular pool.
    pub multiplier: f64,
    /// Applied to the weekly base N and drawn from the reserve pool.
    pub reserve_use: f64,
}

impl InvestmentTier {
    pub const fn new(level: TierLevel, multiplier: f64, reserve_use: f64) -> Self {
        Self {
            level,
            multiplier,
            reserve_use,
        }
    }

    pub fn label(&self) -> &'static str {
        self.level.label()
    }
}

/// Result of one evaluation. Amount fields are filled in once the fund
/// manager has executed the withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSignal {
    pub factors: Vec<FactorScore>,
    pub total_score: f64,
    pub tier: InvestmentTier,
    pub base_amount: f64,
    pub final_amount: f64,
    pub reserve_used: f64,
    pub trigger: TriggerType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl TradeSignal {
    /// Look up a factor by name.
    pub fn factor(&self, name: &str) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.name == name)
    }

    /// Record the executed amounts.
    pub fn fill_amounts(&mut self, base_amount: f64, final_amount: f64, reserve_used: f64) {
        self.base_amount = base_amount;
        self.final_amount = final_amount;
        self.reserve_used = reserve_used;
    }
}
