//! Composite score to investment tier.

use tracing::warn;

use crate::types::{InvestmentTier, TierLevel};

/// Ordered by descending threshold. The first threshold the score meets or
/// exceeds wins.
pub const TIERS: [(f64, InvestmentTier); 6] = [
    (1.5, InvestmentTier::new(TierLevel::ExtremeHeavy, 1.0, 1.5)),
    (1.2, InvestmentTier::new(TierLevel::Heavy, 1.0, 1.0)),
    (0.8, InvestmentTier::new(TierLevel::Add, 1.0, 0.5)),
    (0.0, InvestmentTier::new(TierLevel::Normal, 1.0, 0.0)),
    (-0.8, InvestmentTier::new(TierLevel::Reduced, 0.5, 0.0)),
    (-1.5, InvestmentTier::new(TierLevel::LightWatch, 0.25, 0.0)),
];

/// Catches every score below the last threshold.
pub const FLOOR_TIER: InvestmentTier = InvestmentTier::new(TierLevel::Minimum, 0.15, 0.0);

/// Map a composite score to its tier. NaN is reported and resolves to the
/// floor tier, the most conservative allocation.
pub fn map_tier(score: f64) -> InvestmentTier {
    if score.is_nan() {
        warn!("Composite score is NaN, falling back to the {} tier", FLOOR_TIER.label());
        return FLOOR_TIER;
    }

    TIERS
        .iter()
        .find(|(threshold, _)| score >= *threshold)
        .map(|(_, tier)| *tier)
        .unwrap_or(FLOOR_TIER)
}
