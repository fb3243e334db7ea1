use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use super::{state_file, Applied, FundError};
use crate::types::{FundState, RebalanceAction, TradeSignal, REGULAR_SHARE, RESERVE_SHARE};

/// Score above which a week counts toward the high-score streak.
const HIGH_SCORE: f64 = 1.0;
/// Reserve ceiling, in multiples of N.
const RESERVE_CEILING_N: f64 = 6.0;
/// Reserve floor for the emergency top-up, in multiples of N.
const RESERVE_FLOOR_N: f64 = 3.0;
/// High-score weeks required before an emergency top-up.
const TOPUP_STREAK: u32 = 4;

/// Bottom-fish size in multiples of N for a composite score.
fn bottom_fish_multiplier(score: f64) -> f64 {
    if score > 1.0 {
        1.5
    } else if score > 0.0 {
        1.0
    } else if score < -0.5 {
        0.5
    } else {
        0.75
    }
}

/// Owns the fund state. Every operation holds the lock across its whole
/// read-modify-persist sequence, and every mutation is written through to
/// disk before the lock is released.
pub struct FundManager {
    state: Mutex<FundState>,
    path: PathBuf,
}

impl FundManager {
    /// Load the state at `path`, seeding it from `monthly_budget` when no
    /// prior state exists. An existing state is never re-seeded.
    pub fn open(path: impl Into<PathBuf>, monthly_budget: f64) -> Result<Self, FundError> {
        let path = path.into();

        let mut state = match state_file::load(&path)? {
            Some(state) if !state.is_unseeded() => {
                if state.monthly_budget != monthly_budget {
                    warn!(
                        "Stored monthly budget {} differs from configured {}; keeping stored value",
                        state.monthly_budget, monthly_budget
                    );
                }
                info!(
                    "Loaded fund state: regular={:.2} reserve={:.2} N={:.2}",
                    state.regular_balance, state.reserve_balance, state.weekly_base_n
                );
                state
            }
            _ => {
                info!("Seeding fund state from monthly budget {:.2}", monthly_budget);
                FundState::seeded(monthly_budget)
            }
        };

        state_file::save(&path, &mut state)?;

        Ok(Self {
            state: Mutex::new(state),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, FundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` on the locked state, then write the result through to disk
    /// before the lock is released.
    fn commit<T>(
        &self,
        mut state: MutexGuard<'_, FundState>,
        name: &str,
        op: impl FnOnce(&mut FundState) -> T,
    ) -> Applied<T> {
        let before = state.clone();
        let value = op(&mut state);

        let persist_error = match state_file::save(&self.path, &mut state) {
            Ok(()) => None,
            Err(e) => {
                error!("Failed to save fund state after {}: {}", name, e);
                Some(e)
            }
        };

        Applied {
            value,
            before,
            after: state.clone(),
            persist_error,
        }
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> FundState {
        self.lock().clone()
    }

    /// Withdraw N x multiplier from the regular pool and N x reserve-use from
    /// the reserve pool, each capped at the pool balance. Fills the signal's
    /// amounts and returns `(final_amount, reserve_used)`.
    pub fn weekly_investment(&self, signal: &mut TradeSignal) -> Applied<(f64, f64)> {
        self.commit(self.lock(), "weekly investment", |state| {
            let n = state.weekly_base_n;
            let regular = (n * signal.tier.multiplier).min(state.regular_balance).max(0.0);
            let reserve = (n * signal.tier.reserve_use).min(state.reserve_balance).max(0.0);

            state.regular_balance -= regular;
            state.reserve_balance -= reserve;

            state.push_score(signal.total_score);
            if signal.total_score > HIGH_SCORE {
                state.consecutive_high_score_weeks += 1;
            } else {
                state.consecutive_high_score_weeks = 0;
            }

            let final_amount = regular + reserve;
            signal.fill_amounts(n, final_amount, reserve);
            (final_amount, reserve)
        })
    }

    /// Reserve-only withdrawal sized by score band, at most once per week.
    /// Returns `None` without touching the state when this week's
    /// bottom-fish has already been used.
    pub fn bottom_fish_investment(&self, total_score: f64) -> Applied<Option<f64>> {
        let state = self.lock();

        if state.bottom_fish_used_this_week {
            let snapshot = state.clone();
            return Applied {
                value: None,
                before: snapshot.clone(),
                after: snapshot,
                persist_error: None,
            };
        }

        self.commit(state, "bottom-fish", |state| {
            let amount = (state.weekly_base_n * bottom_fish_multiplier(total_score))
                .min(state.reserve_balance)
                .max(0.0);
            state.reserve_balance -= amount;
            state.bottom_fish_used_this_week = true;
            Some(amount)
        })
    }

    /// Add one month of budget to both pools. Pools are not capped.
    /// Returns `(regular_added, reserve_added)`.
    pub fn monthly_replenish(&self) -> Applied<(f64, f64)> {
        self.commit(self.lock(), "monthly replenish", |state| {
            let regular = state.monthly_budget * REGULAR_SHARE;
            let reserve = state.monthly_budget * RESERVE_SHARE;
            state.regular_balance += regular;
            state.reserve_balance += reserve;
            state.last_replenish_at = Some(Utc::now());
            (regular, reserve)
        })
    }

    /// Move reserve above 6N back to the regular pool, or top the reserve up
    /// to 3N after a sustained high-score streak. The top-up is an external
    /// capital injection and is not debited from the regular pool.
    pub fn quarterly_rebalance(&self) -> Applied<RebalanceAction> {
        self.commit(self.lock(), "quarterly rebalance", |state| {
            let n = state.weekly_base_n;
            let ceiling = RESERVE_CEILING_N * n;
            let floor = RESERVE_FLOOR_N * n;

            let action = if state.reserve_balance > ceiling {
                let excess = state.reserve_balance - ceiling;
                state.reserve_balance = ceiling;
                state.regular_balance += excess;
                RebalanceAction::TransferExcess(excess)
            } else if state.consecutive_high_score_weeks >= TOPUP_STREAK
                && state.reserve_balance < floor
            {
                let top_up = floor - state.reserve_balance;
                state.reserve_balance = floor;
                warn!("Emergency reserve top-up of {:.2} injected from outside the pools", top_up);
                RebalanceAction::EmergencyTopup(top_up)
            } else {
                RebalanceAction::NoAction
            };

            state.last_rebalance_at = Some(Utc::now());
            action
        })
    }

    /// Clear the weekly bottom-fish flag.
    pub fn reset_weekly_flags(&self) -> Applied<()> {
        self.commit(self.lock(), "weekly reset", |state| {
            state.bottom_fish_used_this_week = false;
        })
    }
}
