//! Stage tracking.
//!
//! Stage `s` (1-based) is the wei bracket `[(s−1)·w, s·w)` of cumulative
//! contributions, `w = wei_per_stage`. Only the first `max_stages` brackets
//! exist; wei raised past the last one belongs to no stage. A stage is
//! *closed* once the total raised reaches its upper bound, and the number of
//! closed stages is the current stage.

use crate::bonus;
use crate::error::LedgerError;
use crowdsale_types::{AccountId, Timestamp, TokenAmount, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// `min(floor(wei / wei_per_stage), max_stages)`: the number of closed stages.
pub fn stage_of(wei: Wei, wei_per_stage: Wei, max_stages: u32) -> u32 {
    if wei_per_stage.is_zero() {
        return 0;
    }
    let stage = wei.raw() / wei_per_stage.raw();
    u32::try_from(stage).unwrap_or(u32::MAX).min(max_stages)
}

/// The 1-based stages that the wei between `before` and `after` lands in.
///
/// `None` when nothing lands in any stage: an empty contribution, or one
/// entirely beyond the last stage.
pub fn stage_range(
    before: Wei,
    after: Wei,
    wei_per_stage: Wei,
    max_stages: u32,
) -> Option<RangeInclusive<u32>> {
    if after <= before || wei_per_stage.is_zero() {
        return None;
    }
    let width = wei_per_stage.raw();
    let first = before.raw() / width + 1;
    let last = (after.raw() - 1) / width + 1;
    let max = u128::from(max_stages);
    if first > max {
        return None;
    }
    // Both bounds are <= max_stages here, so they fit in u32.
    Some(first as u32..=last.min(max) as u32)
}

/// The wei that one contribution placed in one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSlice {
    pub stage: u32,
    pub wei: Wei,
}

/// Partition the contribution `before → after` across the stages it spans.
///
/// Each slice is `min(upper, after) − max(lower, before)` for the stage's
/// `[lower, upper)` bracket.
pub fn stage_slices(before: Wei, after: Wei, wei_per_stage: Wei, max_stages: u32) -> Vec<StageSlice> {
    let Some(range) = stage_range(before, after, wei_per_stage, max_stages) else {
        return Vec::new();
    };
    let width = wei_per_stage.raw();
    range
        .map(|stage| {
            let lower = u128::from(stage - 1).saturating_mul(width);
            let upper = u128::from(stage).saturating_mul(width);
            let wei = upper.min(after.raw()) - lower.max(before.raw());
            StageSlice {
                stage,
                wei: Wei::new(wei),
            }
        })
        .collect()
}

/// Stages that become closed when the total raised moves from `before` to `after`.
///
/// Empty when no boundary is crossed.
pub fn closed_stages(before: Wei, after: Wei, wei_per_stage: Wei, max_stages: u32) -> RangeInclusive<u32> {
    let from = stage_of(before, wei_per_stage, max_stages);
    let to = stage_of(after, wei_per_stage, max_stages);
    match from.checked_add(1) {
        Some(first) => first..=to,
        None => RangeInclusive::new(1, 0),
    }
}

/// The pioneer stakes a stage closed with. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub stage: u32,
    /// The pool this stage distributed.
    pub pool: TokenAmount,
    /// Sum of `stakes`.
    pub total_pioneer_stake: Wei,
    /// Each pioneer's cumulative contribution when the stage closed.
    pub stakes: BTreeMap<AccountId, Wei>,
    pub closed_at: Timestamp,
}

impl StageSnapshot {
    /// This stage's pool share for `account`: `floor(pool × stake / total)`.
    pub fn share_of(&self, account: &AccountId) -> Result<TokenAmount, LedgerError> {
        let stake = self.stakes.get(account).copied().unwrap_or_default();
        bonus::pool_share(self.pool, stake, self.total_pioneer_stake)
    }

    /// Total actually paid out. At most `pool`; the difference is flooring dust.
    pub fn distributed(&self) -> Result<TokenAmount, LedgerError> {
        self.stakes.keys().try_fold(TokenAmount::ZERO, |acc, account| {
            acc.checked_add(self.share_of(account)?)
                .ok_or(LedgerError::Overflow)
        })
    }
}
