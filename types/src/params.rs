//! Sale parameters: the economic constants read by every ledger calculation,
//! and the schedule that bounds the sale and the pioneer window.
//!
//! Some fields are owner-adjustable at runtime (rate, hard cap, minimum
//! purchase, pioneer deadline); the rest are fixed at deployment.

use crate::amount::{TokenAmount, Wei, TOKEN_UNIT, WEI_PER_ETHER};
use crate::error::CrowdsaleError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Upper bound on `max_stages`. Closing a stage snapshots every pioneer stake.
pub const MAX_STAGES_LIMIT: u32 = 1_000;

/// Economic constants of the sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleParams {
    // ── Pricing ──────────────────────────────────────────────────────────
    /// Raw tokens issued per wei contributed.
    pub rate: u64,

    /// Smallest token amount a first purchase may issue. Repeat buyers are exempt.
    pub min_tokens_purchased: TokenAmount,

    /// Maximum total wei the sale accepts. Excess is refunded.
    pub hard_cap: Wei,

    // ── Stages ───────────────────────────────────────────────────────────
    /// Width of one funding stage in wei.
    pub wei_per_stage: Wei,

    /// Number of stages that carry a pioneer pool.
    pub max_stages: u32,

    /// Fixed pool shared among pioneers when a stage closes.
    pub pioneer_bonus_per_stage: TokenAmount,

    // ── Pioneers & referrals ─────────────────────────────────────────────
    /// Cumulative contribution that makes an account a pioneer.
    pub pioneer_wei_threshold: Wei,

    /// Percent of the purchased tokens credited to a qualified referrer.
    pub refer_sender_bonus_pct: u32,

    /// Percent of the purchased tokens credited to the referred buyer.
    pub refer_receiver_bonus_pct: u32,
}

impl SaleParams {
    /// The reference deployment: 3600 tokens/wei, 10 stages of 1000 ether,
    /// a 10 000 ether cap and a 45 000 token pool per stage.
    pub fn reference_defaults() -> Self {
        Self {
            rate: 3600,
            min_tokens_purchased: TokenAmount::new(200 * TOKEN_UNIT),
            hard_cap: Wei::new(10_000 * WEI_PER_ETHER),

            wei_per_stage: Wei::new(1_000 * WEI_PER_ETHER),
            max_stages: 10,
            pioneer_bonus_per_stage: TokenAmount::new(45_000 * TOKEN_UNIT),

            pioneer_wei_threshold: Wei::new(WEI_PER_ETHER),
            refer_sender_bonus_pct: 5,
            refer_receiver_bonus_pct: 5,
        }
    }

    /// Reject parameter sets the ledger cannot operate with.
    pub fn validate(&self) -> Result<(), CrowdsaleError> {
        let invalid = |msg: &str| Err(CrowdsaleError::InvalidParams(msg.to_string()));
        if self.rate == 0 {
            return invalid("rate must be non-zero");
        }
        if self.hard_cap.is_zero() {
            return invalid("hard cap must be non-zero");
        }
        if self.wei_per_stage.is_zero() {
            return invalid("wei per stage must be non-zero");
        }
        if self.max_stages == 0 || self.max_stages > MAX_STAGES_LIMIT {
            return Err(CrowdsaleError::InvalidParams(format!(
                "max stages must be between 1 and {MAX_STAGES_LIMIT}"
            )));
        }
        if self.refer_sender_bonus_pct > 100 || self.refer_receiver_bonus_pct > 100 {
            return invalid("referral bonus percentages must not exceed 100");
        }
        Ok(())
    }
}

/// Default is the reference deployment.
impl Default for SaleParams {
    fn default() -> Self {
        Self::reference_defaults()
    }
}

/// When the sale accepts contributions and until when accounts can become pioneers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSchedule {
    pub opening_time: Timestamp,
    pub closing_time: Timestamp,
    /// Qualifying contributions must land strictly before this instant.
    pub pioneer_time_end: Timestamp,
}

impl SaleSchedule {
    pub fn new(opening_time: Timestamp, closing_time: Timestamp, pioneer_time_end: Timestamp) -> Self {
        Self {
            opening_time,
            closing_time,
            pioneer_time_end,
        }
    }

    /// Whether `now` falls inside the sale window (both ends inclusive).
    pub fn is_open(&self, now: Timestamp) -> bool {
        now >= self.opening_time && now <= self.closing_time
    }

    pub fn validate(&self) -> Result<(), CrowdsaleError> {
        if self.closing_time < self.opening_time {
            return Err(CrowdsaleError::InvalidParams(
                "closing time precedes opening time".to_string(),
            ));
        }
        Ok(())
    }
}
