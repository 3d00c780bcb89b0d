//! Bonus calculator: referral bonuses and pioneer pool shares.

use crate::error::LedgerError;
use crate::math::mul_div;
use crate::stage::StageSnapshot;
use crowdsale_types::{AccountId, TokenAmount, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Referral bonus earned by one purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralBonus {
    pub referrer: AccountId,
    /// Credited to the referrer.
    pub sender: TokenAmount,
    /// Credited to the referred buyer.
    pub receiver: TokenAmount,
}

/// The referrer that earns a bonus on this purchase, if any.
///
/// A referrer qualifies when it is set, not the zero address, not the
/// payer, and already a pioneer.
pub fn qualified_referrer(
    referrer: Option<AccountId>,
    payer: &AccountId,
    is_pioneer: impl Fn(&AccountId) -> bool,
) -> Option<AccountId> {
    referrer.filter(|r| !r.is_zero() && r != payer && is_pioneer(r))
}

/// `floor(tokens × pct / 100)` for each side.
pub fn referral_bonus(
    referrer: AccountId,
    tokens: TokenAmount,
    sender_pct: u32,
    receiver_pct: u32,
) -> Result<ReferralBonus, LedgerError> {
    Ok(ReferralBonus {
        referrer,
        sender: tokens
            .percent(u128::from(sender_pct))
            .ok_or(LedgerError::Overflow)?,
        receiver: tokens
            .percent(u128::from(receiver_pct))
            .ok_or(LedgerError::Overflow)?,
    })
}

/// `floor(pool × stake / total)`; zero when nobody holds a stake.
pub fn pool_share(pool: TokenAmount, stake: Wei, total: Wei) -> Result<TokenAmount, LedgerError> {
    if total.is_zero() || stake.is_zero() {
        return Ok(TokenAmount::ZERO);
    }
    mul_div(pool.raw(), stake.raw(), total.raw())
        .map(TokenAmount::new)
        .ok_or(LedgerError::Overflow)
}

/// Every non-zero share of `pool` among `stakes`. Flooring dust is not redistributed.
pub fn pool_shares(
    pool: TokenAmount,
    stakes: &BTreeMap<AccountId, Wei>,
    total: Wei,
) -> Result<Vec<(AccountId, TokenAmount)>, LedgerError> {
    let mut shares = Vec::with_capacity(stakes.len());
    for (account, stake) in stakes {
        let share = pool_share(pool, *stake, total)?;
        if !share.is_zero() {
            shares.push((*account, share));
        }
    }
    Ok(shares)
}

/// Total pioneer bonus `account` is owed across all closed stages.
///
/// Recomputed from the closed-stage snapshots on every call, so it always
/// agrees with what was credited as the stages closed.
pub fn calc_pioneer_bonus(closed: &[StageSnapshot], account: &AccountId) -> Result<TokenAmount, LedgerError> {
    closed.iter().try_fold(TokenAmount::ZERO, |acc, snapshot| {
        acc.checked_add(snapshot.share_of(account)?)
            .ok_or(LedgerError::Overflow)
    })
}
