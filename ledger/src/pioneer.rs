//! Pioneer registry.
//!
//! An account becomes a pioneer the first time its cumulative contribution
//! reaches `pioneer_wei_threshold` with a contribution landing strictly before
//! `pioneer_time_end`. From then on its whole cumulative contribution is its
//! stake in every stage pool that closes. Status is never revoked.

use crate::account::AccountEntry;
use crate::error::LedgerError;
use crowdsale_types::{AccountId, Timestamp, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether `entry`, already updated with the contribution made at `now`,
/// qualifies as a new pioneer.
pub fn qualifies(entry: &AccountEntry, threshold: Wei, now: Timestamp, pioneer_time_end: Timestamp) -> bool {
    !entry.is_pioneer() && now < pioneer_time_end && entry.wei_contributed >= threshold
}

/// A pending change to one pioneer's stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StakeUpdate {
    pub account: AccountId,
    pub stake: Wei,
    pub total_after: Wei,
}

/// Live pioneer stakes, the source every closing stage snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PioneerRegistry {
    stakes: BTreeMap<AccountId, Wei>,
    total_stake: Wei,
}

impl PioneerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stake_of(&self, account: &AccountId) -> Wei {
        self.stakes.get(account).copied().unwrap_or_default()
    }

    pub fn total_stake(&self) -> Wei {
        self.total_stake
    }

    pub fn stakes(&self) -> &BTreeMap<AccountId, Wei> {
        &self.stakes
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Plan setting `account`'s stake to its new cumulative contribution.
    ///
    /// Stakes only grow: an account's cumulative contribution never decreases.
    pub fn plan_stake(&self, account: AccountId, cumulative: Wei) -> Result<StakeUpdate, LedgerError> {
        let previous = self.stake_of(&account);
        let growth = cumulative.checked_sub(previous).ok_or_else(|| {
            LedgerError::InvariantViolation(format!("stake of {account} would shrink"))
        })?;
        let total_after = self
            .total_stake
            .checked_add(growth)
            .ok_or(LedgerError::Overflow)?;
        Ok(StakeUpdate {
            account,
            stake: cumulative,
            total_after,
        })
    }

    /// Stakes as they would stand after `update`.
    pub fn stakes_with(&self, update: Option<&StakeUpdate>) -> (BTreeMap<AccountId, Wei>, Wei) {
        let mut stakes = self.stakes.clone();
        match update {
            Some(update) => {
                stakes.insert(update.account, update.stake);
                (stakes, update.total_after)
            }
            None => (stakes, self.total_stake),
        }
    }

    pub fn apply(&mut self, update: StakeUpdate) {
        self.stakes.insert(update.account, update.stake);
        self.total_stake = update.total_after;
    }
}
