//! Per-account ledger entry and the one-way pioneer flag.

use crate::error::LedgerError;
use crate::stage::StageSlice;
use crowdsale_types::{Timestamp, TokenAmount, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pioneer qualification. The only legal edge is `NotPioneer → Pioneer`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PioneerStatus {
    #[default]
    NotPioneer,
    Pioneer {
        /// Time of the contribution that crossed the threshold.
        since: Timestamp,
    },
}

impl PioneerStatus {
    pub fn is_pioneer(&self) -> bool {
        matches!(self, Self::Pioneer { .. })
    }

    /// Promote to pioneer. Returns `false` (and changes nothing) if already one.
    pub fn promote(&mut self, at: Timestamp) -> bool {
        match self {
            Self::NotPioneer => {
                *self = Self::Pioneer { since: at };
                true
            }
            Self::Pioneer { .. } => false,
        }
    }
}

/// Everything the ledger knows about one participant.
///
/// `balance` is maintained alongside the four token components and must
/// always equal their sum; see [`AccountEntry::is_consistent`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    /// Cumulative wei accepted from purchases credited to this account.
    pub wei_contributed: Wei,
    /// Base tokens from direct purchases (wei × rate).
    pub tokens_purchased: TokenAmount,
    /// Bonus earned as a qualified referrer.
    pub refer_sender_bonus: TokenAmount,
    /// Bonus earned as a referred buyer.
    pub refer_receiver_bonus: TokenAmount,
    /// Pioneer pool shares from every closed stage.
    pub pioneer_bonus_accrued: TokenAmount,
    /// Externally visible token balance.
    pub balance: TokenAmount,
    pub pioneer: PioneerStatus,
    /// Wei this account contributed inside each stage (1-based stage index).
    #[serde(default)]
    pub wei_by_stage: BTreeMap<u32, Wei>,
}

impl AccountEntry {
    pub fn is_pioneer(&self) -> bool {
        self.pioneer.is_pioneer()
    }

    /// Whether this account has completed a purchase before.
    pub fn has_purchased(&self) -> bool {
        !self.tokens_purchased.is_zero()
    }

    /// Sum of the four token components, `None` on overflow.
    pub fn component_sum(&self) -> Option<TokenAmount> {
        self.tokens_purchased
            .checked_add(self.refer_sender_bonus)?
            .checked_add(self.refer_receiver_bonus)?
            .checked_add(self.pioneer_bonus_accrued)
    }

    pub fn is_consistent(&self) -> bool {
        self.component_sum() == Some(self.balance)
    }

    /// Record accepted wei and the base tokens it bought.
    pub fn record_purchase(
        &mut self,
        wei: Wei,
        tokens: TokenAmount,
        slices: &[StageSlice],
    ) -> Result<(), LedgerError> {
        self.wei_contributed = self
            .wei_contributed
            .checked_add(wei)
            .ok_or(LedgerError::Overflow)?;
        for slice in slices {
            let entry = self.wei_by_stage.entry(slice.stage).or_default();
            *entry = entry.checked_add(slice.wei).ok_or(LedgerError::Overflow)?;
        }
        credit(&mut self.tokens_purchased, &mut self.balance, tokens)
    }

    pub fn credit_refer_sender(&mut self, amount: TokenAmount) -> Result<(), LedgerError> {
        credit(&mut self.refer_sender_bonus, &mut self.balance, amount)
    }

    pub fn credit_refer_receiver(&mut self, amount: TokenAmount) -> Result<(), LedgerError> {
        credit(&mut self.refer_receiver_bonus, &mut self.balance, amount)
    }

    pub fn credit_pioneer_bonus(&mut self, amount: TokenAmount) -> Result<(), LedgerError> {
        credit(&mut self.pioneer_bonus_accrued, &mut self.balance, amount)
    }
}

fn credit(
    component: &mut TokenAmount,
    balance: &mut TokenAmount,
    amount: TokenAmount,
) -> Result<(), LedgerError> {
    let new_component = component.checked_add(amount).ok_or(LedgerError::Overflow)?;
    let new_balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
    *component = new_component;
    *balance = new_balance;
    Ok(())
}
