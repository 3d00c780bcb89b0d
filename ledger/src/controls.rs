//! Administrative controls the ledger consults as permission gates:
//! ownership, the pause switch, the sale window and funds custody.

use crate::error::LedgerError;
use crowdsale_types::{AccountId, SaleSchedule, Timestamp, Wei};
use serde::{Deserialize, Serialize};

/// Who may call privileged operations.
pub trait AccessControl {
    fn is_owner(&self, caller: &AccountId) -> bool;

    fn require_owner(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller: *caller })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleControls {
    owner: AccountId,
    paused: bool,
    schedule: SaleSchedule,
    /// Wei held for the owner: accepted contributions minus withdrawals.
    custody: Wei,
    total_withdrawn: Wei,
}

impl AccessControl for SaleControls {
    fn is_owner(&self, caller: &AccountId) -> bool {
        *caller == self.owner
    }
}

impl SaleControls {
    pub fn new(owner: AccountId, schedule: SaleSchedule) -> Self {
        Self {
            owner,
            paused: false,
            schedule,
            custody: Wei::ZERO,
            total_withdrawn: Wei::ZERO,
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn schedule(&self) -> &SaleSchedule {
        &self.schedule
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_open(&self, now: Timestamp) -> bool {
        self.schedule.is_open(now)
    }

    pub fn pause(&mut self) -> Result<(), LedgerError> {
        if self.paused {
            return Err(LedgerError::AlreadyPaused);
        }
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<(), LedgerError> {
        if !self.paused {
            return Err(LedgerError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }

    pub fn set_pioneer_time_end(&mut self, at: Timestamp) {
        self.schedule.pioneer_time_end = at;
    }

    pub fn custody_balance(&self) -> Wei {
        self.custody
    }

    pub fn total_withdrawn(&self) -> Wei {
        self.total_withdrawn
    }

    /// Custody after accepting `amount`, without applying it.
    pub fn custody_after_deposit(&self, amount: Wei) -> Result<Wei, LedgerError> {
        self.custody.checked_add(amount).ok_or(LedgerError::Overflow)
    }

    pub fn set_custody(&mut self, custody: Wei) {
        self.custody = custody;
    }

    /// Release `amount` of custodied wei to the owner.
    pub fn withdraw(&mut self, amount: Wei) -> Result<(), LedgerError> {
        let remaining = self
            .custody
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                requested: amount,
                available: self.custody,
            })?;
        let withdrawn = self
            .total_withdrawn
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.custody = remaining;
        self.total_withdrawn = withdrawn;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controls() -> SaleControls {
        let schedule = SaleSchedule::new(Timestamp::new(0), Timestamp::new(100), Timestamp::new(50));
        SaleControls::new(AccountId::from_low_u64(1), schedule)
    }

    #[test]
    fn only_owner_passes() {
        let c = controls();
        assert!(c.require_owner(&AccountId::from_low_u64(1)).is_ok());
        assert_eq!(
            c.require_owner(&AccountId::from_low_u64(2)),
            Err(LedgerError::Unauthorized {
                caller: AccountId::from_low_u64(2)
            })
        );
    }

    #[test]
    fn pause_toggles_once() {
        let mut c = controls();
        assert!(!c.is_paused());
        c.pause().unwrap();
        assert_eq!(c.pause(), Err(LedgerError::AlreadyPaused));
        c.unpause().unwrap();
        assert_eq!(c.unpause(), Err(LedgerError::NotPaused));
    }

    #[test]
    fn withdraw_is_bounded_by_custody() {
        let mut c = controls();
        c.set_custody(c.custody_after_deposit(Wei::new(10)).unwrap());
        assert_eq!(
            c.withdraw(Wei::new(11)),
            Err(LedgerError::InsufficientFunds {
                requested: Wei::new(11),
                available: Wei::new(10)
            })
        );
        c.withdraw(Wei::new(4)).unwrap();
        assert_eq!(c.custody_balance(), Wei::new(6));
        assert_eq!(c.total_withdrawn(), Wei::new(4));
    }
}
