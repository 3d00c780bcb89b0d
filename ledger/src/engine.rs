//! Core crowdsale ledger engine.
//!
//! A purchase runs in two steps. [`LedgerEngine::plan_purchase`] borrows the
//! engine immutably, does every fallible computation against staged copies
//! of the touched accounts, and returns a [`PurchasePlan`]. `commit` then
//! moves the plan into the engine without any further checks. A failed
//! purchase therefore never leaves partial state behind.

use crate::account::AccountEntry;
use crate::bonus::{self, ReferralBonus};
use crate::controls::{AccessControl, SaleControls};
use crate::error::LedgerError;
use crate::event::SaleEvent;
use crate::pioneer::{self, PioneerRegistry, StakeUpdate};
use crate::stage::{self, StageSlice, StageSnapshot};
use crowdsale_types::{AccountId, SaleParams, SaleSchedule, Timestamp, TokenAmount, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// One call to `purchase_tokens`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer of record: credited with the wei, base tokens and pioneer
    /// standing, and receives any refund.
    pub payer: AccountId,
    /// Account credited with the referral receiver bonus.
    pub beneficiary: AccountId,
    pub referrer: Option<AccountId>,
    pub amount: Wei,
}

impl PurchaseRequest {
    /// A purchase the payer makes for itself.
    pub fn new(payer: AccountId, amount: Wei) -> Self {
        Self {
            payer,
            beneficiary: payer,
            referrer: None,
            amount,
        }
    }

    pub fn referred_by(mut self, referrer: AccountId) -> Self {
        self.referrer = Some(referrer);
        self
    }

    pub fn on_behalf_of(mut self, beneficiary: AccountId) -> Self {
        self.beneficiary = beneficiary;
        self
    }
}

/// What a committed purchase did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub payer: AccountId,
    pub beneficiary: AccountId,
    /// Wei actually accepted after clamping to the hard cap.
    pub effective_wei: Wei,
    pub refund: Wei,
    pub tokens: TokenAmount,
    pub referral: Option<ReferralBonus>,
    pub became_pioneer: bool,
    /// How the accepted wei fell across stages.
    pub slices: Vec<StageSlice>,
    /// Stages this purchase closed, in order.
    pub closed_stages: Vec<u32>,
    /// Pool shares credited by the closed stages, summed per account.
    pub pioneer_payouts: BTreeMap<AccountId, TokenAmount>,
    pub events: Vec<SaleEvent>,
}

/// A fully validated purchase, ready to commit.
#[derive(Debug)]
pub struct PurchasePlan {
    accounts: BTreeMap<AccountId, AccountEntry>,
    stake_update: Option<StakeUpdate>,
    closed: Vec<StageSnapshot>,
    stage_wei: Vec<(u32, Wei)>,
    total_wei_raised: Wei,
    total_token_supply: TokenAmount,
    custody: Wei,
    receipt: PurchaseReceipt,
}

impl PurchasePlan {
    pub fn receipt(&self) -> &PurchaseReceipt {
        &self.receipt
    }
}

/// Copy-on-write view of the accounts a purchase touches.
struct Staged<'a> {
    base: &'a BTreeMap<AccountId, AccountEntry>,
    changed: BTreeMap<AccountId, AccountEntry>,
}

impl<'a> Staged<'a> {
    fn new(base: &'a BTreeMap<AccountId, AccountEntry>) -> Self {
        Self {
            base,
            changed: BTreeMap::new(),
        }
    }

    fn entry_mut(&mut self, id: AccountId) -> &mut AccountEntry {
        let base = self.base;
        self.changed
            .entry(id)
            .or_insert_with(|| base.get(&id).cloned().unwrap_or_default())
    }
}

/// Headline figures of the sale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub total_wei_raised: Wei,
    pub total_supply: TokenAmount,
    pub current_stage: u32,
    pub accounts: usize,
    pub pioneers: usize,
    pub custody_balance: Wei,
    pub paused: bool,
}

/// The crowdsale ledger: every account entry, the stage pools and the global totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEngine {
    params: SaleParams,
    controls: SaleControls,
    accounts: BTreeMap<AccountId, AccountEntry>,
    pioneers: PioneerRegistry,
    /// Closed stages in order; entry `i` is stage `i + 1`.
    stages: Vec<StageSnapshot>,
    /// Wei raised inside each stage.
    stage_wei: BTreeMap<u32, Wei>,
    total_wei_raised: Wei,
    total_token_supply: TokenAmount,
}

impl LedgerEngine {
    pub fn new(owner: AccountId, schedule: SaleSchedule, params: SaleParams) -> Result<Self, LedgerError> {
        params
            .validate()
            .map_err(|e| LedgerError::InvalidParameter(e.to_string()))?;
        schedule
            .validate()
            .map_err(|e| LedgerError::InvalidParameter(e.to_string()))?;
        info!(%owner, rate = params.rate, hard_cap = %params.hard_cap, "crowdsale ledger created");
        Ok(Self {
            params,
            controls: SaleControls::new(owner, schedule),
            accounts: BTreeMap::new(),
            pioneers: PioneerRegistry::new(),
            stages: Vec::new(),
            stage_wei: BTreeMap::new(),
            total_wei_raised: Wei::ZERO,
            total_token_supply: TokenAmount::ZERO,
        })
    }

    // ── Contribution intake ─────────────────────────────────────────────

    /// Validate and apply a purchase at `now`. All or nothing.
    pub fn purchase_tokens(&mut self, request: &PurchaseRequest, now: Timestamp) -> Result<PurchaseReceipt, LedgerError> {
        match self.plan_purchase(request, now) {
            Ok(plan) => Ok(self.commit(plan)),
            Err(e) => {
                debug!(payer = %request.payer, amount = %request.amount, error = %e, "purchase rejected");
                Err(e)
            }
        }
    }

    /// Compute the full effect of `request` without touching the ledger.
    pub fn plan_purchase(&self, request: &PurchaseRequest, now: Timestamp) -> Result<PurchasePlan, LedgerError> {
        if self.controls.is_paused() {
            return Err(LedgerError::SalePaused);
        }
        if !self.controls.is_open(now) {
            return Err(LedgerError::SaleNotOpen { now });
        }
        if request.amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }

        let params = &self.params;
        let remaining = params.hard_cap.saturating_sub(self.total_wei_raised);
        if remaining.is_zero() {
            return Err(LedgerError::HardCapReached {
                hard_cap: params.hard_cap,
            });
        }
        let effective = request.amount.min(remaining);
        let refund = request.amount.saturating_sub(effective);

        let tokens = effective
            .to_tokens(u128::from(params.rate))
            .ok_or(LedgerError::Overflow)?;
        let first_purchase = !self
            .accounts
            .get(&request.payer)
            .is_some_and(AccountEntry::has_purchased);
        if first_purchase && tokens < params.min_tokens_purchased {
            return Err(LedgerError::BelowMinimumPurchase {
                tokens,
                minimum: params.min_tokens_purchased,
            });
        }

        let before = self.total_wei_raised;
        let after = before.checked_add(effective).ok_or(LedgerError::Overflow)?;
        let slices = stage::stage_slices(before, after, params.wei_per_stage, params.max_stages);

        let mut staged = Staged::new(&self.accounts);
        let mut events = vec![SaleEvent::TokenPurchase {
            payer: request.payer,
            beneficiary: request.beneficiary,
            wei: effective,
            tokens,
            refund,
        }];
        let mut minted = tokens;

        // Payer: base tokens, then pioneer qualification on the new cumulative total.
        let payer = staged.entry_mut(request.payer);
        payer.record_purchase(effective, tokens, &slices)?;
        let became_pioneer = pioneer::qualifies(
            payer,
            params.pioneer_wei_threshold,
            now,
            self.controls.schedule().pioneer_time_end,
        );
        if became_pioneer {
            payer.pioneer.promote(now);
            events.push(SaleEvent::PioneerQualified {
                account: request.payer,
                at: now,
            });
        }
        let stake_update = if payer.is_pioneer() {
            Some(self.pioneers.plan_stake(request.payer, payer.wei_contributed)?)
        } else {
            None
        };

        // Referral, judged on the referrer's standing before this call.
        let referrer = bonus::qualified_referrer(request.referrer, &request.payer, |id| {
            self.accounts.get(id).is_some_and(AccountEntry::is_pioneer)
        });
        let referral = match referrer {
            Some(referrer) => {
                let referral = bonus::referral_bonus(
                    referrer,
                    tokens,
                    params.refer_sender_bonus_pct,
                    params.refer_receiver_bonus_pct,
                )?;
                staged.entry_mut(referrer).credit_refer_sender(referral.sender)?;
                staged
                    .entry_mut(request.beneficiary)
                    .credit_refer_receiver(referral.receiver)?;
                minted = minted
                    .checked_add(referral.sender)
                    .and_then(|m| m.checked_add(referral.receiver))
                    .ok_or(LedgerError::Overflow)?;
                events.push(SaleEvent::ReferralBonus {
                    referrer,
                    beneficiary: request.beneficiary,
                    sender_bonus: referral.sender,
                    receiver_bonus: referral.receiver,
                });
                Some(referral)
            }
            None => None,
        };

        // Stages fully funded by this purchase close against the post-purchase stakes.
        let (stakes, total_stake) = self.pioneers.stakes_with(stake_update.as_ref());
        let mut closed = Vec::new();
        let mut pioneer_payouts: BTreeMap<AccountId, TokenAmount> = BTreeMap::new();
        for stage in stage::closed_stages(before, after, params.wei_per_stage, params.max_stages) {
            let pool = params.pioneer_bonus_per_stage;
            let mut distributed = TokenAmount::ZERO;
            let shares = bonus::pool_shares(pool, &stakes, total_stake)?;
            for (account, share) in &shares {
                staged.entry_mut(*account).credit_pioneer_bonus(*share)?;
                let payout = pioneer_payouts.entry(*account).or_default();
                *payout = payout.checked_add(*share).ok_or(LedgerError::Overflow)?;
                distributed = distributed.checked_add(*share).ok_or(LedgerError::Overflow)?;
            }
            minted = minted.checked_add(distributed).ok_or(LedgerError::Overflow)?;
            events.push(SaleEvent::StageClosed {
                stage,
                pool,
                distributed,
                pioneers: shares.len(),
            });
            closed.push(StageSnapshot {
                stage,
                pool,
                total_pioneer_stake: total_stake,
                stakes: stakes.clone(),
                closed_at: now,
            });
        }

        let mut stage_wei = Vec::with_capacity(slices.len());
        for slice in &slices {
            let raised = self.stage_wei.get(&slice.stage).copied().unwrap_or_default();
            let raised = raised.checked_add(slice.wei).ok_or(LedgerError::Overflow)?;
            stage_wei.push((slice.stage, raised));
        }

        let total_token_supply = self
            .total_token_supply
            .checked_add(minted)
            .ok_or(LedgerError::Overflow)?;
        let custody = self.controls.custody_after_deposit(effective)?;

        let receipt = PurchaseReceipt {
            payer: request.payer,
            beneficiary: request.beneficiary,
            effective_wei: effective,
            refund,
            tokens,
            referral,
            became_pioneer,
            slices,
            closed_stages: closed.iter().map(|s| s.stage).collect(),
            pioneer_payouts,
            events,
        };

        Ok(PurchasePlan {
            accounts: staged.changed,
            stake_update,
            closed,
            stage_wei,
            total_wei_raised: after,
            total_token_supply,
            custody,
            receipt,
        })
    }

    /// Apply a plan produced by `plan_purchase` against the current state.
    fn commit(&mut self, plan: PurchasePlan) -> PurchaseReceipt {
        let PurchasePlan {
            accounts,
            stake_update,
            closed,
            stage_wei,
            total_wei_raised,
            total_token_supply,
            custody,
            receipt,
        } = plan;

        self.accounts.extend(accounts);
        if let Some(update) = stake_update {
            self.pioneers.apply(update);
        }
        self.stage_wei.extend(stage_wei);
        self.stages.extend(closed);
        self.total_wei_raised = total_wei_raised;
        self.total_token_supply = total_token_supply;
        self.controls.set_custody(custody);

        info!(
            payer = %receipt.payer,
            beneficiary = %receipt.beneficiary,
            wei = %receipt.effective_wei,
            tokens = %receipt.tokens,
            refund = %receipt.refund,
            total_raised = %self.total_wei_raised,
            "purchase accepted"
        );
        if receipt.became_pioneer {
            info!(account = %receipt.payer, "pioneer qualified");
        }
        for event in &receipt.events {
            if let SaleEvent::StageClosed { stage, distributed, pioneers, .. } = event {
                info!(stage, %distributed, pioneers, "stage closed");
                if *pioneers == 0 {
                    warn!(stage, "stage closed without pioneers; pool left undistributed");
                }
            }
        }
        receipt
    }

    // ── Administration ──────────────────────────────────────────────────

    pub fn set_rate(&mut self, caller: &AccountId, rate: u64) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        if rate == 0 {
            return Err(LedgerError::InvalidParameter("rate must be non-zero".into()));
        }
        self.params.rate = rate;
        info!(rate, "rate changed");
        Ok(SaleEvent::RateChanged { rate })
    }

    /// The cap may be lowered, but never below what has already been raised.
    pub fn set_hard_cap(&mut self, caller: &AccountId, hard_cap: Wei) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        if hard_cap.is_zero() || hard_cap < self.total_wei_raised {
            return Err(LedgerError::InvalidParameter(format!(
                "hard cap {hard_cap} is below the {} already raised",
                self.total_wei_raised
            )));
        }
        self.params.hard_cap = hard_cap;
        info!(%hard_cap, "hard cap changed");
        Ok(SaleEvent::HardCapChanged { hard_cap })
    }

    pub fn set_pioneer_time_end(&mut self, caller: &AccountId, at: Timestamp) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        self.controls.set_pioneer_time_end(at);
        info!(pioneer_time_end = %at, "pioneer deadline changed");
        Ok(SaleEvent::PioneerTimeEndChanged { pioneer_time_end: at })
    }

    pub fn set_min_tokens_purchased(
        &mut self,
        caller: &AccountId,
        min_tokens_purchased: TokenAmount,
    ) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        self.params.min_tokens_purchased = min_tokens_purchased;
        info!(%min_tokens_purchased, "minimum purchase changed");
        Ok(SaleEvent::MinimumPurchaseChanged { min_tokens_purchased })
    }

    pub fn pause(&mut self, caller: &AccountId) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        self.controls.pause()?;
        info!("sale paused");
        Ok(SaleEvent::Pause)
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        self.controls.unpause()?;
        info!("sale unpaused");
        Ok(SaleEvent::Unpause)
    }

    /// Release `amount` of custodied wei to the owner.
    pub fn withdraw(&mut self, caller: &AccountId, amount: Wei) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.release(amount)
    }

    /// Release everything in custody. Succeeds with zero when custody is empty.
    pub fn withdraw_all(&mut self, caller: &AccountId) -> Result<SaleEvent, LedgerError> {
        self.controls.require_owner(caller)?;
        self.release(self.controls.custody_balance())
    }

    fn release(&mut self, amount: Wei) -> Result<SaleEvent, LedgerError> {
        self.controls.withdraw(amount)?;
        let to = self.controls.owner();
        info!(%to, %amount, remaining = %self.controls.custody_balance(), "funds withdrawn");
        Ok(SaleEvent::Withdraw { to, amount })
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn account(&self, id: &AccountId) -> Option<&AccountEntry> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountEntry)> {
        self.accounts.iter()
    }

    fn field<T: Default>(&self, id: &AccountId, get: impl Fn(&AccountEntry) -> T) -> T {
        self.accounts.get(id).map(get).unwrap_or_default()
    }

    pub fn balance_of(&self, id: &AccountId) -> TokenAmount {
        self.field(id, |e| e.balance)
    }

    pub fn wei_raised_from(&self, id: &AccountId) -> Wei {
        self.field(id, |e| e.wei_contributed)
    }

    pub fn tokens_purchased(&self, id: &AccountId) -> TokenAmount {
        self.field(id, |e| e.tokens_purchased)
    }

    pub fn tokens_refer_sender_bonus(&self, id: &AccountId) -> TokenAmount {
        self.field(id, |e| e.refer_sender_bonus)
    }

    pub fn tokens_refer_receiver_bonus(&self, id: &AccountId) -> TokenAmount {
        self.field(id, |e| e.refer_receiver_bonus)
    }

    pub fn is_pioneer(&self, id: &AccountId) -> bool {
        self.field(id, AccountEntry::is_pioneer)
    }

    /// The pioneer bonus owed to `id`, recomputed across every closed stage.
    pub fn calc_pioneer_bonus(&self, id: &AccountId) -> Result<TokenAmount, LedgerError> {
        bonus::calc_pioneer_bonus(&self.stages, id)
    }

    pub fn total_wei_raised(&self) -> Wei {
        self.total_wei_raised
    }

    pub fn total_supply(&self) -> TokenAmount {
        self.total_token_supply
    }

    /// Number of closed stages.
    pub fn current_stage(&self) -> u32 {
        stage::stage_of(self.total_wei_raised, self.params.wei_per_stage, self.params.max_stages)
    }

    /// Wei raised inside 1-based `stage`.
    pub fn stage_wei(&self, stage: u32) -> Wei {
        self.stage_wei.get(&stage).copied().unwrap_or_default()
    }

    /// The snapshot a closed stage was distributed with.
    pub fn stage_snapshot(&self, stage: u32) -> Option<&StageSnapshot> {
        let index = usize::try_from(stage.checked_sub(1)?).ok()?;
        self.stages.get(index)
    }

    pub fn closed_stages(&self) -> &[StageSnapshot] {
        &self.stages
    }

    pub fn pioneers(&self) -> &PioneerRegistry {
        &self.pioneers
    }

    pub fn custody_balance(&self) -> Wei {
        self.controls.custody_balance()
    }

    pub fn params(&self) -> &SaleParams {
        &self.params
    }

    pub fn controls(&self) -> &SaleControls {
        &self.controls
    }

    pub fn is_owner(&self, caller: &AccountId) -> bool {
        self.controls.is_owner(caller)
    }

    pub fn is_paused(&self) -> bool {
        self.controls.is_paused()
    }

    pub fn is_open(&self, now: Timestamp) -> bool {
        self.controls.is_open(now)
    }

    pub fn summary(&self) -> SaleSummary {
        SaleSummary {
            total_wei_raised: self.total_wei_raised,
            total_supply: self.total_token_supply,
            current_stage: self.current_stage(),
            accounts: self.accounts.len(),
            pioneers: self.pioneers.len(),
            custody_balance: self.controls.custody_balance(),
            paused: self.controls.is_paused(),
        }
    }

    /// Check every ledger invariant, reporting the first one that fails.
    pub fn verify_invariants(&self) -> Result<(), LedgerError> {
        let violation = |msg: String| Err(LedgerError::InvariantViolation(msg));

        let mut supply = TokenAmount::ZERO;
        let mut raised = Wei::ZERO;
        for (id, entry) in &self.accounts {
            if !entry.is_consistent() {
                return violation(format!("balance of {id} differs from its components"));
            }
            let owed = self.calc_pioneer_bonus(id)?;
            if owed != entry.pioneer_bonus_accrued {
                return violation(format!(
                    "{id} accrued {} but is owed {owed}",
                    entry.pioneer_bonus_accrued
                ));
            }
            let expected_stake = if entry.is_pioneer() {
                entry.wei_contributed
            } else {
                Wei::ZERO
            };
            if self.pioneers.stake_of(id) != expected_stake {
                return violation(format!("stake of {id} differs from its pioneer contribution"));
            }
            supply = supply.checked_add(entry.balance).ok_or(LedgerError::Overflow)?;
            raised = raised
                .checked_add(entry.wei_contributed)
                .ok_or(LedgerError::Overflow)?;
        }
        if supply != self.total_token_supply {
            return violation(format!(
                "total supply {} differs from summed balances {supply}",
                self.total_token_supply
            ));
        }
        if raised != self.total_wei_raised {
            return violation(format!(
                "total raised {} differs from summed contributions {raised}",
                self.total_wei_raised
            ));
        }
        if self.total_wei_raised > self.params.hard_cap {
            return violation(format!("raised {} exceeds the hard cap", self.total_wei_raised));
        }
        let closed = usize::try_from(self.current_stage()).unwrap_or(usize::MAX);
        if closed != self.stages.len() {
            return violation(format!("{} stages closed, {} snapshots", closed, self.stages.len()));
        }
        let held = self
            .controls
            .custody_balance()
            .checked_add(self.controls.total_withdrawn())
            .ok_or(LedgerError::Overflow)?;
        if held != self.total_wei_raised {
            return violation(format!(
                "custody {held} differs from total raised {}",
                self.total_wei_raised
            ));
        }
        Ok(())
    }
}
