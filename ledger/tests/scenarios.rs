//! End-to-end sale scenarios against the reference deployment:
//! rate 3600, 200-token minimum, 1-ether pioneer threshold, ten stages of
//! 1000 ether each carrying a 45 000-token pool, a 10 000-ether hard cap.

use crowdsale_ledger::{ErrorKind, LedgerEngine, LedgerError, PurchaseRequest, SaleEvent};
use crowdsale_types::{AccountId, SaleParams, SaleSchedule, Timestamp, TokenAmount, Wei, WEI_PER_ETHER};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DAY: u64 = 86_400;
const OPENING: u64 = 10 * DAY;

fn owner() -> AccountId {
    AccountId::from_low_u64(0xA0)
}

fn buyer(n: u64) -> AccountId {
    AccountId::from_low_u64(n)
}

fn ether(n: u128) -> Wei {
    Wei::new(n * WEI_PER_ETHER)
}

fn milli_ether(n: u128) -> Wei {
    Wei::new(n * WEI_PER_ETHER / 1_000)
}

fn tokens(n: u128) -> TokenAmount {
    TokenAmount::new(n * WEI_PER_ETHER)
}

/// Before the pioneer deadline.
fn early() -> Timestamp {
    Timestamp::new(OPENING + 1)
}

/// After the pioneer deadline, still inside the sale window.
fn late() -> Timestamp {
    Timestamp::new(OPENING + DAY + 1)
}

fn sale_with(params: SaleParams) -> LedgerEngine {
    let schedule = SaleSchedule::new(
        Timestamp::new(OPENING),
        Timestamp::new(OPENING + 2 * DAY),
        Timestamp::new(OPENING + DAY),
    );
    LedgerEngine::new(owner(), schedule, params).unwrap()
}

fn sale() -> LedgerEngine {
    sale_with(SaleParams::default())
}

fn buy(engine: &mut LedgerEngine, who: AccountId, amount: Wei, at: Timestamp) {
    engine
        .purchase_tokens(&PurchaseRequest::new(who, amount), at)
        .unwrap();
}

// ---------------------------------------------------------------------------
// Pioneer qualification
// ---------------------------------------------------------------------------

#[test]
fn two_half_threshold_purchases_qualify() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), milli_ether(500), early());
    assert!(!engine.is_pioneer(&buyer(1)));

    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(1), milli_ether(500)), early())
        .unwrap();
    assert!(receipt.became_pioneer);
    assert!(engine.is_pioneer(&buyer(1)));
    // The stake is the whole cumulative contribution, including wei sent before qualifying.
    assert_eq!(engine.pioneers().stake_of(&buyer(1)), ether(1));
}

#[test]
fn no_qualification_after_deadline() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), milli_ether(500), early());
    buy(&mut engine, buyer(1), milli_ether(500), late());
    assert!(!engine.is_pioneer(&buyer(1)));

    buy(&mut engine, buyer(2), ether(5), late());
    assert!(!engine.is_pioneer(&buyer(2)));
    assert!(engine.pioneers().is_empty());
}

#[test]
fn pioneer_status_survives_the_deadline() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());
    buy(&mut engine, buyer(1), ether(1), late());
    assert!(engine.is_pioneer(&buyer(1)));
    assert_eq!(engine.pioneers().stake_of(&buyer(1)), ether(2));
}

#[test]
fn deadline_instant_itself_is_too_late() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), Timestamp::new(OPENING + DAY));
    assert!(!engine.is_pioneer(&buyer(1)));
}

// ---------------------------------------------------------------------------
// Referrals
// ---------------------------------------------------------------------------

#[test]
fn referral_by_pioneer_pays_both_sides() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());

    let receipt = engine
        .purchase_tokens(
            &PurchaseRequest::new(buyer(2), milli_ether(100)).referred_by(buyer(1)),
            early(),
        )
        .unwrap();

    assert_eq!(receipt.tokens, tokens(360));
    assert_eq!(engine.tokens_refer_sender_bonus(&buyer(1)), tokens(18));
    assert_eq!(engine.tokens_refer_receiver_bonus(&buyer(2)), tokens(18));
    assert_eq!(engine.balance_of(&buyer(1)), tokens(3_618));
    assert_eq!(engine.balance_of(&buyer(2)), tokens(378));
    assert_eq!(engine.total_supply(), tokens(3_996));
    assert!(receipt
        .events
        .iter()
        .any(|e| matches!(e, SaleEvent::ReferralBonus { referrer, .. } if *referrer == buyer(1))));
    engine.verify_invariants().unwrap();
}

#[test]
fn self_referral_earns_nothing() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());
    let receipt = engine
        .purchase_tokens(
            &PurchaseRequest::new(buyer(1), milli_ether(100)).referred_by(buyer(1)),
            early(),
        )
        .unwrap();
    assert!(receipt.referral.is_none());
    assert_eq!(engine.tokens_refer_sender_bonus(&buyer(1)), TokenAmount::ZERO);
    assert_eq!(engine.tokens_refer_receiver_bonus(&buyer(1)), TokenAmount::ZERO);
}

#[test]
fn referral_by_non_pioneer_earns_nothing() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), milli_ether(100), early());
    assert!(!engine.is_pioneer(&buyer(1)));

    let receipt = engine
        .purchase_tokens(
            &PurchaseRequest::new(buyer(2), milli_ether(100)).referred_by(buyer(1)),
            early(),
        )
        .unwrap();
    assert!(receipt.referral.is_none());
    assert_eq!(engine.balance_of(&buyer(2)), tokens(360));
    assert_eq!(engine.balance_of(&buyer(1)), tokens(360));
}

#[test]
fn referral_by_zero_address_earns_nothing() {
    let mut engine = sale();
    let receipt = engine
        .purchase_tokens(
            &PurchaseRequest::new(buyer(2), milli_ether(100)).referred_by(AccountId::ZERO),
            early(),
        )
        .unwrap();
    assert!(receipt.referral.is_none());
    assert!(engine.account(&AccountId::ZERO).is_none());
}

// ---------------------------------------------------------------------------
// Minimum purchase
// ---------------------------------------------------------------------------

#[test]
fn first_purchase_must_reach_minimum() {
    let mut engine = sale();
    let floor = 200 * WEI_PER_ETHER / 3600;

    let err = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(1), Wei::new(floor)), early())
        .unwrap_err();
    assert!(matches!(err, LedgerError::BelowMinimumPurchase { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    buy(&mut engine, buyer(1), Wei::new(floor + 1), early());
    assert_eq!(engine.tokens_purchased(&buyer(1)), TokenAmount::new((floor + 1) * 3600));
}

#[test]
fn repeat_purchase_ignores_minimum() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), milli_ether(100), early());
    buy(&mut engine, buyer(1), Wei::new(1), early());
    assert_eq!(engine.wei_raised_from(&buyer(1)), Wei::new(100 * WEI_PER_ETHER / 1_000 + 1));
}

#[test]
fn zero_amount_is_rejected() {
    let mut engine = sale();
    assert_eq!(
        engine.purchase_tokens(&PurchaseRequest::new(buyer(1), Wei::ZERO), early()),
        Err(LedgerError::ZeroAmount)
    );
}

// ---------------------------------------------------------------------------
// Buying on behalf of another account
// ---------------------------------------------------------------------------

#[test]
fn repeat_payer_skips_minimum_when_buying_for_someone_else() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());

    let request = PurchaseRequest::new(buyer(1), Wei::new(10)).on_behalf_of(buyer(2));
    let receipt = engine.purchase_tokens(&request, early()).unwrap();
    assert_eq!(receipt.tokens, TokenAmount::new(36_000));
    assert_eq!(engine.wei_raised_from(&buyer(1)), Wei::new(WEI_PER_ETHER + 10));
    assert_eq!(engine.wei_raised_from(&buyer(2)), Wei::ZERO);
}

#[test]
fn payer_is_credited_and_qualifies_not_beneficiary() {
    let mut engine = sale();
    let request = PurchaseRequest::new(buyer(3), ether(2)).on_behalf_of(buyer(2));
    let receipt = engine.purchase_tokens(&request, early()).unwrap();

    assert!(receipt.became_pioneer);
    assert!(receipt
        .events
        .contains(&SaleEvent::PioneerQualified { account: buyer(3), at: early() }));
    assert_eq!(engine.wei_raised_from(&buyer(3)), ether(2));
    assert_eq!(engine.tokens_purchased(&buyer(3)), tokens(7_200));
    assert_eq!(engine.balance_of(&buyer(3)), tokens(7_200));
    assert!(engine.is_pioneer(&buyer(3)));
    assert_eq!(engine.pioneers().stake_of(&buyer(3)), ether(2));

    assert_eq!(engine.wei_raised_from(&buyer(2)), Wei::ZERO);
    assert_eq!(engine.balance_of(&buyer(2)), TokenAmount::ZERO);
    assert!(!engine.is_pioneer(&buyer(2)));

    // The beneficiary has bought nothing yet, so its own first purchase still faces the floor.
    let err = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(2), Wei::new(10)), early())
        .unwrap_err();
    assert!(matches!(err, LedgerError::BelowMinimumPurchase { .. }));
    engine.verify_invariants().unwrap();
}

#[test]
fn referrer_may_be_the_beneficiary() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());

    let request = PurchaseRequest::new(buyer(2), milli_ether(100))
        .on_behalf_of(buyer(1))
        .referred_by(buyer(1));
    let receipt = engine.purchase_tokens(&request, early()).unwrap();

    let referral = receipt.referral.unwrap();
    assert_eq!(referral.sender, tokens(18));
    assert_eq!(referral.receiver, tokens(18));
    assert_eq!(engine.tokens_refer_sender_bonus(&buyer(1)), tokens(18));
    assert_eq!(engine.tokens_refer_receiver_bonus(&buyer(1)), tokens(18));
    assert_eq!(engine.tokens_refer_receiver_bonus(&buyer(2)), TokenAmount::ZERO);
    assert_eq!(engine.tokens_purchased(&buyer(2)), tokens(360));
    assert_eq!(engine.balance_of(&buyer(1)), tokens(3_600 + 36));
    engine.verify_invariants().unwrap();
}

#[test]
fn payer_naming_itself_as_referrer_earns_nothing_for_anyone() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());

    let request = PurchaseRequest::new(buyer(1), milli_ether(100))
        .on_behalf_of(buyer(2))
        .referred_by(buyer(1));
    let receipt = engine.purchase_tokens(&request, early()).unwrap();
    assert_eq!(receipt.referral, None);
    assert_eq!(engine.tokens_refer_sender_bonus(&buyer(1)), TokenAmount::ZERO);
    assert_eq!(engine.tokens_refer_receiver_bonus(&buyer(2)), TokenAmount::ZERO);
}

// ---------------------------------------------------------------------------
// Stages and pioneer pools
// ---------------------------------------------------------------------------

#[test]
fn sole_pioneer_takes_three_pools() {
    let mut engine = sale();
    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(1), ether(3_000)), early())
        .unwrap();

    assert_eq!(receipt.closed_stages, vec![1, 2, 3]);
    assert_eq!(engine.current_stage(), 3);
    assert_eq!(engine.calc_pioneer_bonus(&buyer(1)).unwrap(), tokens(135_000));
    assert_eq!(
        engine.balance_of(&buyer(1)),
        tokens(3_000 * 3_600 + 135_000)
    );
    engine.verify_invariants().unwrap();
}

#[test]
fn second_pioneer_splits_stages_four_and_five() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(3_000), early());
    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(2), ether(2_000)), early())
        .unwrap();

    assert_eq!(receipt.closed_stages, vec![4, 5]);
    assert_eq!(engine.current_stage(), 5);
    // Stakes 3000 : 2000 per stage.
    assert_eq!(engine.calc_pioneer_bonus(&buyer(1)).unwrap(), tokens(135_000 + 2 * 27_000));
    assert_eq!(engine.calc_pioneer_bonus(&buyer(2)).unwrap(), tokens(2 * 18_000));
    assert_eq!(receipt.pioneer_payouts.get(&buyer(2)), Some(&tokens(36_000)));

    let stage4 = engine.stage_snapshot(4).unwrap();
    assert_eq!(stage4.total_pioneer_stake, ether(5_000));
    assert_eq!(stage4.distributed().unwrap(), tokens(45_000));
    engine.verify_invariants().unwrap();
}

#[test]
fn third_pioneer_is_clamped_and_closes_the_sale() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(3_000), early());
    buy(&mut engine, buyer(2), ether(2_000), early());

    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(3), ether(7_000)), early())
        .unwrap();
    assert_eq!(receipt.effective_wei, ether(5_000));
    assert_eq!(receipt.refund, ether(2_000));
    assert_eq!(receipt.closed_stages, vec![6, 7, 8, 9, 10]);
    assert_eq!(engine.current_stage(), 10);
    assert_eq!(engine.total_wei_raised(), ether(10_000));

    // Stakes 3 : 2 : 5 over stages six to ten.
    assert_eq!(engine.calc_pioneer_bonus(&buyer(1)).unwrap(), tokens(189_000 + 5 * 13_500));
    assert_eq!(engine.calc_pioneer_bonus(&buyer(2)).unwrap(), tokens(36_000 + 5 * 9_000));
    assert_eq!(engine.calc_pioneer_bonus(&buyer(3)).unwrap(), tokens(5 * 22_500));

    let pools = (1..=10)
        .map(|s| engine.stage_snapshot(s).unwrap().distributed().unwrap())
        .try_fold(TokenAmount::ZERO, |acc, d| acc.checked_add(d))
        .unwrap();
    assert_eq!(pools, tokens(450_000));
    assert_eq!(engine.total_supply(), tokens(10_000 * 3_600 + 450_000));

    assert_eq!(
        engine.purchase_tokens(&PurchaseRequest::new(buyer(4), ether(1)), early()),
        Err(LedgerError::HardCapReached { hard_cap: ether(10_000) })
    );
    engine.verify_invariants().unwrap();
}

#[test]
fn non_pioneer_wei_is_excluded_from_pools() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());
    buy(&mut engine, buyer(2), ether(999), late());

    assert_eq!(engine.current_stage(), 1);
    assert_eq!(engine.calc_pioneer_bonus(&buyer(1)).unwrap(), tokens(45_000));
    assert_eq!(engine.calc_pioneer_bonus(&buyer(2)).unwrap(), TokenAmount::ZERO);
    assert_eq!(engine.stage_snapshot(1).unwrap().total_pioneer_stake, ether(1));
}

#[test]
fn stage_without_pioneers_keeps_its_pool() {
    let mut engine = sale();
    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(1), ether(1_000)), late())
        .unwrap();
    assert_eq!(receipt.closed_stages, vec![1]);
    assert!(receipt.events.contains(&SaleEvent::StageClosed {
        stage: 1,
        pool: tokens(45_000),
        distributed: TokenAmount::ZERO,
        pioneers: 0,
    }));
    assert_eq!(engine.total_supply(), tokens(1_000 * 3_600));
}

#[test]
fn flooring_dust_is_not_redistributed() {
    let params = SaleParams {
        wei_per_stage: ether(3),
        pioneer_bonus_per_stage: TokenAmount::new(100),
        min_tokens_purchased: TokenAmount::ZERO,
        ..SaleParams::default()
    };
    let mut engine = sale_with(params);
    for n in 1..=3 {
        buy(&mut engine, buyer(n), ether(1), early());
    }
    let stage1 = engine.stage_snapshot(1).unwrap();
    assert_eq!(stage1.distributed().unwrap(), TokenAmount::new(99));
    for n in 1..=3 {
        assert_eq!(engine.account(&buyer(n)).unwrap().pioneer_bonus_accrued, TokenAmount::new(33));
    }
    engine.verify_invariants().unwrap();
}

#[test]
fn contribution_spanning_stages_is_sliced() {
    let mut engine = sale();
    let receipt = engine
        .purchase_tokens(&PurchaseRequest::new(buyer(1), ether(2_500)), early())
        .unwrap();
    let slices: Vec<(u32, Wei)> = receipt.slices.iter().map(|s| (s.stage, s.wei)).collect();
    assert_eq!(slices, vec![(1, ether(1_000)), (2, ether(1_000)), (3, ether(500))]);
    assert_eq!(engine.stage_wei(3), ether(500));
    assert_eq!(engine.account(&buyer(1)).unwrap().wei_by_stage.get(&3), Some(&ether(500)));
    assert_eq!(engine.current_stage(), 2);
}

#[test]
fn pioneer_bonus_query_is_idempotent() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1_500), early());
    let first = engine.calc_pioneer_bonus(&buyer(1)).unwrap();
    let second = engine.calc_pioneer_bonus(&buyer(1)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, engine.account(&buyer(1)).unwrap().pioneer_bonus_accrued);
}

// ---------------------------------------------------------------------------
// Whole sale
// ---------------------------------------------------------------------------

#[test]
fn supply_includes_pool_as_soon_as_stage_one_closes() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1_000), early());
    assert_eq!(engine.total_supply(), tokens(1_000 * 3_600 + 45_000));
}

#[test]
fn owner_pauses_then_withdraws_everything() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(4_000), early());

    engine.pause(&owner()).unwrap();
    assert_eq!(
        engine.purchase_tokens(&PurchaseRequest::new(buyer(2), ether(1)), early()),
        Err(LedgerError::SalePaused)
    );
    assert_eq!(engine.pause(&owner()).unwrap_err().kind(), ErrorKind::State);
    engine.unpause(&owner()).unwrap();

    buy(&mut engine, buyer(2), ether(6_000), early());
    let event = engine.withdraw_all(&owner()).unwrap();
    assert_eq!(
        event,
        SaleEvent::Withdraw {
            to: owner(),
            amount: ether(10_000)
        }
    );
    assert_eq!(engine.custody_balance(), Wei::ZERO);
    engine.verify_invariants().unwrap();
}

#[test]
fn rate_change_applies_to_later_purchases() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(1), early());
    assert_eq!(engine.set_rate(&owner(), 4_000).unwrap(), SaleEvent::RateChanged { rate: 4_000 });
    buy(&mut engine, buyer(1), ether(1), early());
    assert_eq!(engine.tokens_purchased(&buyer(1)), tokens(3_600 + 4_000));
}

#[test]
fn extending_pioneer_deadline_allows_late_qualification() {
    let mut engine = sale();
    engine
        .set_pioneer_time_end(&owner(), Timestamp::new(OPENING + 2 * DAY))
        .unwrap();
    buy(&mut engine, buyer(1), ether(1), late());
    assert!(engine.is_pioneer(&buyer(1)));
}

#[test]
fn non_owner_cannot_administer() {
    let mut engine = sale();
    let stranger = buyer(5);
    assert_eq!(
        engine.set_hard_cap(&stranger, ether(1)).unwrap_err().kind(),
        ErrorKind::Authorization
    );
    assert_eq!(engine.withdraw(&stranger, ether(1)).unwrap_err().kind(), ErrorKind::Authorization);
    assert_eq!(engine.unpause(&stranger).unwrap_err().kind(), ErrorKind::Authorization);
    assert_eq!(
        engine
            .set_pioneer_time_end(&stranger, Timestamp::EPOCH)
            .unwrap_err()
            .kind(),
        ErrorKind::Authorization
    );
}

#[test]
fn failed_calls_leave_state_unchanged() {
    let mut engine = sale();
    buy(&mut engine, buyer(1), ether(9_999), early());
    let before = engine.clone();

    let attempts = [
        (PurchaseRequest::new(buyer(2), Wei::ZERO), early()),
        (PurchaseRequest::new(buyer(2), Wei::new(10)), early()),
        (PurchaseRequest::new(buyer(2), ether(1)), Timestamp::new(OPENING - 1)),
        (PurchaseRequest::new(buyer(2), ether(1)), Timestamp::new(OPENING + 3 * DAY)),
    ];
    for (request, at) in &attempts {
        assert!(engine.purchase_tokens(request, *at).is_err());
        assert_eq!(engine, before);
    }
    assert!(engine.withdraw(&owner(), ether(10_000)).is_err());
    assert_eq!(engine, before);
}
