//! Events emitted by successful ledger calls, in the order they happened.

use crowdsale_types::{AccountId, Timestamp, TokenAmount, Wei};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SaleEvent {
    /// Tokens were issued for an accepted contribution.
    TokenPurchase {
        payer: AccountId,
        beneficiary: AccountId,
        wei: Wei,
        tokens: TokenAmount,
        /// Wei above the hard cap, returned to the payer.
        refund: Wei,
    },
    /// A qualified referral credited both sides.
    ReferralBonus {
        referrer: AccountId,
        beneficiary: AccountId,
        sender_bonus: TokenAmount,
        receiver_bonus: TokenAmount,
    },
    PioneerQualified {
        account: AccountId,
        at: Timestamp,
    },
    /// A stage became fully funded and its pool was paid out.
    StageClosed {
        stage: u32,
        pool: TokenAmount,
        distributed: TokenAmount,
        pioneers: usize,
    },
    RateChanged {
        rate: u64,
    },
    HardCapChanged {
        hard_cap: Wei,
    },
    MinimumPurchaseChanged {
        min_tokens_purchased: TokenAmount,
    },
    PioneerTimeEndChanged {
        pioneer_time_end: Timestamp,
    },
    Pause,
    Unpause,
    Withdraw {
        to: AccountId,
        amount: Wei,
    },
}

impl SaleEvent {
    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TokenPurchase { .. } => "token_purchase",
            Self::ReferralBonus { .. } => "referral_bonus",
            Self::PioneerQualified { .. } => "pioneer_qualified",
            Self::StageClosed { .. } => "stage_closed",
            Self::RateChanged { .. } => "rate_changed",
            Self::HardCapChanged { .. } => "hard_cap_changed",
            Self::MinimumPurchaseChanged { .. } => "minimum_purchase_changed",
            Self::PioneerTimeEndChanged { .. } => "pioneer_time_end_changed",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Withdraw { .. } => "withdraw",
        }
    }
}
