use crowdsale_types::{AccountId, Timestamp, TokenAmount, Wei};
use thiserror::Error;

/// Broad classes of ledger failure.
///
/// Every failure is detected before any state is touched, so a failed call
/// leaves the ledger exactly as it was.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input: zero amount, purchase below the minimum, bad parameter.
    Validation,
    /// Caller lacks permission for a privileged operation.
    Authorization,
    /// The sale is not in a state that allows the call.
    State,
    /// Not enough custodied funds.
    Resource,
    /// Checked arithmetic overflowed.
    Arithmetic,
    /// Internal consistency or snapshot integrity failure.
    Integrity,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("first purchase issues {tokens}, below the minimum of {minimum}")]
    BelowMinimumPurchase {
        tokens: TokenAmount,
        minimum: TokenAmount,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{caller} is not the sale owner")]
    Unauthorized { caller: AccountId },

    #[error("sale is not open at {now}")]
    SaleNotOpen { now: Timestamp },

    #[error("sale is paused")]
    SalePaused,

    #[error("sale is already paused")]
    AlreadyPaused,

    #[error("sale is not paused")]
    NotPaused,

    #[error("hard cap of {hard_cap} already reached")]
    HardCapReached { hard_cap: Wei },

    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Wei, available: Wei },

    #[error("arithmetic overflow in ledger computation")]
    Overflow,

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::BelowMinimumPurchase { .. } | Self::InvalidParameter(_) => {
                ErrorKind::Validation
            }
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::SaleNotOpen { .. }
            | Self::SalePaused
            | Self::AlreadyPaused
            | Self::NotPaused
            | Self::HardCapReached { .. } => ErrorKind::State,
            Self::InsufficientFunds { .. } => ErrorKind::Resource,
            Self::Overflow => ErrorKind::Arithmetic,
            Self::InvariantViolation(_) | Self::Snapshot(_) => ErrorKind::Integrity,
        }
    }
}
