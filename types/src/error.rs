//! Top-level error type shared across crates.

use thiserror::Error;

/// Errors raised while building or parsing the fundamental types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrowdsaleError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount does not fit in 128 bits")]
    AmountOverflow,

    #[error("invalid account id: {0}")]
    InvalidAddress(String),

    #[error("invalid sale parameters: {0}")]
    InvalidParams(String),
}
