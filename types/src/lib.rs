//! Fundamental types for the pioneer crowdsale ledger.
//!
//! This crate defines the value types shared across every other crate in the workspace:
//! account identifiers, wei and token amounts, timestamps, and the sale parameters.

pub mod address;
pub mod amount;
pub mod error;
pub mod params;
pub mod time;

pub use address::AccountId;
pub use amount::{TokenAmount, Wei, TOKEN_UNIT, WEI_PER_ETHER};
pub use error::CrowdsaleError;
pub use params::{SaleParams, SaleSchedule, MAX_STAGES_LIMIT};
pub use time::{Clock, SystemClock, Timestamp};
