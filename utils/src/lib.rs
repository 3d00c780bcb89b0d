//! Shared utilities for the crowdsale ledger.

pub mod logging;
pub mod units;

pub use logging::init_tracing;
pub use units::{format_tokens, format_units, format_wei};
