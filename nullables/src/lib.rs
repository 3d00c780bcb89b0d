//! Nullable infrastructure for deterministic testing.
//!
//! The ledger never reads the wall clock itself; callers pass a [`Clock`]
//! (`crowdsale_types::Clock`). This crate provides a test-friendly
//! implementation that:
//! - Returns deterministic values
//! - Can be controlled programmatically
//!
//! Usage: swap `SystemClock` for `NullClock` in tests and simulations.
//!
//! [`Clock`]: crowdsale_types::Clock

pub mod clock;

pub use clock::NullClock;
