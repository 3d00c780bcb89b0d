//! Crowdsale ledger engine.
//!
//! Accepts contributions, enforces the minimum purchase and the hard cap,
//! tracks funding stages, and credits referral and pioneer bonuses. Every
//! mutating call is all or nothing.

pub mod account;
pub mod bonus;
pub mod controls;
pub mod engine;
pub mod error;
pub mod event;
pub mod math;
pub mod pioneer;
pub mod snapshot;
pub mod stage;

pub use account::{AccountEntry, PioneerStatus};
pub use bonus::{calc_pioneer_bonus, pool_share, ReferralBonus};
pub use controls::{AccessControl, SaleControls};
pub use engine::{LedgerEngine, PurchasePlan, PurchaseReceipt, PurchaseRequest, SaleSummary};
pub use error::{ErrorKind, LedgerError};
pub use event::SaleEvent;
pub use pioneer::PioneerRegistry;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use stage::{stage_of, stage_range, stage_slices, StageSlice, StageSnapshot};
