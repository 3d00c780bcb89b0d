//! Crowdsale service.
//!
//! Wraps the ledger engine in a single async lock so every call is applied
//! atomically and in order, and adds the pieces a running sale needs around
//! it: TOML configuration, structured logging, an event bus and snapshot
//! persistence.

pub mod config;
pub mod error;
pub mod event_bus;
pub mod logging;
pub mod service;

pub use config::SaleConfig;
pub use error::ServiceError;
pub use event_bus::EventBus;
pub use logging::{init_logging, LogFormat};
pub use service::{load_snapshot, SaleService};
