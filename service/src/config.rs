//! Sale configuration with TOML file support.

use crate::logging::LogFormat;
use crate::ServiceError;
use crowdsale_types::{AccountId, SaleParams, SaleSchedule, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one crowdsale.
///
/// Can be loaded from a TOML file via [`SaleConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Account allowed to administer the sale and withdraw funds.
    #[serde(default = "default_owner")]
    pub owner: AccountId,

    /// First second (unix time) purchases are accepted.
    #[serde(default = "default_opening_time")]
    pub opening_time: Timestamp,

    /// Last second (unix time) purchases are accepted.
    #[serde(default = "default_closing_time")]
    pub closing_time: Timestamp,

    /// Pioneer qualification must happen strictly before this time.
    #[serde(default = "default_pioneer_time_end")]
    pub pioneer_time_end: Timestamp,

    /// Where the ledger snapshot is persisted, if anywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Economic constants. Kept last so it serializes as a trailing table.
    #[serde(default)]
    pub params: SaleParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

const DAY: u64 = 86_400;

fn default_owner() -> AccountId {
    AccountId::from_low_u64(1)
}

fn default_opening_time() -> Timestamp {
    Timestamp::new(DAY)
}

fn default_closing_time() -> Timestamp {
    Timestamp::new(3 * DAY)
}

fn default_pioneer_time_end() -> Timestamp {
    Timestamp::new(2 * DAY)
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SaleConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(s).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ServiceError> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn schedule(&self) -> SaleSchedule {
        SaleSchedule::new(self.opening_time, self.closing_time, self.pioneer_time_end)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        self.params
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        self.schedule()
            .validate()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        if self.owner.is_zero() {
            return Err(ServiceError::Config("owner must not be the zero address".into()));
        }
        Ok(())
    }
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            opening_time: default_opening_time(),
            closing_time: default_closing_time(),
            pioneer_time_end: default_pioneer_time_end(),
            snapshot_path: None,
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            params: SaleParams::default(),
        }
    }
}
