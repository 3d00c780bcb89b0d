use crowdsale_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// The ledger failure underneath, if this is one.
    pub fn ledger(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger(e) => Some(e),
            _ => None,
        }
    }
}
