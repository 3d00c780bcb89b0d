//! The sale service: one ledger engine behind one async lock.
//!
//! Every call takes the lock for its whole duration, so mutating calls are
//! applied strictly one after another and reads always see a committed state.

use crate::config::SaleConfig;
use crate::event_bus::EventBus;
use crate::ServiceError;
use crowdsale_ledger::{
    AccountEntry, LedgerEngine, LedgerError, LedgerSnapshot, PurchaseReceipt, PurchaseRequest, SaleEvent,
    SaleSummary,
};
use crowdsale_types::{AccountId, Clock, Timestamp, TokenAmount, Wei};
use crowdsale_utils::{format_tokens, format_wei};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct SaleService<C: Clock> {
    engine: Mutex<LedgerEngine>,
    clock: Arc<C>,
    events: EventBus,
    snapshot_path: Option<PathBuf>,
}

impl<C: Clock> SaleService<C> {
    /// Open the sale described by `config`, restoring the configured
    /// snapshot when one exists on disk.
    pub async fn open(config: &SaleConfig, clock: Arc<C>) -> Result<Self, ServiceError> {
        config.validate()?;
        let existing = match &config.snapshot_path {
            Some(path) => tokio::fs::try_exists(path).await?.then_some(path),
            None => None,
        };
        let engine = match existing {
            Some(path) => {
                let engine = load_snapshot(path).await?;
                info!(path = %path.display(), "ledger restored from snapshot");
                engine
            }
            None => LedgerEngine::new(config.owner, config.schedule(), config.params.clone())?,
        };
        let mut service = Self::from_engine(engine, clock);
        service.snapshot_path = config.snapshot_path.clone();
        Ok(service)
    }

    pub fn from_engine(engine: LedgerEngine, clock: Arc<C>) -> Self {
        Self {
            engine: Mutex::new(engine),
            clock,
            events: EventBus::new(),
            snapshot_path: None,
        }
    }

    /// Register a listener. Listeners see every event in commit order.
    pub fn subscribe(&mut self, listener: Box<dyn Fn(&SaleEvent) + Send + Sync>) {
        self.events.subscribe(listener);
        debug!(listeners = self.events.listener_count(), "event listener registered");
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ── Contribution intake ─────────────────────────────────────────────

    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseReceipt, ServiceError> {
        let mut engine = self.engine.lock().await;
        let now = self.clock.now();
        let receipt = engine.purchase_tokens(&request, now).map_err(|e| {
            warn!(payer = %request.payer, amount = %format_wei(request.amount), error = %e, "purchase failed");
            e
        })?;
        info!(
            beneficiary = %receipt.beneficiary,
            tokens = %format_tokens(receipt.tokens),
            raised = %format_wei(engine.total_wei_raised()),
            "purchase committed"
        );
        self.events.emit_all(&receipt.events);
        Ok(receipt)
    }

    // ── Administration ──────────────────────────────────────────────────

    async fn admin(
        &self,
        op: impl FnOnce(&mut LedgerEngine) -> Result<SaleEvent, LedgerError>,
    ) -> Result<SaleEvent, ServiceError> {
        let mut engine = self.engine.lock().await;
        let event = op(&mut engine)?;
        self.events.emit(&event);
        Ok(event)
    }

    pub async fn set_rate(&self, caller: AccountId, rate: u64) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.set_rate(&caller, rate)).await
    }

    pub async fn set_hard_cap(&self, caller: AccountId, hard_cap: Wei) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.set_hard_cap(&caller, hard_cap)).await
    }

    pub async fn set_pioneer_time_end(&self, caller: AccountId, at: Timestamp) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.set_pioneer_time_end(&caller, at)).await
    }

    pub async fn set_min_tokens_purchased(
        &self,
        caller: AccountId,
        minimum: TokenAmount,
    ) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.set_min_tokens_purchased(&caller, minimum)).await
    }

    pub async fn pause(&self, caller: AccountId) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.pause(&caller)).await
    }

    pub async fn unpause(&self, caller: AccountId) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.unpause(&caller)).await
    }

    pub async fn withdraw(&self, caller: AccountId, amount: Wei) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.withdraw(&caller, amount)).await
    }

    pub async fn withdraw_all(&self, caller: AccountId) -> Result<SaleEvent, ServiceError> {
        self.admin(|e| e.withdraw_all(&caller)).await
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Run a read-only closure against a consistent view of the ledger.
    pub async fn read<T>(&self, f: impl FnOnce(&LedgerEngine) -> T) -> T {
        let engine = self.engine.lock().await;
        f(&engine)
    }

    pub async fn account(&self, id: AccountId) -> Option<AccountEntry> {
        self.read(|e| e.account(&id).cloned()).await
    }

    pub async fn balance_of(&self, id: AccountId) -> TokenAmount {
        self.read(|e| e.balance_of(&id)).await
    }

    pub async fn is_pioneer(&self, id: AccountId) -> bool {
        self.read(|e| e.is_pioneer(&id)).await
    }

    pub async fn calc_pioneer_bonus(&self, id: AccountId) -> Result<TokenAmount, ServiceError> {
        Ok(self.read(|e| e.calc_pioneer_bonus(&id)).await?)
    }

    pub async fn summary(&self) -> SaleSummary {
        self.read(LedgerEngine::summary).await
    }

    pub async fn verify_invariants(&self) -> Result<(), ServiceError> {
        Ok(self.read(LedgerEngine::verify_invariants).await?)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Write a verified snapshot of the ledger to `path`.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<LedgerSnapshot, ServiceError> {
        let path = path.as_ref();
        let snapshot = {
            let engine = self.engine.lock().await;
            LedgerSnapshot::create(&engine, self.clock.now())?
        };
        tokio::fs::write(path, snapshot.to_bytes()?).await?;
        info!(path = %path.display(), hash = %snapshot.hash_hex(), "snapshot written");
        Ok(snapshot)
    }

    /// Snapshot to the configured path. `None` when no path is configured.
    pub async fn persist(&self) -> Result<Option<LedgerSnapshot>, ServiceError> {
        match &self.snapshot_path {
            Some(path) => self.save_snapshot(path).await.map(Some),
            None => Ok(None),
        }
    }

    /// The engine, consuming the service.
    pub fn into_engine(self) -> LedgerEngine {
        self.engine.into_inner()
    }
}

/// Read, verify and restore a snapshot written by [`SaleService::save_snapshot`].
pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<LedgerEngine, ServiceError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    let snapshot =
        LedgerSnapshot::from_bytes(&bytes).map_err(|e| ServiceError::Snapshot(e.to_string()))?;
    snapshot
        .into_engine()
        .map_err(|e| ServiceError::Snapshot(e.to_string()))
}
