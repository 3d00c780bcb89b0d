//! Ledger snapshots: the whole engine state at a point in time.
//!
//! A snapshot lets a service restart without replaying every purchase. The
//! hash is Blake2b-256 over the bincode encoding of the engine, so any
//! tampering with the stored state is detected on load.

use crate::engine::LedgerEngine;
use crate::error::LedgerError;
use crowdsale_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Snapshot version for compatibility.
    pub version: u32,
    pub taken_at: Timestamp,
    /// Blake2b-256 of the encoded `state`.
    pub hash: [u8; 32],
    pub state: LedgerEngine,
}

impl LedgerSnapshot {
    pub fn create(engine: &LedgerEngine, taken_at: Timestamp) -> Result<Self, LedgerError> {
        let state = engine.clone();
        let hash = compute_hash(&state)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            hash,
            state,
        })
    }

    /// Whether the stored hash still matches the state.
    pub fn verify(&self) -> bool {
        compute_hash(&self.state).is_ok_and(|hash| hash == self.hash)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Serialize the snapshot to bytes (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        bincode::serialize(self).map_err(|e| LedgerError::Snapshot(e.to_string()))
    }

    /// Deserialize and verify a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| LedgerError::Snapshot(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(LedgerError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if !snapshot.verify() {
            return Err(LedgerError::Snapshot("hash mismatch".into()));
        }
        Ok(snapshot)
    }

    /// The restored engine, after checking its invariants.
    pub fn into_engine(self) -> Result<LedgerEngine, LedgerError> {
        self.state.verify_invariants()?;
        Ok(self.state)
    }
}

fn compute_hash(state: &LedgerEngine) -> Result<[u8; 32], LedgerError> {
    use blake2::digest::consts::U32;
    use blake2::{Blake2b, Digest};

    let encoded = bincode::serialize(state).map_err(|e| LedgerError::Snapshot(e.to_string()))?;
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(&encoded);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}
