//! # SledStore — Persistent Ledger Storage
//!
//! The on-disk [`LedgerStore`] backend, built on sled's embedded key-value
//! store. All ledger documents live in one named tree:
//!
//! | Tree     | Key                     | Value            |
//! |----------|-------------------------|------------------|
//! | `ledger` | document key (UTF-8)    | JSON bytes       |
//!
//! ## Atomicity
//!
//! - `create` is a `compare_and_swap` from "absent" to the new value, so two
//!   racing creates of the same key produce exactly one winner.
//! - Counter `update` goes through `update_and_fetch`, which sled retries
//!   internally until its CAS lands. Increments are never lost.
//!
//! Nothing else is needed. There is no overwrite path at all.

use async_trait::async_trait;
use serde_json::Value;
use sled::{Db, Tree};
use std::path::Path;

use super::{LedgerStore, StoreError, StoreResult, UpdateMode};

/// Name of the tree holding every ledger document.
const LEDGER_TREE: &str = "ledger";

/// Persistent storage engine for the ledger.
///
/// sled is thread-safe; `SledStore` is `Clone` and can be shared across
/// tasks via `Arc` without external locking.
#[derive(Debug, Clone)]
pub struct SledStore {
    /// The underlying sled database handle.
    db: Db,
    /// Ledger documents keyed by their scheme key.
    docs: Tree,
}

impl SledStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary store, deleted when the last handle drops.
    ///
    /// Ideal for tests: no filesystem cleanup needed.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let docs = db.open_tree(LEDGER_TREE)?;
        Ok(Self { db, docs })
    }

    /// Flush dirty pages to disk. Call on shutdown.
    pub async fn flush(&self) -> StoreResult<usize> {
        Ok(self.db.flush_async().await?)
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait]
impl LedgerStore for SledStore {
    async fn create(&self, key: &str, value: Value) -> StoreResult<()> {
        let bytes = serde_json::to_vec(&value)?;
        self.docs
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::KeyAlreadyExists(key.to_string()))
    }

    async fn read(&self, key: &str) -> StoreResult<Value> {
        let bytes = self
            .docs
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn update(&self, key: &str, delta: u64, mode: UpdateMode) -> StoreResult<u64> {
        if mode != UpdateMode::Counter {
            return Err(StoreError::Unsupported(mode));
        }

        // sled may run the closure more than once; the flag reflects the
        // final attempt.
        let mut malformed = false;
        let updated = self.docs.update_and_fetch(key.as_bytes(), |old| {
            let old = old?;
            match serde_json::from_slice::<u64>(old)
                .ok()
                .and_then(|n| n.checked_add(delta))
            {
                Some(next) => {
                    malformed = false;
                    Some(next.to_string().into_bytes())
                }
                None => {
                    malformed = true;
                    Some(old.to_vec())
                }
            }
        })?;

        let bytes = updated.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if malformed {
            return Err(StoreError::Serialization(format!("{key} is not a counter")));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
