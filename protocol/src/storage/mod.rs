//! # Storage Module
//!
//! The ledger sits on top of any key-value store that can do three things:
//!
//! ```text
//! create(key, value)        fails with KeyAlreadyExists if the key is taken
//! read(key)                 fails with NotFound if the key is absent
//! update(key, delta, mode)  Counter mode: atomic increment, returns new value
//! ```
//!
//! That's the whole contract. No overwrite, no delete, no transactions.
//! Create-if-absent and atomic increment are the only coordination primitives
//! the services rely on, so any backend offering those two is enough.
//!
//! ## Layout
//!
//! ```text
//! keys.rs    — the keying scheme (one function per document kind)
//! memory.rs  — MemoryStore, a concurrent in-process map
//! db.rs      — SledStore, embedded persistence on sled
//! ```
//!
//! Every value is a JSON document. Counters are plain JSON integers.

pub mod db;
pub mod keys;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub use db::SledStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`LedgerStore`] backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("key already exists: {0}")]
    KeyAlreadyExists(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("update mode {0} is not supported")]
    Unsupported(UpdateMode),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Update Modes
// ---------------------------------------------------------------------------

/// How `update` should treat the stored value.
///
/// Only [`UpdateMode::Counter`] is implemented. The rest exist so that a
/// request for them is rejected explicitly instead of silently overwriting
/// immutable history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Atomic increment, returns the post-increment value.
    Counter,
    Upsert,
    Replace,
    Remove,
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateMode::Counter => "counter",
            UpdateMode::Upsert => "upsert",
            UpdateMode::Replace => "replace",
            UpdateMode::Remove => "remove",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Store Contract
// ---------------------------------------------------------------------------

/// The key-value contract every backend implements.
///
/// Implementations must make `create` atomic with respect to concurrent
/// creates of the same key, and `update` in counter mode atomic with respect
/// to concurrent increments.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert `value` under `key`. Fails if the key exists.
    async fn create(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Fetch the document under `key`. Fails if absent.
    async fn read(&self, key: &str) -> StoreResult<Value>;

    /// Apply `delta` to the counter under `key` and return the new value.
    /// Fails if the key is absent or `mode` isn't [`UpdateMode::Counter`].
    async fn update(&self, key: &str, delta: u64, mode: UpdateMode) -> StoreResult<u64>;
}

// ---------------------------------------------------------------------------
// Typed Helpers
// ---------------------------------------------------------------------------

/// Serialize `value` and create it under `key`.
pub async fn create_json<S, T>(store: &S, key: &str, value: &T) -> StoreResult<()>
where
    S: LedgerStore + ?Sized,
    T: Serialize + ?Sized,
{
    store.create(key, serde_json::to_value(value)?).await
}

/// Read `key` and deserialize it.
pub async fn read_json<S, T>(store: &S, key: &str) -> StoreResult<T>
where
    S: LedgerStore + ?Sized,
    T: DeserializeOwned,
{
    let value = store.read(key).await?;
    Ok(serde_json::from_value(value)?)
}

/// Create a counter document holding `initial`.
pub async fn create_counter<S>(store: &S, key: &str, initial: u64) -> StoreResult<()>
where
    S: LedgerStore + ?Sized,
{
    store.create(key, Value::from(initial)).await
}

/// Current value of a counter.
pub async fn read_counter<S>(store: &S, key: &str) -> StoreResult<u64>
where
    S: LedgerStore + ?Sized,
{
    read_json(store, key).await
}

/// Increment a counter by one and return the new value.
pub async fn increment<S>(store: &S, key: &str) -> StoreResult<u64>
where
    S: LedgerStore + ?Sized,
{
    store.update(key, 1, UpdateMode::Counter).await
}
