//! In-process [`LedgerStore`] backed by a `DashMap`.
//!
//! Shard-level locking in `DashMap` makes `entry()` an atomic
//! check-and-insert and `get_mut()` an atomic read-modify-write, which is
//! all the contract asks for. Nothing survives a restart.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

use super::{LedgerStore, StoreError, StoreResult, UpdateMode};

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents held.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether a document exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.docs.contains_key(key)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn create(&self, key: &str, value: Value) -> StoreResult<()> {
        match self.docs.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::KeyAlreadyExists(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    async fn read(&self, key: &str) -> StoreResult<Value> {
        self.docs
            .get(key)
            .map(|doc| doc.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn update(&self, key: &str, delta: u64, mode: UpdateMode) -> StoreResult<u64> {
        if mode != UpdateMode::Counter {
            return Err(StoreError::Unsupported(mode));
        }

        let mut doc = self
            .docs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let current = doc
            .as_u64()
            .ok_or_else(|| StoreError::Serialization(format!("{key} is not a counter")))?;
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Backend(format!("counter {key} overflowed")))?;
        *doc = Value::from(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn create_refuses_existing_key() {
        let store = MemoryStore::new();
        store.create("k", json!(1)).await.unwrap();
        assert_eq!(
            store.create("k", json!(2)).await,
            Err(StoreError::KeyAlreadyExists("k".into()))
        );
        assert_eq!(store.read("k").await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn read_missing_key_fails() {
        let store = MemoryStore::new();
        assert_eq!(
            store.read("absent").await,
            Err(StoreError::NotFound("absent".into()))
        );
    }

    #[tokio::test]
    async fn update_requires_existing_counter() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update("c", 1, UpdateMode::Counter).await,
            Err(StoreError::NotFound(_))
        ));

        store.create("doc", json!({"not": "a counter"})).await.unwrap();
        assert!(matches!(
            store.update("doc", 1, UpdateMode::Counter).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn non_counter_modes_are_rejected() {
        let store = MemoryStore::new();
        store.create("c", json!(0)).await.unwrap();
        for mode in [UpdateMode::Upsert, UpdateMode::Replace, UpdateMode::Remove] {
            assert_eq!(
                store.update("c", 1, mode).await,
                Err(StoreError::Unsupported(mode))
            );
        }
        assert_eq!(store.read("c").await.unwrap(), json!(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        store.create("c", json!(0)).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.update("c", 1, UpdateMode::Counter).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.read("c").await.unwrap(), json!(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.create("k", json!(i)).await })
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
