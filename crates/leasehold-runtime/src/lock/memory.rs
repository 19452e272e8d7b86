//! Process-local lock store.
//!
//! Gives every candidate in one process a linearizable view of the same
//! records, which is what the election needs from a real store. Used by
//! tests and single-node deployments.

use std::collections::HashMap;
use std::sync::Arc;

use leasehold_core::error::{LeaseholdError, Result};
use leasehold_core::lock::{Fingerprint, Lock, LockFuture, LockRecord};
use tokio::sync::Mutex;

/// Stored record plus its version counter.
struct Entry {
    record: LockRecord,
    version: i64,
}

/// Shared in-memory store of lock records keyed by `namespace/name`.
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    records: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryLockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A lock handle for one candidate.
    pub fn lock(
        &self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        identity: impl Into<String>,
    ) -> MemoryLock {
        let namespace = namespace.into();
        let name = name.into();
        MemoryLock {
            store: self.clone(),
            key: key(&namespace, &name),
            identity: identity.into(),
        }
    }

    /// Read a record directly, bypassing any lock handle.
    pub async fn record(&self, namespace: &str, name: &str) -> Option<LockRecord> {
        self.records
            .lock()
            .await
            .get(&key(namespace, name))
            .map(|e| e.record.clone())
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

/// One candidate's handle on a record in a [`MemoryLockStore`].
#[derive(Clone)]
pub struct MemoryLock {
    store: MemoryLockStore,
    key: String,
    identity: String,
}

impl Lock for MemoryLock {
    fn get(&self) -> LockFuture<'_, (LockRecord, Fingerprint)> {
        Box::pin(async move {
            let records = self.store.records.lock().await;
            records
                .get(&self.key)
                .map(|e| (e.record.clone(), Fingerprint::from(e.version)))
                .ok_or_else(|| LeaseholdError::NotFound(self.key.clone()))
        })
    }

    fn create(&self, record: LockRecord) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            let mut records = self.store.records.lock().await;
            if records.contains_key(&self.key) {
                return Err(LeaseholdError::AlreadyExists(self.key.clone()));
            }
            records.insert(self.key.clone(), Entry { record, version: 1 });
            Ok(Fingerprint::from(1))
        })
    }

    fn update(&self, record: LockRecord, fingerprint: Fingerprint) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            let mut records = self.store.records.lock().await;
            let entry = records
                .get_mut(&self.key)
                .ok_or_else(|| LeaseholdError::NotFound(self.key.clone()))?;

            if Fingerprint::from(entry.version) != fingerprint {
                return Err(LeaseholdError::Conflict(self.key.clone()));
            }

            entry.record = record;
            entry.version += 1;
            Ok(Fingerprint::from(entry.version))
        })
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn describe(&self) -> String {
        self.key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_get_missing_record() {
        let store = MemoryLockStore::new();
        let lock = store.lock("ns", "election", "a");
        assert!(matches!(lock.get().await, Err(LeaseholdError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_second_create_loses() {
        let store = MemoryLockStore::new();
        let a = store.lock("ns", "election", "a");
        let b = store.lock("ns", "election", "b");

        a.create(LockRecord::new_held("a", 10, Utc::now())).await.unwrap();
        let err = b.create(LockRecord::new_held("b", 10, Utc::now())).await;
        assert!(matches!(err, Err(LeaseholdError::AlreadyExists(_))));

        let (record, _) = b.get().await.unwrap();
        assert!(record.is_held_by("a"));
    }

    #[tokio::test]
    async fn test_stale_fingerprint_conflicts() {
        let store = MemoryLockStore::new();
        let a = store.lock("ns", "election", "a");
        let b = store.lock("ns", "election", "b");

        let now = Utc::now();
        a.create(LockRecord::new_held("a", 10, now)).await.unwrap();
        let (record, fp) = a.get().await.unwrap();

        // Both candidates race on the same fingerprint; exactly one wins.
        let first = b.update(record.claimed_by("b", 10, now), fp.clone()).await;
        let second = a.update(record.claimed_by("a", 10, now), fp).await;
        assert!(first.is_ok());
        assert!(matches!(second, Err(LeaseholdError::Conflict(_))));

        let (record, fp) = a.get().await.unwrap();
        assert!(record.is_held_by("b"));
        assert_eq!(fp, first.unwrap());
    }

    #[tokio::test]
    async fn test_elections_are_isolated() {
        let store = MemoryLockStore::new();
        store
            .lock("ns", "one", "a")
            .create(LockRecord::new_held("a", 10, Utc::now()))
            .await
            .unwrap();

        assert!(store.record("ns", "one").await.is_some());
        assert!(store.record("ns", "two").await.is_none());
        assert!(store.record("other", "one").await.is_none());
        assert_eq!(store.lock("ns", "one", "a").describe(), "ns/one");
    }
}
