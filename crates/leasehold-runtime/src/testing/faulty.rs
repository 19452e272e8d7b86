use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use leasehold_core::error::{LeaseholdError, Result};
use leasehold_core::lock::{Fingerprint, Lock, LockFuture, LockRecord};

/// Injected faults, shared between a [`FaultyLock`] and its test.
#[derive(Default)]
struct Faults {
    latency: Mutex<Duration>,
    partitioned: AtomicBool,
    fail_next: AtomicU32,
    calls: AtomicU32,
}

/// Wraps a lock with injectable latency and failures.
///
/// Clones share their faults, so a test keeps one clone to steer the copy it
/// handed to an elector.
#[derive(Clone)]
pub struct FaultyLock<L: Lock + Clone> {
    inner: L,
    faults: Arc<Faults>,
}

impl<L: Lock + Clone> FaultyLock<L> {
    /// Wrap a lock with no faults enabled.
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Delay every operation by `latency` before it reaches the store.
    pub fn set_latency(&self, latency: Duration) {
        *self.faults.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Fail every operation with `Transient` until healed.
    pub fn partition(&self) {
        self.faults.partitioned.store(true, Ordering::SeqCst);
    }

    /// Undo [`FaultyLock::partition`].
    pub fn heal(&self) {
        self.faults.partitioned.store(false, Ordering::SeqCst);
    }

    /// Fail the next `count` operations with `Transient`.
    pub fn fail_next(&self, count: u32) {
        self.faults.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of operations attempted so far.
    pub fn calls(&self) -> u32 {
        self.faults.calls.load(Ordering::SeqCst)
    }

    async fn inject(&self) -> Result<()> {
        self.faults.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.faults.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.faults.partitioned.load(Ordering::SeqCst) {
            return Err(LeaseholdError::Transient("injected partition".to_string()));
        }

        let consumed = self
            .faults
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(LeaseholdError::Transient("injected failure".to_string()));
        }

        Ok(())
    }
}

impl<L: Lock + Clone> Lock for FaultyLock<L> {
    fn get(&self) -> LockFuture<'_, (LockRecord, Fingerprint)> {
        Box::pin(async move {
            self.inject().await?;
            self.inner.get().await
        })
    }

    fn create(&self, record: LockRecord) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            self.inject().await?;
            self.inner.create(record).await
        })
    }

    fn update(&self, record: LockRecord, fingerprint: Fingerprint) -> LockFuture<'_, Fingerprint> {
        Box::pin(async move {
            self.inject().await?;
            self.inner.update(record, fingerprint).await
        })
    }

    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryLockStore;

    #[tokio::test]
    async fn test_fail_next_is_consumed() {
        let store = MemoryLockStore::new();
        let lock = FaultyLock::new(store.lock("ns", "e", "a"));
        lock.fail_next(2);

        assert!(matches!(lock.get().await, Err(LeaseholdError::Transient(_))));
        assert!(matches!(lock.get().await, Err(LeaseholdError::Transient(_))));
        assert!(matches!(lock.get().await, Err(LeaseholdError::NotFound(_))));
        assert_eq!(lock.calls(), 3);
    }

    #[tokio::test]
    async fn test_partition_until_healed() {
        let store = MemoryLockStore::new();
        let lock = FaultyLock::new(store.lock("ns", "e", "a"));
        let steer = lock.clone();

        steer.partition();
        assert!(matches!(lock.get().await, Err(LeaseholdError::Transient(_))));
        steer.heal();
        assert!(matches!(lock.get().await, Err(LeaseholdError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_operations() {
        let store = MemoryLockStore::new();
        let lock = FaultyLock::new(store.lock("ns", "e", "a"));
        lock.set_latency(Duration::from_secs(3));

        let started = tokio::time::Instant::now();
        let _ = lock.get().await;
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
