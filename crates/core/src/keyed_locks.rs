//! Per-key async mutual exclusion.
//!
//! A slot exists only while some task holds or awaits it; the last lease to
//! drop removes the slot, so the map stays as large as the set of keys in
//! use rather than every key ever seen.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::lock::Mutex as AsyncMutex;
use parking_lot::Mutex;

pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` while holding the lock for `key`.
    pub async fn with_lock<F, T>(&self, key: K, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let lease = self.lease(key);
        let _guard = lease.slot.lock().await;
        fut.await
    }

    /// Keys that currently have a holder or a waiter.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }

    fn lease(&self, key: K) -> Lease<'_, K> {
        let slot = Arc::clone(self.slots.lock().entry(key.clone()).or_default());
        Lease { locks: self, key, slot }
    }
}

struct Lease<'a, K: Eq + Hash> {
    locks: &'a KeyedLocks<K>,
    key: K,
    slot: Arc<AsyncMutex<()>>,
}

impl<K: Eq + Hash> Drop for Lease<'_, K> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock();
        // the map and this lease are the only owners left
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
