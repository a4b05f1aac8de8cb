//! Per-key serialization primitive used by the orchestrator to serialize
//! inbound messages per user and handoff writes per task (`spec.md` §5).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

/// Lazily-created, per-key async mutex. Keys are never removed once
/// created: the expected key cardinality (users, task ids) is bounded by
/// the deployment's working set, not by request volume, so leaking one
/// `Arc<AsyncMutex<()>>` per key is an acceptable tradeoff against the
/// complexity of reference-counted eviction.
pub struct KeyedMutex<K> {
    locks: SyncMutex<HashMap<K, Arc<AsyncMutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedMutex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> KeyedMutex<K> {
    pub fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: &K) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(key.clone()).or_default().clone()
    }

    /// Acquire the lock for `key`, run `f`, release. Calls for distinct
    /// keys never block each other.
    pub async fn with_lock<F, Fut, T>(&self, key: &K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let lock = self.entry(key);
        let _guard = lock.lock().await;
        f().await
    }

    pub fn known_keys(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn distinct_keys_do_not_serialize() {
        let km: KeyedMutex<String> = KeyedMutex::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let a = km.with_lock(&"user-a".to_string(), || async {
            counter.fetch_add(1, Ordering::SeqCst)
        });
        let b = km.with_lock(&"user-b".to_string(), || async {
            counter.fetch_add(1, Ordering::SeqCst)
        });
        let (_, _) = tokio::join!(a, b);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(km.known_keys(), 2);
    }

    #[tokio::test]
    async fn same_key_reuses_the_same_lock() {
        let km: KeyedMutex<String> = KeyedMutex::new();
        km.with_lock(&"user-a".to_string(), || async {}).await;
        km.with_lock(&"user-a".to_string(), || async {}).await;
        assert_eq!(km.known_keys(), 1);
    }
}
