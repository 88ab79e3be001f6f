use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

// ============================================================================
// Keyed Async Mutex
// ============================================================================
//
// One async mutex per key, created on demand. Holders of different keys never
// contend; holders of the same key run one at a time in FIFO order (tokio's
// Mutex is fair). Idle entries are pruned on the next acquisition.
//
// ============================================================================

pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`; released when the guard drops
    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map holds an idle lock
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.clone()).or_default().clone()
        };

        lock.lock_owned().await
    }

    /// Number of keys currently held or awaited
    pub async fn active_keys(&self) -> usize {
        self.locks
            .lock()
            .await
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let key = "a".to_string();

        let guard = locks.lock(&key).await;

        let locks_clone = locks.clone();
        let key_clone = key.clone();
        let waiter = tokio::spawn(async move {
            let _guard = locks_clone.lock(&key_clone).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let locks = KeyedLocks::<String>::new();

        let _a = locks.lock(&"a".to_string()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(&"b".to_string())).await;

        assert!(b.is_ok());
        assert_eq!(locks.active_keys().await, 2);
    }

    #[tokio::test]
    async fn test_idle_keys_are_pruned() {
        let locks = KeyedLocks::<u32>::new();

        for key in 0..10 {
            let _guard = locks.lock(&key).await;
        }
        let _held = locks.lock(&99).await;

        assert_eq!(locks.locks.lock().await.len(), 1);
        assert_eq!(locks.active_keys().await, 1);
    }
}
