use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes addressed by key.
///
/// Holding the guard returned by [`KeyedLocks::acquire`] excludes every other
/// holder of the same key for as long as it lives; different keys never
/// contend. Entries are dropped from the registry once no guard or waiter
/// references them, so keys can be as fine-grained as a single slot.
pub struct KeyedLocks<K> {
    entries: StdMutex<HashMap<K, Weak<Mutex<()>>>>,
}

/// Exclusive hold on one key. Released on drop.
pub struct KeyedGuard {
    _guard: OwnedMutexGuard<()>,
}

impl<K> KeyedLocks<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, key: K) -> KeyedGuard {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get(&key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    entries.retain(|_, weak| weak.strong_count() > 0);
                    let lock = Arc::new(Mutex::new(()));
                    entries.insert(key, Arc::downgrade(&lock));
                    lock
                }
            }
        };

        KeyedGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|weak| weak.strong_count() > 0).count()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
