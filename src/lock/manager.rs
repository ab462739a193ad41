//! Registry of reference-counted per-key mutexes.

use super::{LockHandle, RegistryKey};
use crate::error::{Error, Result};
use crate::key::LockKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A mutex paired with the number of outstanding acquisitions.
struct LockEntry {
    mutex: Arc<Mutex<()>>,
    count: usize,
}

/// Canonical key → lock entry.
///
/// Every mutation goes through the dashmap entry API, so lookup, insert,
/// increment, decrement and removal of one key are serialized by the shard
/// lock owning that key. The shard lock is only ever held for O(1) map work;
/// the content mutex is locked and unlocked outside of it.
pub(crate) struct LockRegistry<K: RegistryKey> {
    locks: DashMap<K, LockEntry>,
}

impl<K: RegistryKey> LockRegistry<K> {
    fn new() -> Self {
        LockRegistry {
            locks: DashMap::new(),
        }
    }

    /// Register one acquisition of `key` and return its mutex.
    pub(crate) fn checkout(&self, key: &K) -> Arc<Mutex<()>> {
        let mut entry = self.locks.entry(key.clone()).or_insert_with(|| LockEntry {
            mutex: Arc::new(Mutex::new(())),
            count: 0,
        });
        entry.count += 1;
        trace!("Lock checkout for {:?} (holders: {})", key, entry.count);
        Arc::clone(&entry.mutex)
    }

    /// Give back one acquisition of `key`, dropping the entry with the last one.
    pub(crate) fn checkin(&self, key: &K) -> Result<()> {
        match self.locks.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().count <= 1 {
                    occupied.remove();
                    trace!("Lock checkin for {:?} (entry removed)", key);
                } else {
                    let entry = occupied.get_mut();
                    entry.count -= 1;
                    trace!("Lock checkin for {:?} (holders: {})", key, entry.count);
                }
                Ok(())
            }
            Entry::Vacant(_) => Err(Error::IllegalLockState(format!(
                "No lock found for key {:?}",
                key
            ))),
        }
    }

    fn holders(&self, key: &K) -> usize {
        self.locks.get(key).map(|entry| entry.count).unwrap_or(0)
    }

    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Hands out mutual-exclusion locks scoped to application-chosen keys.
///
/// All callers presenting equal keys share one mutex. The registry entry for
/// a key lives exactly as long as some handle holds or waits on it.
/// Cloning the manager shares the registry.
///
/// Every acquisition must be matched by exactly one release. Dropping a
/// locked [`LockHandle`] releases it, so scoped use cannot leak entries.
///
/// # Example
///
/// ```ignore
/// let locks = KeyedLockManager::new();
///
/// let mut first = locks.acquire("A").await;
/// let mut second = locks.lock_for("A");
/// // second.lock().await would wait here until `first` is released
/// locks.release(first)?;
/// second.lock().await;
/// second.unlock()?;
/// assert_eq!(locks.len(), 0);
/// ```
pub struct KeyedLockManager<K: RegistryKey = LockKey> {
    registry: Arc<LockRegistry<K>>,
}

impl KeyedLockManager<LockKey> {
    /// Create a manager keyed by [`LockKey`].
    ///
    /// Managers for other key types are built with `Default`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K: RegistryKey> KeyedLockManager<K> {
    /// Unlocked handle bound to the canonical form of `key`.
    ///
    /// No registry bookkeeping happens until the handle is locked.
    pub fn lock_for(&self, key: impl Into<K>) -> LockHandle<K> {
        LockHandle::new(key.into(), Arc::clone(&self.registry))
    }

    /// Wait for the lock on `key` and return the handle holding it.
    pub async fn acquire(&self, key: impl Into<K>) -> LockHandle<K> {
        let mut handle = self.lock_for(key);
        handle.lock().await;
        handle
    }

    /// Block the current thread until the lock on `key` is held.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_acquire(&self, key: impl Into<K>) -> LockHandle<K> {
        let mut handle = self.lock_for(key);
        handle.blocking_lock();
        handle
    }

    /// Release one acquisition held by `handle`.
    ///
    /// # Errors
    ///
    /// Returns `Error::IllegalLockState` if the handle was issued by another
    /// manager, does not hold its lock, or its key has no registry entry.
    /// A foreign handle is still released against its own registry when it
    /// is dropped.
    pub fn release(&self, mut handle: LockHandle<K>) -> Result<()> {
        if !handle.issued_by(&self.registry) {
            return Err(Error::IllegalLockState(format!(
                "Lock for key {:?} was not issued by this manager",
                handle.key()
            )));
        }
        handle.unlock()
    }

    /// Number of outstanding acquisitions (holders plus waiters) for `key`.
    pub fn holders(&self, key: &K) -> usize {
        self.registry.holders(key)
    }

    /// Number of keys with at least one outstanding acquisition.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether no key is held or waited on.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: RegistryKey> Default for KeyedLockManager<K> {
    fn default() -> Self {
        KeyedLockManager {
            registry: Arc::new(LockRegistry::new()),
        }
    }
}

impl<K: RegistryKey> Clone for KeyedLockManager<K> {
    fn clone(&self) -> Self {
        KeyedLockManager {
            registry: Arc::clone(&self.registry),
        }
    }
}
