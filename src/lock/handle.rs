//! Capability-restricted lock handle.

use super::manager::LockRegistry;
use super::{CacheLock, RegistryKey};
use crate::error::{Error, Result};
use crate::key::LockKey;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock on one key, issued by a [`KeyedLockManager`](super::KeyedLockManager).
///
/// A handle holds at most one acquisition at a time. Locking a handle that
/// already holds its lock is a no-op; unlocking one that does not is an
/// `IllegalLockState` error. Dropping a locked handle releases it.
///
/// Only unconditional acquisition is supported. [`CacheLock::try_lock`],
/// [`CacheLock::try_lock_for`] and [`CacheLock::lock_interruptibly`] fail with
/// `UnsupportedOperation`.
pub struct LockHandle<K: RegistryKey = LockKey> {
    key: K,
    registry: Arc<LockRegistry<K>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: RegistryKey> LockHandle<K> {
    pub(crate) fn new(key: K, registry: Arc<LockRegistry<K>>) -> Self {
        LockHandle {
            key,
            registry,
            guard: None,
        }
    }

    pub(crate) fn issued_by(&self, registry: &Arc<LockRegistry<K>>) -> bool {
        Arc::ptr_eq(&self.registry, registry)
    }

    /// Canonical key this handle locks.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether this handle currently holds its lock.
    pub fn is_locked(&self) -> bool {
        self.guard.is_some()
    }

    /// Wait until this handle holds the lock.
    ///
    /// Cancel safe: dropping the future before it completes gives back the
    /// registry count it took.
    pub async fn lock(&mut self) {
        if self.guard.is_some() {
            return;
        }

        let pending = PendingAcquire::checkout(&self.registry, &self.key);
        let guard = Arc::clone(&pending.mutex).lock_owned().await;
        pending.complete();

        debug!("✓ Lock acquired for {:?}", self.key);
        self.guard = Some(guard);
    }

    /// Block the current thread until this handle holds the lock.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async runtime.
    pub fn blocking_lock(&mut self) {
        if self.guard.is_some() {
            return;
        }

        let pending = PendingAcquire::checkout(&self.registry, &self.key);
        let guard = Arc::clone(&pending.mutex).blocking_lock_owned();
        pending.complete();

        debug!("✓ Lock acquired for {:?} (blocking)", self.key);
        self.guard = Some(guard);
    }

    /// Release the lock held by this handle.
    ///
    /// The registry count is given back before the mutex is unlocked.
    ///
    /// # Errors
    ///
    /// Returns `Error::IllegalLockState` if the handle does not hold its lock
    /// or the registry has no entry for the key.
    pub fn unlock(&mut self) -> Result<()> {
        let guard = self.guard.take().ok_or_else(|| {
            Error::IllegalLockState(format!(
                "Lock for key {:?} is not held by this handle",
                self.key
            ))
        })?;

        self.registry.checkin(&self.key)?;
        drop(guard);

        debug!("✓ Lock released for {:?}", self.key);
        Ok(())
    }
}

impl<K: RegistryKey> Drop for LockHandle<K> {
    fn drop(&mut self) {
        if self.guard.is_some() {
            if let Err(e) = self.unlock() {
                warn!("⚠ Failed to release dropped lock: {}", e);
            }
        }
    }
}

impl<K: RegistryKey> CacheLock for LockHandle<K> {
    fn lock(&mut self) -> impl Future<Output = ()> + Send {
        LockHandle::lock(self)
    }

    fn blocking_lock(&mut self) {
        LockHandle::blocking_lock(self)
    }

    fn unlock(&mut self) -> Result<()> {
        LockHandle::unlock(self)
    }

    fn is_locked(&self) -> bool {
        LockHandle::is_locked(self)
    }
}

/// Registry count taken by an acquisition that is still waiting on the mutex.
///
/// Gives the count back on drop unless the mutex was obtained.
struct PendingAcquire<'a, K: RegistryKey> {
    registry: &'a LockRegistry<K>,
    key: &'a K,
    mutex: Arc<Mutex<()>>,
    armed: bool,
}

impl<'a, K: RegistryKey> PendingAcquire<'a, K> {
    fn checkout(registry: &'a LockRegistry<K>, key: &'a K) -> Self {
        let mutex = registry.checkout(key);
        PendingAcquire {
            registry,
            key,
            mutex,
            armed: true,
        }
    }

    fn complete(mut self) {
        self.armed = false;
    }
}

impl<K: RegistryKey> Drop for PendingAcquire<'_, K> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.registry.checkin(self.key) {
                warn!("⚠ Failed to abandon pending lock: {}", e);
            }
        }
    }
}
