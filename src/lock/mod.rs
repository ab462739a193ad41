//! Keyed locks handed out by cache backends.
//!
//! A [`KeyedLockManager`] maps canonical keys to reference-counted mutexes.
//! Every caller presenting an equal key contends on the same mutex, and the
//! registry entry is dropped as soon as nobody holds or waits on it.
//!
//! ```ignore
//! use keylock_cache::lock::KeyedLockManager;
//!
//! let locks = KeyedLockManager::new();
//! let mut handle = locks.acquire("user:42").await;
//! // ... mutate the cache entry for user:42 ...
//! handle.unlock()?;
//! assert!(locks.is_empty());
//! ```

mod handle;
mod manager;

pub use handle::LockHandle;
pub use manager::KeyedLockManager;

use crate::error::{Error, Result};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

/// Bounds a type must satisfy to key a lock registry.
pub trait RegistryKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> RegistryKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Lock contract handed out by [`CacheBackend::get_lock`](crate::backend::CacheBackend::get_lock).
///
/// Only unconditional blocking acquisition is required. Bounded and
/// interruptible acquisition are optional capabilities: the provided
/// implementations fail with [`Error::UnsupportedOperation`] without
/// blocking, and backends that support them override the methods.
pub trait CacheLock: Send {
    /// Wait until the lock is held.
    fn lock(&mut self) -> impl Future<Output = ()> + Send;

    /// Block the current thread until the lock is held.
    ///
    /// Must not be called from within an async runtime.
    fn blocking_lock(&mut self);

    /// Release the lock.
    ///
    /// # Errors
    ///
    /// Returns `Error::IllegalLockState` if the lock is not currently held.
    fn unlock(&mut self) -> Result<()>;

    /// Whether this lock is currently held.
    fn is_locked(&self) -> bool;

    /// Acquire the lock only if it is free.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedOperation` unless overridden.
    fn try_lock(&mut self) -> Result<bool> {
        Err(Error::UnsupportedOperation("try_lock".to_string()))
    }

    /// Acquire the lock, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedOperation` unless overridden.
    fn try_lock_for(&mut self, timeout: Duration) -> impl Future<Output = Result<bool>> + Send {
        async move {
            Err(Error::UnsupportedOperation(format!(
                "try_lock_for({:?})",
                timeout
            )))
        }
    }

    /// Acquire the lock unless the wait is interrupted.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedOperation` unless overridden.
    fn lock_interruptibly(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Err(Error::UnsupportedOperation("lock_interruptibly".to_string())) }
    }
}
