//! Cache backend abstraction and implementations.
//!
//! A backend creates and destroys named caches, publishes their statistics,
//! and hands out per-key locks. Applications construct one backend at
//! startup and share it, usually through a [`CacheService`](crate::CacheService).

pub mod clustered;
pub mod local;

pub use clustered::ClusteredCacheBackend;
pub use local::LocalCacheBackend;

use crate::cache::NamedCache;
use crate::error::Result;
use crate::key::LockKey;
use crate::lock::CacheLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Trait for cache backend implementations.
///
/// Implementations must be thread-safe and shareable across threads.
///
/// # Example
///
/// ```ignore
/// use keylock_cache::backend::{CacheBackend, LocalCacheBackend};
///
/// let backend = LocalCacheBackend::new();
/// let users = backend.create_cache("users")?;
///
/// let mut lock = backend.get_lock("42", &users);
/// lock.lock().await;
/// users.put("42", b"alice".to_vec())?;
/// lock.unlock()?;
/// ```
pub trait CacheBackend: Send + Sync {
    /// Cache type this backend creates.
    type Cache: NamedCache;

    /// Lock type this backend hands out.
    type Lock: CacheLock;

    /// Create a cache named `name`, configured with the backend's limits.
    ///
    /// Every call builds a new cache; callers must not create the same name
    /// twice. [`CacheService::cache`](crate::CacheService::cache) provides
    /// get-or-create semantics on top of this.
    ///
    /// # Errors
    /// Returns `Err` if the cache cannot be configured or created
    fn create_cache(&self, name: &str) -> Result<Self::Cache>;

    /// Clear all entries of `cache`. The cache must not be used afterwards.
    fn destroy_cache(&self, cache: &Self::Cache);

    /// Publish a [`StatsSnapshot`](crate::stats::StatsSnapshot) for every cache
    /// in `caches`, keyed by name.
    ///
    /// Standalone backends do nothing. An empty map is never an error.
    ///
    /// # Errors
    /// Returns `Err` if the statistics store rejects a snapshot
    fn update_cache_stats(
        &self,
        caches: &HashMap<String, Arc<Self::Cache>>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Lock scoped to `key`.
    ///
    /// Equal keys yield locks that contend with each other. Whether `cache`
    /// further scopes the key is up to the backend.
    fn get_lock<K: Into<LockKey>>(&self, key: K, cache: &Self::Cache) -> Self::Lock;
}
