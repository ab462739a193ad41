//! Coordinated-mode backend publishing statistics to a shared store.

use super::{CacheBackend, LocalCacheBackend};
use crate::cache::{LocalCache, NamedCache};
use crate::error::Result;
use crate::key::LockKey;
use crate::lock::LockHandle;
use crate::stats::StatsStore;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// Backend for processes that share a statistics store.
///
/// Caches are created and destroyed like in [`LocalCacheBackend`]. On every
/// [`update_cache_stats`](CacheBackend::update_cache_stats) call each cache's
/// snapshot is published to the store. Locks are scoped by cache name, so
/// equal keys in different caches do not contend.
///
/// # Example
///
/// ```ignore
/// use keylock_cache::backend::{ClusteredCacheBackend, LocalCacheBackend};
/// use keylock_cache::stats::InMemoryStatsStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(InMemoryStatsStore::new());
/// let backend = ClusteredCacheBackend::new(LocalCacheBackend::new(), Arc::clone(&store));
/// ```
pub struct ClusteredCacheBackend<S: StatsStore> {
    local: LocalCacheBackend,
    store: Arc<S>,
}

impl<S: StatsStore> ClusteredCacheBackend<S> {
    /// Wrap `local`, publishing statistics to `store`.
    pub fn new(local: LocalCacheBackend, store: Arc<S>) -> Self {
        info!("✓ Clustered cache backend initialized");
        ClusteredCacheBackend { local, store }
    }

    /// Statistics store snapshots are published to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Backend used for cache storage and the lock registry.
    pub fn local(&self) -> &LocalCacheBackend {
        &self.local
    }
}

impl<S: StatsStore> Clone for ClusteredCacheBackend<S> {
    fn clone(&self) -> Self {
        ClusteredCacheBackend {
            local: self.local.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StatsStore> CacheBackend for ClusteredCacheBackend<S> {
    type Cache = LocalCache;
    type Lock = LockHandle<LockKey>;

    fn create_cache(&self, name: &str) -> Result<LocalCache> {
        self.local.create_cache(name)
    }

    fn destroy_cache(&self, cache: &LocalCache) {
        self.local.destroy_cache(cache)
    }

    async fn update_cache_stats(&self, caches: &HashMap<String, Arc<LocalCache>>) -> Result<()> {
        let publishes = caches
            .iter()
            .map(|(name, cache)| self.store.publish(name, cache.stats()));
        try_join_all(publishes).await?;

        debug!("✓ Published stats for {} caches", caches.len());
        Ok(())
    }

    fn get_lock<K: Into<LockKey>>(&self, key: K, cache: &LocalCache) -> LockHandle<LockKey> {
        self.local
            .locks()
            .lock_for(LockKey::scoped(cache.name(), key))
    }
}
