//! Standalone in-process backend.

use super::CacheBackend;
use crate::cache::{LocalCache, NamedCache};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::key::LockKey;
use crate::lock::{KeyedLockManager, LockHandle};
use std::collections::HashMap;
use std::sync::Arc;

/// Backend keeping all caches and locks in local process memory.
///
/// Statistics are never published. Locks are keyed purely on the key, so
/// equal keys contend even when requested for different caches.
///
/// Cloning shares the lock registry.
///
/// # Example
///
/// ```
/// use keylock_cache::backend::{CacheBackend, LocalCacheBackend};
/// use keylock_cache::cache::NamedCache;
/// use keylock_cache::config::CacheConfig;
///
/// let backend = LocalCacheBackend::new()
///     .with_cache_config("sessions", CacheConfig::unbounded());
///
/// let sessions = backend.create_cache("sessions").unwrap();
/// assert_eq!(sessions.max_cache_size(), None);
/// ```
#[derive(Clone)]
pub struct LocalCacheBackend {
    config: CacheConfig,
    overrides: HashMap<String, CacheConfig>,
    locks: KeyedLockManager<LockKey>,
}

impl LocalCacheBackend {
    /// Create a backend using the default limits.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a backend using limits from the environment.
    ///
    /// See [`CacheConfig::from_env`].
    pub fn from_env() -> Self {
        Self::with_config(CacheConfig::from_env())
    }

    /// Create a backend applying `config` to every cache.
    pub fn with_config(config: CacheConfig) -> Self {
        info!(
            "✓ Local cache backend initialized (max size: {:?}, max lifetime: {:?})",
            config.max_size, config.max_lifetime
        );

        LocalCacheBackend {
            config,
            overrides: HashMap::new(),
            locks: KeyedLockManager::new(),
        }
    }

    /// Use `config` instead of the backend default for caches named `name`.
    pub fn with_cache_config(mut self, name: impl Into<String>, config: CacheConfig) -> Self {
        self.overrides.insert(name.into(), config);
        self
    }

    /// Limits a cache named `name` would be created with.
    pub fn config_for(&self, name: &str) -> &CacheConfig {
        self.overrides.get(name).unwrap_or(&self.config)
    }

    /// Lock registry shared by every lock this backend hands out.
    pub fn locks(&self) -> &KeyedLockManager<LockKey> {
        &self.locks
    }
}

impl Default for LocalCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for LocalCacheBackend {
    type Cache = LocalCache;
    type Lock = LockHandle<LockKey>;

    fn create_cache(&self, name: &str) -> Result<LocalCache> {
        let config = self.config_for(name).clone();
        debug!("✓ Creating cache {} ({:?})", name, config);
        Ok(LocalCache::new(name, config))
    }

    fn destroy_cache(&self, cache: &LocalCache) {
        warn!(
            "⚠ Destroying cache {} ({} entries cleared)",
            cache.name(),
            cache.len()
        );
        cache.destroy();
    }

    async fn update_cache_stats(&self, caches: &HashMap<String, Arc<LocalCache>>) -> Result<()> {
        trace!(
            "Standalone backend: not publishing stats for {} caches",
            caches.len()
        );
        Ok(())
    }

    fn get_lock<K: Into<LockKey>>(&self, key: K, _cache: &LocalCache) -> LockHandle<LockKey> {
        self.locks.lock_for(key)
    }
}
