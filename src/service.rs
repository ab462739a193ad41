//! Shareable entry point for cache and lock access.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::key::LockKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// The process's cache service: one backend plus the caches it created.
///
/// Construct it once at startup and pass clones to every call site that needs
/// cache or lock access. Cloning is cheap (an `Arc` increment).
///
/// # Example
///
/// ```ignore
/// use keylock_cache::{backend::LocalCacheBackend, CacheService};
///
/// let service = CacheService::new(LocalCacheBackend::new());
///
/// let users = service.cache("users")?;
/// let mut lock = service.lock("42", &users);
/// lock.lock().await;
/// users.put("42", b"alice".to_vec())?;
/// lock.unlock()?;
/// ```
pub struct CacheService<B: CacheBackend> {
    inner: Arc<ServiceInner<B>>,
}

struct ServiceInner<B: CacheBackend> {
    backend: B,
    caches: DashMap<String, Arc<B::Cache>>,
}

impl<B: CacheBackend> CacheService<B> {
    /// Create a service around `backend`.
    pub fn new(backend: B) -> Self {
        CacheService {
            inner: Arc::new(ServiceInner {
                backend,
                caches: DashMap::new(),
            }),
        }
    }

    /// The cache named `name`, created through the backend on first request.
    ///
    /// Concurrent first requests for the same name create it once.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails to create the cache
    pub fn cache(&self, name: &str) -> Result<Arc<B::Cache>> {
        if let Some(cache) = self.inner.caches.get(name) {
            return Ok(Arc::clone(cache.value()));
        }

        match self.inner.caches.entry(name.to_string()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let cache = Arc::new(self.inner.backend.create_cache(name)?);
                vacant.insert(Arc::clone(&cache));
                Ok(cache)
            }
        }
    }

    /// Destroy the cache named `name`.
    ///
    /// Returns `false` if no such cache exists. Handles to the cache obtained
    /// earlier must not be used afterwards.
    pub fn destroy(&self, name: &str) -> bool {
        match self.inner.caches.remove(name) {
            Some((_, cache)) => {
                self.inner.backend.destroy_cache(&cache);
                true
            }
            None => false,
        }
    }

    /// Names of all live caches.
    pub fn cache_names(&self) -> Vec<String> {
        self.inner
            .caches
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Hand every live cache to the backend for statistics publication.
    ///
    /// # Errors
    /// Returns `Err` if the backend fails to publish
    pub async fn update_stats(&self) -> Result<()> {
        let caches: HashMap<String, Arc<B::Cache>> = self
            .inner
            .caches
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        self.inner.backend.update_cache_stats(&caches).await
    }

    /// Lock scoped to `key` within `cache`. See [`CacheBackend::get_lock`].
    pub fn lock<K: Into<LockKey>>(&self, key: K, cache: &B::Cache) -> B::Lock {
        self.inner.backend.get_lock(key, cache)
    }

    /// The backend behind this service.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }
}

impl<B: CacheBackend> Clone for CacheService<B> {
    fn clone(&self) -> Self {
        CacheService {
            inner: Arc::clone(&self.inner),
        }
    }
}
