//! Named caches and the statistics contract they expose.

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::stats::StatsSnapshot;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Contract a cache must satisfy to be managed by a
/// [`CacheBackend`](crate::backend::CacheBackend).
///
/// Backends only need sizes and counters to publish statistics and
/// [`clear`](NamedCache::clear) to destroy a cache. Entry storage is up to
/// the implementation.
pub trait NamedCache: Send + Sync {
    /// Unique name of the cache.
    fn name(&self) -> &str;

    /// Current size of all entries, in bytes.
    fn cache_size(&self) -> u64;

    /// Configured maximum size in bytes (`None` when unbounded).
    fn max_cache_size(&self) -> Option<u64>;

    /// Configured maximum entry lifetime (`None` when unbounded).
    fn max_lifetime(&self) -> Option<Duration>;

    /// Current number of live entries.
    fn len(&self) -> usize;

    /// Whether the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cumulative number of reads that found a live entry.
    fn cache_hits(&self) -> u64;

    /// Cumulative number of reads that found nothing.
    fn cache_misses(&self) -> u64;

    /// Remove every entry.
    fn clear(&self);

    /// Statistics in publication order.
    fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::of(self)
    }
}

struct CacheEntry {
    value: Vec<u8>,
    size: u64,
    created_at: Instant,
}

/// Default in-process cache: byte values keyed by string.
///
/// Entries older than the configured lifetime are expired on read. Writes that
/// push the cache past its maximum size first drop expired entries, then the
/// oldest ones, until the cache fits. A single value larger than the maximum
/// size is not stored, and any previous value for its key is dropped.
///
/// The size counter is only adjusted while the entry's shard is locked, so it
/// always equals the total size of the stored entries once writers finish.
///
/// # Example
///
/// ```
/// use keylock_cache::cache::{LocalCache, NamedCache};
/// use keylock_cache::config::CacheConfig;
///
/// let cache = LocalCache::new("users", CacheConfig::default());
/// cache.put("42", b"alice".to_vec()).unwrap();
/// assert_eq!(cache.get("42").unwrap(), Some(b"alice".to_vec()));
/// assert_eq!(cache.cache_hits(), 1);
/// ```
pub struct LocalCache {
    name: String,
    config: CacheConfig,
    entries: DashMap<String, CacheEntry>,
    size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    destroyed: AtomicBool,
}

impl LocalCache {
    /// Create an empty cache with the given limits.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        LocalCache {
            name: name.into(),
            config,
            entries: DashMap::new(),
            size: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Limits this cache was created with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read an entry, counting a hit or a miss.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDestroyed` once the cache has been destroyed.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_live()?;

        let found = match self.entries.get(key) {
            Some(entry) if !self.is_expired(&entry) => Some(entry.value.clone()),
            _ => None,
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!("Cache {} GET {} -> HIT", self.name, key);
                Ok(Some(value))
            }
            None => {
                self.expire(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!("Cache {} GET {} -> MISS", self.name, key);
                Ok(None)
            }
        }
    }

    /// Store an entry, replacing any previous value for `key`.
    ///
    /// A value too large for the cache is not stored and the previous value
    /// for `key` is removed.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDestroyed` once the cache has been destroyed.
    pub fn put(&self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        self.ensure_live()?;

        let key = key.into();
        let size = (key.len() + value.len()) as u64;

        if let Some(max) = self.config.max_size {
            if size > max {
                debug!(
                    "Cache {} skipped {} ({} bytes exceeds max {})",
                    self.name, key, size, max
                );
                if let Some((_, previous)) = self.entries.remove(&key) {
                    self.size.fetch_sub(previous.size, Ordering::Relaxed);
                }
                return Ok(());
            }
        }

        let entry = CacheEntry {
            value,
            size,
            created_at: Instant::now(),
        };
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(entry);
                self.size.fetch_add(size, Ordering::Relaxed);
                self.size.fetch_sub(previous.size, Ordering::Relaxed);
            }
            Entry::Vacant(vacant) => {
                let _stored = vacant.insert(entry);
                self.size.fetch_add(size, Ordering::Relaxed);
            }
        }

        self.cull();
        Ok(())
    }

    /// Remove an entry, returning its value.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheDestroyed` once the cache has been destroyed.
    pub fn remove(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_live()?;

        Ok(self.entries.remove(key).map(|(_, entry)| {
            self.size.fetch_sub(entry.size, Ordering::Relaxed);
            entry.value
        }))
    }

    /// Whether a live entry exists for `key`. Does not touch the counters.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !self.is_expired(&entry))
            .unwrap_or(false)
    }

    /// Whether [`destroy`](LocalCache::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Clear the cache and refuse further use.
    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.clear();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::CacheDestroyed(self.name.clone()));
        }
        Ok(())
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.config
            .max_lifetime
            .map(|lifetime| entry.created_at.elapsed() >= lifetime)
            .unwrap_or(false)
    }

    fn expire(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove_if(key, |_, entry| self.is_expired(entry)) {
            self.size.fetch_sub(entry.size, Ordering::Relaxed);
        }
    }

    /// Shrink back under the max size: expired entries first, then oldest.
    fn cull(&self) {
        let Some(max) = self.config.max_size else {
            return;
        };
        if self.size.load(Ordering::Relaxed) <= max {
            return;
        }

        let mut by_age: Vec<(String, Instant, bool)> = self
            .entries
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.created_at,
                    self.is_expired(entry.value()),
                )
            })
            .collect();
        // Expired first, then oldest first.
        by_age.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)));

        let mut culled = 0;
        for (key, _, _) in by_age {
            if self.size.load(Ordering::Relaxed) <= max {
                break;
            }
            if let Some((_, entry)) = self.entries.remove(&key) {
                self.size.fetch_sub(entry.size, Ordering::Relaxed);
                culled += 1;
            }
        }

        debug!("Cache {} culled {} entries", self.name, culled);
    }
}

impl NamedCache for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn cache_size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    fn max_cache_size(&self) -> Option<u64> {
        self.config.max_size
    }

    fn max_lifetime(&self) -> Option<Duration> {
        self.config.max_lifetime
    }

    fn len(&self) -> usize {
        if self.config.max_lifetime.is_none() {
            return self.entries.len();
        }
        self.entries
            .iter()
            .filter(|entry| !self.is_expired(entry.value()))
            .count()
    }

    fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.entries.retain(|_, entry| {
            self.size.fetch_sub(entry.size, Ordering::Relaxed);
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn config(max_size: Option<u64>, max_lifetime: Option<Duration>) -> CacheConfig {
        CacheConfig {
            max_size,
            max_lifetime,
        }
    }

    #[test]
    fn test_local_cache_get_put() {
        let cache = LocalCache::new("test", CacheConfig::unbounded());

        cache.put("a", b"1".to_vec()).expect("Failed to put");
        assert_eq!(cache.get("a").expect("Failed to get"), Some(b"1".to_vec()));
        assert_eq!(cache.get("b").expect("Failed to get"), None);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cache_size(), 2);
        assert_eq!(cache.cache_hits(), 1);
        assert_eq!(cache.cache_misses(), 1);
    }

    #[test]
    fn test_local_cache_replace_updates_size() {
        let cache = LocalCache::new("test", CacheConfig::unbounded());

        cache.put("a", vec![0; 10]).expect("Failed to put");
        cache.put("a", vec![0; 4]).expect("Failed to put");

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cache_size(), 5);

        assert_eq!(cache.remove("a").expect("Failed to remove"), Some(vec![0; 4]));
        assert_eq!(cache.cache_size(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_local_cache_expires_entries() {
        let cache = LocalCache::new("test", config(None, Some(Duration::from_millis(20))));

        cache.put("a", b"1".to_vec()).expect("Failed to put");
        assert!(cache.contains_key("a"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.get("a").expect("Failed to get"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.cache_size(), 0);
        assert_eq!(cache.cache_misses(), 1);
    }

    #[test]
    fn test_local_cache_culls_oldest_over_max_size() {
        let cache = LocalCache::new("test", config(Some(20), None));

        cache.put("k1", vec![0; 8]).expect("Failed to put");
        std::thread::sleep(Duration::from_millis(2));
        cache.put("k2", vec![0; 8]).expect("Failed to put");
        std::thread::sleep(Duration::from_millis(2));
        cache.put("k3", vec![0; 8]).expect("Failed to put");

        assert!(!cache.contains_key("k1"));
        assert!(cache.contains_key("k2"));
        assert!(cache.contains_key("k3"));
        assert!(cache.cache_size() <= 20);
    }

    #[test]
    fn test_local_cache_skips_oversized_value() {
        let cache = LocalCache::new("test", config(Some(8), None));

        cache.put("big", vec![0; 64]).expect("Failed to put");
        assert!(cache.is_empty());
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_local_cache_oversized_value_drops_previous() {
        let cache = LocalCache::new("test", config(Some(16), None));

        cache.put("k", b"old".to_vec()).expect("Failed to put");
        assert_eq!(cache.cache_size(), 4);

        cache.put("k", vec![7; 64]).expect("Failed to put");
        assert_eq!(cache.get("k").expect("Failed to get"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_local_cache_len_skips_expired_entries() {
        let cache = LocalCache::new("test", config(None, Some(Duration::from_millis(20))));

        cache.put("a", b"1".to_vec()).expect("Failed to put");
        std::thread::sleep(Duration::from_millis(40));
        cache.put("b", b"2".to_vec()).expect("Failed to put");

        // "a" is expired but no read has evicted it yet.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().as_array()[2], 1);
    }

    #[test]
    fn test_local_cache_size_survives_concurrent_clear() {
        let cache = Arc::new(LocalCache::new("test", CacheConfig::unbounded()));

        let writer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..200 {
                    cache
                        .put(format!("key-{}", i % 37), vec![0; i % 13])
                        .expect("Failed to put");
                }
            })
        };
        let clearer = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..50 {
                    cache.clear();
                    thread::yield_now();
                }
            })
        };
        writer.join().expect("Writer panicked");
        clearer.join().expect("Clearer panicked");

        let stored: u64 = cache.entries.iter().map(|entry| entry.size).sum();
        assert_eq!(cache.cache_size(), stored);

        let keys: Vec<String> = cache.entries.iter().map(|entry| entry.key().clone()).collect();
        for key in keys {
            cache.remove(&key).expect("Failed to remove");
        }
        assert_eq!(cache.cache_size(), 0);
    }

    #[test]
    fn test_local_cache_destroy() {
        let cache = LocalCache::new("users", CacheConfig::default());
        cache.put("a", b"1".to_vec()).expect("Failed to put");

        cache.destroy();

        assert!(cache.is_destroyed());
        assert!(cache.is_empty());
        assert!(matches!(
            cache.put("a", b"1".to_vec()),
            Err(Error::CacheDestroyed(name)) if name == "users"
        ));
        assert!(matches!(cache.get("a"), Err(Error::CacheDestroyed(_))));
    }

    #[test]
    fn test_local_cache_stats() {
        let cache = LocalCache::new("test", config(Some(1024), None));
        cache.put("a", b"12345".to_vec()).expect("Failed to put");
        cache.get("a").expect("Failed to get");
        cache.get("missing").expect("Failed to get");

        let stats = cache.stats();
        assert_eq!(stats.as_array(), [6, 1024, 1, 1, 1]);
    }
}
