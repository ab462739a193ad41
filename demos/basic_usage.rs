//! Basic usage of named caches guarded by keyed locks.

use keylock_cache::backend::{ClusteredCacheBackend, LocalCacheBackend};
use keylock_cache::cache::LocalCache;
use keylock_cache::stats::InMemoryStatsStore;
use keylock_cache::{CacheConfig, CacheService, NamedCache, Result};
use std::sync::Arc;
use std::time::Duration;

/// Increment a counter stored in `cache`, holding the key's lock meanwhile.
async fn increment(
    service: &CacheService<LocalCacheBackend>,
    cache: &LocalCache,
    key: &str,
) -> Result<u64> {
    let mut lock = service.lock(key, cache);
    lock.lock().await;

    let current = cache
        .get(key)?
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .map(u64::from_le_bytes)
        .unwrap_or(0);
    let next = current + 1;
    cache.put(key, next.to_le_bytes().to_vec())?;

    lock.unlock()?;
    Ok(next)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("=== Standalone backend ===\n");

    let service = CacheService::new(LocalCacheBackend::from_env().with_cache_config(
        "counters",
        CacheConfig {
            max_size: None,
            max_lifetime: Some(Duration::from_secs(60)),
        },
    ));
    let counters = service.cache("counters")?;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            let counters = Arc::clone(&counters);
            tokio::spawn(async move { increment(&service, &counters, "page:home").await })
        })
        .collect();
    for task in tasks {
        task.await.expect("Task panicked")?;
    }

    println!(
        "page:home counted {} times, {} lock entries left",
        increment(&service, &counters, "page:home").await? - 1,
        service.backend().locks().len()
    );

    // Standalone mode publishes nothing.
    service.update_stats().await?;

    println!("\n=== Clustered backend ===\n");

    let store = Arc::new(InMemoryStatsStore::new());
    let clustered = CacheService::new(ClusteredCacheBackend::new(
        LocalCacheBackend::new(),
        Arc::clone(&store),
    ));

    let users = clustered.cache("users")?;
    users.put("42", b"alice".to_vec())?;
    users.get("42")?;
    users.get("43")?;

    clustered.update_stats().await?;
    for (name, snapshot) in store.snapshots() {
        println!("{} -> {:?}", name, snapshot.as_array());
    }
    println!("users holds {} entries", users.len());

    clustered.destroy("users");
    Ok(())
}
