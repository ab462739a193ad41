//! Cache statistics and the shared store they are published to.

use crate::cache::NamedCache;
use crate::error::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

/// Per-cache statistics in publication order.
///
/// Published as exactly five integers, in this order:
///
/// 1. current cache size in bytes
/// 2. configured maximum size in bytes (`-1` when unbounded)
/// 3. current entry count
/// 4. cumulative hits
/// 5. cumulative misses
///
/// Serializes as a bare five-element array so external consumers can rely on
/// position alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i64; 5]", into = "[i64; 5]")]
pub struct StatsSnapshot {
    pub cache_size: i64,
    pub max_cache_size: i64,
    pub entry_count: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
}

impl StatsSnapshot {
    /// Take a snapshot of `cache`.
    pub fn of<C: NamedCache + ?Sized>(cache: &C) -> Self {
        StatsSnapshot {
            cache_size: saturating_i64(cache.cache_size()),
            max_cache_size: cache.max_cache_size().map(saturating_i64).unwrap_or(-1),
            entry_count: saturating_i64(cache.len() as u64),
            cache_hits: saturating_i64(cache.cache_hits()),
            cache_misses: saturating_i64(cache.cache_misses()),
        }
    }

    /// The five published values, in order.
    pub fn as_array(&self) -> [i64; 5] {
        [
            self.cache_size,
            self.max_cache_size,
            self.entry_count,
            self.cache_hits,
            self.cache_misses,
        ]
    }
}

impl From<[i64; 5]> for StatsSnapshot {
    fn from(values: [i64; 5]) -> Self {
        let [cache_size, max_cache_size, entry_count, cache_hits, cache_misses] = values;
        StatsSnapshot {
            cache_size,
            max_cache_size,
            entry_count,
            cache_hits,
            cache_misses,
        }
    }
}

impl From<StatsSnapshot> for [i64; 5] {
    fn from(snapshot: StatsSnapshot) -> Self {
        snapshot.as_array()
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Statistics store shared by cooperating processes.
///
/// Coordinated-mode backends publish one snapshot per cache name into it.
pub trait StatsStore: Send + Sync {
    /// Store `snapshot` under `cache_name`, replacing any previous one.
    fn publish(
        &self,
        cache_name: &str,
        snapshot: StatsSnapshot,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-process [`StatsStore`].
///
/// Stands in for the shared store in single-node deployments and tests.
#[derive(Default)]
pub struct InMemoryStatsStore {
    snapshots: DashMap<String, StatsSnapshot>,
}

impl InMemoryStatsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last snapshot published for `cache_name`.
    pub fn get(&self, cache_name: &str) -> Option<StatsSnapshot> {
        self.snapshots.get(cache_name).map(|snapshot| *snapshot)
    }

    /// All published snapshots.
    pub fn snapshots(&self) -> HashMap<String, StatsSnapshot> {
        self.snapshots
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Number of caches with a published snapshot.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl StatsStore for InMemoryStatsStore {
    async fn publish(&self, cache_name: &str, snapshot: StatsSnapshot) -> Result<()> {
        self.snapshots.insert(cache_name.to_string(), snapshot);
        Ok(())
    }
}
