//! # keylock-cache
//!
//! Pluggable cache backends with a reference-counted keyed lock manager.
//!
//! ## Features
//!
//! - **Keyed Locks:** One mutex per key value, shared by every caller presenting an equal key
//! - **Self-Cleaning:** Lock entries are dropped as soon as nobody holds or waits on them
//! - **Backend Agnostic:** Standalone in-process backend, coordinated backend, or your own
//! - **Statistics:** Per-cache `[size, max size, entries, hits, misses]` snapshots
//! - **Async and Threads:** Locks work from tokio tasks and from plain OS threads
//!
//! ## Quick Start
//!
//! ```ignore
//! use keylock_cache::{backend::LocalCacheBackend, CacheService};
//!
//! // 1. Build the backend once at startup and wrap it in a service
//! let service = CacheService::new(LocalCacheBackend::from_env());
//!
//! // 2. Get (or create) a named cache
//! let users = service.cache("users")?;
//!
//! // 3. Lock the entry's key around the mutation
//! let mut lock = service.lock("user:42", &users);
//! lock.lock().await;
//! users.put("user:42", b"alice".to_vec())?;
//! lock.unlock()?;
//!
//! // 4. Publish statistics (no-op for the standalone backend)
//! service.update_stats().await?;
//! ```
//!
//! ## Locks Without a Backend
//!
//! ```ignore
//! use keylock_cache::lock::KeyedLockManager;
//!
//! let locks = KeyedLockManager::new();
//! let handle = locks.acquire("A").await;
//! locks.release(handle)?;
//! assert!(locks.is_empty());
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod key;
pub mod lock;
pub mod service;
pub mod stats;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cache::NamedCache;
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use key::LockKey;
pub use lock::{CacheLock, KeyedLockManager, LockHandle};
pub use service::CacheService;
pub use stats::{StatsSnapshot, StatsStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
