//! Cache creation limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum cache size in bytes (256 KiB).
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 256 * 1024;

/// Default maximum entry lifetime (6 hours).
pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(6 * 60 * 60);

/// Environment variable holding the maximum cache size in bytes.
pub const MAX_SIZE_ENV: &str = "CACHE_MAX_SIZE";

/// Environment variable holding the maximum entry lifetime in seconds.
pub const MAX_LIFETIME_ENV: &str = "CACHE_MAX_LIFETIME_SECS";

/// Limits applied to a cache when the backend creates it.
///
/// `None` means unbounded.
///
/// # Example
///
/// ```
/// use keylock_cache::config::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig {
///     max_size: Some(1024 * 1024),
///     max_lifetime: Some(Duration::from_secs(300)),
/// };
/// assert_eq!(config.max_size, Some(1024 * 1024));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum total size of keys and values, in bytes.
    #[serde(default)]
    pub max_size: Option<u64>,
    /// Maximum time an entry stays readable after being written.
    #[serde(default)]
    pub max_lifetime: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_size: Some(DEFAULT_MAX_CACHE_SIZE),
            max_lifetime: Some(DEFAULT_MAX_LIFETIME),
        }
    }
}

impl CacheConfig {
    /// Configuration with neither a size nor a lifetime limit.
    pub fn unbounded() -> Self {
        CacheConfig {
            max_size: None,
            max_lifetime: None,
        }
    }

    /// Build configuration from the process environment.
    ///
    /// Values are determined by:
    /// 1. `CACHE_MAX_SIZE` / `CACHE_MAX_LIFETIME_SECS` (negative means unbounded)
    /// 2. The defaults (256 KiB, 6 hours)
    pub fn from_env() -> Self {
        let defaults = CacheConfig::default();

        let max_size = match read_env_i64(MAX_SIZE_ENV) {
            Some(bytes) if bytes < 0 => None,
            Some(bytes) => Some(bytes as u64),
            None => defaults.max_size,
        };

        let max_lifetime = match read_env_i64(MAX_LIFETIME_ENV) {
            Some(secs) if secs < 0 => None,
            Some(secs) => Some(Duration::from_secs(secs as u64)),
            None => defaults.max_lifetime,
        };

        CacheConfig {
            max_size,
            max_lifetime,
        }
    }
}

fn read_env_i64(name: &str) -> Option<i64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not an integer, using default", name, raw);
            None
        }
    }
}
