//! Error types for cache backends and keyed locks.

use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by lock handles, caches, and backends.
///
/// Every variant is a contract violation or a collaborator failure surfaced
/// synchronously to the caller. Nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A release was attempted without a matching acquisition.
    IllegalLockState(String),

    /// The lock handle does not support the requested capability.
    UnsupportedOperation(String),

    /// The cache was destroyed and can no longer be written to.
    CacheDestroyed(String),

    /// A configuration value could not be used.
    ConfigError(String),

    /// The backend or its statistics store failed.
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IllegalLockState(msg) => write!(f, "Illegal lock state: {}", msg),
            Error::UnsupportedOperation(op) => write!(f, "Unsupported lock operation: {}", op),
            Error::CacheDestroyed(name) => write!(f, "Cache '{}' has been destroyed", name),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
