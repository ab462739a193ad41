//! Canonical lock keys.

use std::fmt;
use std::sync::Arc;

/// Canonical form of an application-chosen lock key.
///
/// Keys compare by content: two `LockKey`s built from distinct `String`
/// instances holding the same text are equal and hash identically, so they
/// resolve to the same registry entry. Text and integer keys never compare
/// equal to each other (`"1"` and `1` are different locks).
///
/// # Example
///
/// ```
/// use keylock_cache::key::LockKey;
///
/// let a = LockKey::from(String::from("user:42"));
/// let b = LockKey::from("user:42");
/// assert_eq!(a, b);
/// assert_ne!(LockKey::from("1"), LockKey::from(1_i64));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// Textual key.
    Text(Arc<str>),
    /// Integer key.
    Int(i64),
    /// Key namespaced by the name of the cache it guards.
    Scoped {
        cache: Arc<str>,
        key: Arc<LockKey>,
    },
}

impl LockKey {
    /// Namespace `key` under `cache`.
    ///
    /// Equal keys scoped to different caches are different locks.
    pub fn scoped(cache: &str, key: impl Into<LockKey>) -> Self {
        LockKey::Scoped {
            cache: Arc::from(cache),
            key: Arc::new(key.into()),
        }
    }

    /// The textual content, if this is a text key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LockKey::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Text(text) => f.write_str(text),
            LockKey::Int(value) => write!(f, "{}", value),
            LockKey::Scoped { cache, key } => write!(f, "{}:{}", cache, key),
        }
    }
}

impl From<&str> for LockKey {
    fn from(value: &str) -> Self {
        LockKey::Text(Arc::from(value))
    }
}

impl From<String> for LockKey {
    fn from(value: String) -> Self {
        LockKey::Text(Arc::from(value))
    }
}

impl From<&String> for LockKey {
    fn from(value: &String) -> Self {
        LockKey::Text(Arc::from(value.as_str()))
    }
}

impl From<Arc<str>> for LockKey {
    fn from(value: Arc<str>) -> Self {
        LockKey::Text(value)
    }
}

impl From<i64> for LockKey {
    fn from(value: i64) -> Self {
        LockKey::Int(value)
    }
}

impl From<i32> for LockKey {
    fn from(value: i32) -> Self {
        LockKey::Int(i64::from(value))
    }
}

impl From<u32> for LockKey {
    fn from(value: u32) -> Self {
        LockKey::Int(i64::from(value))
    }
}

impl From<&LockKey> for LockKey {
    fn from(value: &LockKey) -> Self {
        value.clone()
    }
}
