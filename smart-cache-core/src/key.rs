//! Cache key type.
//!
//! Keys are produced by the [cache key builder](https://docs.rs/smart-cache-ttl)
//! and consumed everywhere a cache entry is addressed: backend reads/writes,
//! the single-flight map, the background-refresh set, and metrics tags.
//!
//! [`CacheKey`] wraps its string in an [`Arc`] so that cloning a key — which
//! happens on every orchestration step — is O(1) rather than reallocating.

use std::fmt;
use std::sync::Arc;

/// A fully-constructed cache key, e.g. `"smart-cache:AAPL|MSFT:provider:nasdaq"`.
///
/// # Validity (I7)
///
/// A `CacheKey` built through [`CacheKey::new`] is not validated; validation
/// (non-empty, `<= max_key_length`, `prefix:`-led structure) is the
/// responsibility of the cache key builder. `CacheKey` itself is a plain
/// wrapper so that backends never need to re-derive validity.
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Wraps an already-built key string.
    pub fn new(raw: impl Into<Arc<str>>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the byte length of the key.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({:?})", self.0)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
