//! Request/result types exchanged with the smart cache orchestrator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::key::CacheKey;

/// Caching discipline selected per request.
///
/// See spec.md §4.9 for the TTL selected by each strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStrategy {
    /// Short TTL, favors freshness over hit rate.
    StrongTimeliness,
    /// Long TTL, favors hit rate over freshness.
    WeakTimeliness,
    /// TTL depends on live market status.
    MarketAware,
    /// Always fetch from upstream; never reads or writes the cache.
    NoCache,
    /// Near-real-time TTL, background-refreshed before expiry.
    Adaptive,
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StrongTimeliness => "strong_timeliness",
            Self::WeakTimeliness => "weak_timeliness",
            Self::MarketAware => "market_aware",
            Self::NoCache => "no_cache",
            Self::Adaptive => "adaptive",
        };
        f.write_str(s)
    }
}

/// Boxed, type-erased async upstream fetch.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send>>;

/// A caller-supplied closure invoked on cache miss to fetch fresh data.
pub trait FetchFn<T>: Send {
    /// Invokes the fetch, consuming `self` (each request's fetch runs at most once).
    fn call(self: Box<Self>) -> FetchFuture<T>;
}

impl<T, F, Fut> FetchFn<T> for F
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
{
    fn call(self: Box<Self>) -> FetchFuture<T> {
        Box::pin((*self)())
    }
}

/// One caller invocation of the orchestrator (§3.1, ephemeral).
pub struct OrchestratorRequest<T> {
    /// Fully-built cache key (see `smart-cache-ttl`'s key builder).
    pub cache_key: CacheKey,
    /// Selected caching strategy.
    pub strategy: CacheStrategy,
    /// Symbols this request concerns, used for market-aware TTL and events.
    pub symbols: Vec<String>,
    /// Upstream fetch invoked on cache miss.
    pub fetch_fn: Box<dyn FetchFn<T>>,
    /// Opaque caller metadata carried through to events (e.g. `apiType`).
    pub metadata: Option<std::collections::HashMap<String, String>>,
}

impl<T> fmt::Debug for OrchestratorRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorRequest")
            .field("cache_key", &self.cache_key)
            .field("strategy", &self.strategy)
            .field("symbols", &self.symbols)
            .finish_non_exhaustive()
    }
}

impl<T> OrchestratorRequest<T> {
    /// Builds a request with no metadata.
    pub fn new<F, Fut>(cache_key: CacheKey, strategy: CacheStrategy, symbols: Vec<String>, fetch_fn: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, CacheError>> + Send + 'static,
        T: 'static,
    {
        Self {
            cache_key,
            strategy,
            symbols,
            fetch_fn: Box::new(fetch_fn),
            metadata: None,
        }
    }
}

/// Outcome of one orchestration call (§3.1).
#[derive(Debug, Clone)]
pub struct OrchestratorResult<T> {
    /// The resolved value, or `None` on error.
    pub data: Option<T>,
    /// Whether `data` came from cache.
    pub hit: bool,
    /// Remaining TTL of the cache entry that produced this result, if any.
    pub ttl_remaining_seconds: Option<u64>,
    /// TTL computed for this write, if a write occurred.
    pub dynamic_ttl: Option<u64>,
    /// Strategy used for this request.
    pub strategy: CacheStrategy,
    /// Cache key this result was stored/read under.
    pub storage_key: CacheKey,
    /// When this result was produced.
    pub timestamp: DateTime<Utc>,
    /// Error message, if the fetch or orchestration failed.
    pub error: Option<String>,
}

impl<T> OrchestratorResult<T> {
    /// Builds a cache-hit result.
    pub fn hit(data: T, storage_key: CacheKey, strategy: CacheStrategy, ttl_remaining_seconds: u64) -> Self {
        Self {
            data: Some(data),
            hit: true,
            ttl_remaining_seconds: Some(ttl_remaining_seconds),
            dynamic_ttl: None,
            strategy,
            storage_key,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// Builds a cache-miss result that resolved via upstream fetch.
    pub fn miss(data: T, storage_key: CacheKey, strategy: CacheStrategy, dynamic_ttl: Option<u64>) -> Self {
        Self {
            data: Some(data),
            hit: false,
            ttl_remaining_seconds: Some(0),
            dynamic_ttl,
            strategy,
            storage_key,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// Builds an error result. Per spec.md §4.9, this never disturbs
    /// subsequent orchestration of the same key.
    pub fn error(storage_key: CacheKey, strategy: CacheStrategy, message: impl Into<String>) -> Self {
        Self {
            data: None,
            hit: false,
            ttl_remaining_seconds: None,
            dynamic_ttl: None,
            strategy,
            storage_key,
            timestamp: Utc::now(),
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_display_matches_event_tag_convention() {
        assert_eq!(CacheStrategy::MarketAware.to_string(), "market_aware");
        assert_eq!(CacheStrategy::NoCache.to_string(), "no_cache");
    }
}
