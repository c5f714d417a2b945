#![warn(missing_docs)]
//! Stream Hot Cache (E) and Stream Cache (F): a two-tier cache specialized
//! for append-only time-series data points.
//!
//! The hot tier is an in-process bounded table (no external crate — see
//! [`hot`] for why); the warm tier is Redis, reached through
//! [`smart_cache_redis::RedisClientFacade`]. [`cache::StreamCache`]
//! orchestrates promotion between the two per spec.md §4.6.

/// Bounded in-process LRU cache for stream data points.
pub mod hot;

/// Hot+warm orchestration, promotion, and batch/range queries.
pub mod cache;

pub use cache::{CacheLayer, ClearOptions, StreamCache, StreamCacheHealth, StreamCachePerformance};
pub use hot::StreamHotCache;
