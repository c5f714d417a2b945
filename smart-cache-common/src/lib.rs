#![warn(missing_docs)]
//! Common Cache (C): single-key and batch operations over the Redis facade.
//!
//! Sits directly on [`smart_cache_redis::RedisClientFacade`] and
//! [`smart_cache_codec`]'s envelope, applying the read-path error policy of
//! spec.md §7: a read failure returns `None`/an empty slot and logs, it
//! never propagates. Only batch-size overflow and `fetchFn` errors surface
//! as [`smart_cache_core::CacheError`].

/// [`CommonCache`] and its single-key/batch operations.
pub mod common;

/// Result/option shapes used by the enhanced batch operations.
pub mod result_types;

pub use common::{CommonCache, EnhancedGetRequest, EnhancedSetRequest, GetResult};
pub use result_types::{EnhancedGetResult, EnhancedSetSummary, EntryMetadata, GetOptions, ResultSource, SetOptions, SetOutcome};
