#![warn(missing_docs)]
//! Shared data model, error taxonomy, and consumed-interface contracts for
//! the smart caching core.
//!
//! This crate has no backend or network dependency of its own — it defines
//! the vocabulary every other `smart-cache-*` crate builds on: cache keys
//! and entries, the error type, the orchestrator's request/result shapes,
//! configuration, and the four external contracts the orchestrator consumes
//! but never implements (market status, symbol transform, event bus).

/// Cache key newtype.
///
/// [`key::CacheKey`] is the addressing type threaded through every backend,
/// the single-flight map, and the background-refresh set.
pub mod key;

/// Cache error taxonomy.
///
/// [`error::CacheError`] covers the operations that are allowed to fail
/// loudly; most read-path operations swallow errors and emit a metric
/// instead (spec §7).
pub mod error;

/// The warm-tier stored value.
///
/// [`entry::CacheEntry`] carries compression metadata alongside the raw
/// text payload.
pub mod entry;

/// Time-series data point and hot-cache entry types for the stream cache.
pub mod stream;

/// Request/result types exchanged with the smart cache orchestrator.
pub mod orchestrator;

/// Market Status Provider contract (G) — consumed, not implemented here.
pub mod market;

/// Event Bus contract (K) — fire-and-forget metric emission.
pub mod event;

/// Symbol Transformer contract (L) — consumed, not implemented here.
pub mod symbol;

/// Root configuration surface (§6).
pub mod config;

pub use config::{Config, ConfigBuilder};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use event::{events, CacheEvent, EventBus, NullEventBus, RecordingEventBus};
pub use key::CacheKey;
pub use market::{MarketState, MarketStatus, MarketStatusProvider, NextStateChange, StaticMarketStatusProvider};
pub use orchestrator::{CacheStrategy, FetchFn, FetchFuture, OrchestratorRequest, OrchestratorResult};
pub use stream::{HotCacheEntry, StoragePriority, StreamDataPoint};
pub use symbol::{IdentitySymbolTransformer, SymbolTransformer, TransformDirection, TransformMetadata, TransformResult};

/// Re-exports of the types most callers need, mirroring `hitbox::prelude`.
pub mod prelude {
    pub use crate::{CacheEntry, CacheError, CacheKey, CacheStrategy, Config};
}
