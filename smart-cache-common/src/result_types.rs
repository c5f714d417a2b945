//! Result shapes for the enhanced batch operations (§4.3).

use serde::{Deserialize, Serialize};

/// Where an [`EnhancedGetResult`] value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Served from the warm cache without a re-fetch.
    Cache,
    /// Served via `fetchFn` (miss, or stale-triggered re-fetch).
    Fetch,
    /// Neither cache nor fetch produced a value.
    Error,
}

/// Per-request outcome of [`crate::CommonCache::mget_enhanced`].
#[derive(Debug, Clone)]
pub struct EnhancedGetResult<T> {
    /// The key this result is for.
    pub key: String,
    /// Resolved value, if any.
    pub data: Option<T>,
    /// Whether this result came from the cache (including a stale hit later refreshed).
    pub hit: bool,
    /// Remaining TTL in seconds, when known.
    pub ttl_remaining: Option<u64>,
    /// Where `data` came from.
    pub source: ResultSource,
    /// Stored-at timestamp, when known.
    pub metadata: Option<EntryMetadata>,
}

/// Metadata surfaced alongside a value without re-deserializing the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// When the entry was written, epoch milliseconds.
    pub stored_at_ms: i64,
}

/// Options accepted by [`crate::CommonCache::mget_enhanced`] per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Whether to consult the cache at all.
    pub use_cache: bool,
    /// If the cached TTL-remaining is below this, trigger a foreground re-fetch.
    pub max_age_seconds: Option<u64>,
    /// Whether to populate [`EnhancedGetResult::metadata`].
    pub include_metadata: bool,
}

/// Options accepted by [`crate::CommonCache::mset_enhanced`] per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Overrides the default compression policy for this entry.
    pub compression: Option<bool>,
    /// Skip the write if the key already exists.
    pub skip_if_exists: bool,
    /// Only write if the key already exists.
    pub only_if_exists: bool,
}

/// Aggregate outcome of [`crate::CommonCache::mset_enhanced`].
#[derive(Debug, Clone, Default)]
pub struct EnhancedSetSummary {
    /// Total entries submitted.
    pub total: usize,
    /// Entries written successfully.
    pub successful: usize,
    /// Entries that failed to write.
    pub failed: usize,
    /// Entries skipped due to `skip_if_exists`/`only_if_exists`.
    pub skipped: usize,
    /// Per-entry detail, same order as the input.
    pub details: Vec<SetOutcome>,
}

/// Per-entry detail for [`EnhancedSetSummary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The entry was written.
    Written,
    /// The entry was skipped (condition not met).
    Skipped,
    /// The write failed.
    Failed(String),
}
