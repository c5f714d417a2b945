//! Stream Hot Cache (E): bounded in-process cache keyed by stream id.
//!
//! Plays the role `hitbox-moka`'s backend plays for hitbox's request cache,
//! but moka's built-in eviction policies can't express the exact
//! `(accessCount asc, timestampMs asc)` tie-break spec.md §4.5 requires, so
//! this is a small hand-rolled table behind a `parking_lot::Mutex` instead
//! of an external crate.

use std::collections::HashMap;

use parking_lot::Mutex;
use smart_cache_core::{HotCacheEntry, StreamDataPoint};

/// In-process LRU cache for stream data points, bounded by entry count.
pub struct StreamHotCache {
    entries: Mutex<HashMap<String, HotCacheEntry>>,
    max_size: usize,
    ttl_ms: i64,
}

impl StreamHotCache {
    /// Builds an empty hot cache holding at most `max_size` stream keys.
    pub fn new(max_size: usize, ttl_ms: i64) -> Self {
        Self { entries: Mutex::new(HashMap::new()), max_size, ttl_ms }
    }

    /// Returns the points for `key` if present and unexpired, bumping `access_count`.
    pub fn get(&self, key: &str, now_ms: i64) -> Option<Vec<StreamDataPoint>> {
        let mut entries = self.entries.lock();
        let expired = entries.get(key).is_some_and(|entry| entry.is_expired(now_ms, self.ttl_ms));
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.access_count += 1;
        Some(entry.data.clone())
    }

    /// Writes `points` under `key`, evicting the LRU victim if this would
    /// exceed `max_size` on a key not already present.
    pub fn set(&self, key: &str, points: Vec<StreamDataPoint>, now_ms: i64) {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) && entries.len() >= self.max_size {
            evict_one(&mut entries);
        }
        entries.insert(key.to_string(), HotCacheEntry::new(points, now_ms));
    }

    /// Removes `key`, if present.
    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Number of stream keys currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True iff no stream keys are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Evicts the entry with the lowest `(access_count, timestamp_ms)` pair —
/// the least-used, and among ties the oldest, entry (spec.md §4.5).
fn evict_one(entries: &mut HashMap<String, HotCacheEntry>) {
    let victim = entries
        .iter()
        .min_by_key(|(_, entry)| (entry.access_count, entry.timestamp_ms))
        .map(|(key, _)| key.clone());
    if let Some(victim) = victim {
        entries.remove(&victim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(ts: i64) -> Vec<StreamDataPoint> {
        vec![StreamDataPoint::new("AAPL", 100.0, 10.0, ts)]
    }

    #[test]
    fn get_bumps_access_count_and_returns_points() {
        let cache = StreamHotCache::new(10, 60_000);
        cache.set("AAPL", point(1_000), 1_000);
        assert_eq!(cache.get("AAPL", 1_100).unwrap(), point(1_000));
        assert_eq!(cache.get("AAPL", 1_200).unwrap(), point(1_000));
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = StreamHotCache::new(10, 1_000);
        cache.set("AAPL", point(1_000), 1_000);
        assert!(cache.get("AAPL", 5_000).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_prefers_least_accessed_then_oldest() {
        let cache = StreamHotCache::new(2, 1_000_000);
        cache.set("A", point(1_000), 1_000);
        cache.set("B", point(2_000), 2_000);
        // "A" is read twice, so its access_count (2) beats "B"'s (0) on the
        // first tie-break component; "B" is evicted even though it's newer.
        cache.get("A", 2_500);
        cache.get("A", 2_600);
        cache.set("C", point(3_000), 3_000);
        assert!(cache.get("A", 3_100).is_some());
        assert!(cache.get("B", 3_100).is_none());
        assert!(cache.get("C", 3_100).is_some());
    }

    #[test]
    fn eviction_breaks_ties_by_oldest_timestamp() {
        let cache = StreamHotCache::new(2, 1_000_000);
        cache.set("A", point(1_000), 1_000);
        cache.set("B", point(2_000), 2_000);
        // Neither has been read: access_count ties at 0, so the older
        // timestamp ("A") is evicted.
        cache.set("C", point(3_000), 3_000);
        assert!(cache.get("A", 3_100).is_none());
        assert!(cache.get("B", 3_100).is_some());
        assert!(cache.get("C", 3_100).is_some());
    }
}
