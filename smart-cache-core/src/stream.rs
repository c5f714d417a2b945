//! Time-series data point and in-process hot-cache entry types.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A single time-series quote tick.
///
/// Serializes to the compact `{s,p,v,t,c,cp}` wire shape used by the
/// stream cache, rather than verbose field names, to keep hot-cache
/// entries and warm-tier payloads small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDataPoint {
    /// Symbol.
    pub s: SmolStr,
    /// Price.
    pub p: f64,
    /// Volume.
    pub v: f64,
    /// Timestamp, epoch milliseconds.
    pub t: i64,
    /// Absolute change, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub c: Option<f64>,
    /// Percent change, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cp: Option<f64>,
}

impl StreamDataPoint {
    /// Builds a new point.
    pub fn new(symbol: impl Into<SmolStr>, price: f64, volume: f64, timestamp_ms: i64) -> Self {
        Self {
            s: symbol.into(),
            p: price,
            v: volume,
            t: timestamp_ms,
            c: None,
            cp: None,
        }
    }

    /// Builder-style setter for change/change-percent.
    pub fn with_change(mut self, change: f64, change_percent: f64) -> Self {
        self.c = Some(change);
        self.cp = Some(change_percent);
        self
    }
}

/// Where a placement decision landed a [`Set`](https://docs.rs/smart-cache-stream) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoragePriority {
    /// Always write to the in-process hot tier (in addition to warm).
    Hot,
    /// Only write to warm; never promote to hot on write.
    Warm,
    /// Promote to hot iff the serialized payload is small (§4.6).
    Auto,
}

/// Bounded in-process cache entry for one stream key.
///
/// Evicted by LRU using `(access_count asc, timestamp_ms asc)` — see I2 in
/// spec.md §3.2 — or when `now - timestamp_ms > hot_cache_ttl_ms`.
#[derive(Debug, Clone)]
pub struct HotCacheEntry {
    /// Ordered (by `t` ascending) points for this stream key.
    pub data: Vec<StreamDataPoint>,
    /// When this entry was (re)written into the hot tier, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Number of times this entry has been read since it was written.
    pub access_count: u64,
}

impl HotCacheEntry {
    /// Builds a freshly-written entry with `access_count` at zero.
    pub fn new(data: Vec<StreamDataPoint>, timestamp_ms: i64) -> Self {
        Self {
            data,
            timestamp_ms,
            access_count: 0,
        }
    }

    /// Returns `true` if this entry is older than `ttl_ms` relative to `now_ms`.
    pub fn is_expired(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > ttl_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_cache_entry_expiry_uses_elapsed_not_wallclock() {
        let entry =
            HotCacheEntry::new(vec![StreamDataPoint::new("AAPL", 100.0, 10.0, 1_000)], 1_000);
        assert!(!entry.is_expired(1_500, 1_000));
        assert!(entry.is_expired(3_000, 1_000));
    }

    #[test]
    fn stream_data_point_omits_change_fields_when_absent() {
        let point = StreamDataPoint::new("AAPL", 100.0, 10.0, 1_000);
        let json = serde_json::to_string(&point).unwrap();
        assert!(!json.contains("\"c\""));
        assert!(!json.contains("\"cp\""));
    }
}
