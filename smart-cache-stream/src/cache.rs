//! Stream Cache (F): hot/warm orchestration for append-only time-series data.

use std::sync::Arc;
use std::time::Duration;

use smart_cache_core::{events, CacheError, CacheEvent, EventBus, NullEventBus, StoragePriority, StreamDataPoint};
use smart_cache_redis::{PipelineOp, PipelineReply, RedisClientFacade};
use tracing::warn;

use crate::hot::StreamHotCache;

const PROMOTE_MAX_BYTES: usize = 10_000;
const PROMOTE_MAX_POINTS: usize = 100;
const SMALL_CLEAR_THRESHOLD: usize = 1_000;
const CLEAR_CHUNK_SIZE: usize = 200;
const CLEAR_PAUSE: Duration = Duration::from_millis(10);

/// Where a [`StreamCache::get`] result was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    /// Served from the in-process hot tier.
    Hot,
    /// Served from Redis, and promoted to hot.
    Warm,
    /// Not found in either tier.
    Miss,
}

impl CacheLayer {
    fn tag(self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Warm => "warm",
            Self::Miss => "miss",
        }
    }
}

/// Latency/compression snapshot returned by [`StreamCache::health`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamCachePerformance {
    /// Exponential moving average hot-tier hit latency, milliseconds.
    pub avg_hot_hit_time_ms: f64,
    /// Exponential moving average warm-tier hit latency, milliseconds.
    pub avg_warm_hit_time_ms: f64,
    /// Moving average of compact-wire-size / verbose-wire-size across writes.
    pub compression_ratio: f64,
}

impl Default for StreamCachePerformance {
    fn default() -> Self {
        Self { avg_hot_hit_time_ms: 0.0, avg_warm_hit_time_ms: 0.0, compression_ratio: 1.0 }
    }
}

/// Health snapshot (§4.6).
#[derive(Debug, Clone)]
pub struct StreamCacheHealth {
    /// Number of stream keys currently held in the hot tier.
    pub hot_cache_size: usize,
    /// Whether the warm tier answered a `PING`.
    pub redis_connected: bool,
    /// Most recent warm-tier error message, if any.
    pub last_error: Option<String>,
    /// Latency/compression performance snapshot.
    pub performance: StreamCachePerformance,
}

/// How aggressively [`StreamCache::clear`] is allowed to scan+unlink.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearOptions {
    /// Skip the large-volume chunked strategy even above the threshold.
    pub forced: bool,
    /// When set, only unlink keys with no expiry or a TTL above this many seconds.
    pub preserve_active_max_age_seconds: Option<u64>,
}

struct Stats {
    avg_hot_hit_ms: f64,
    avg_warm_hit_ms: f64,
    compression_ratio: f64,
    last_error: Option<String>,
}

impl Default for Stats {
    fn default() -> Self {
        Self { avg_hot_hit_ms: 0.0, avg_warm_hit_ms: 0.0, compression_ratio: 1.0, last_error: None }
    }
}

const EWMA_ALPHA: f64 = 0.2;

fn ewma(previous: f64, sample: f64) -> f64 {
    previous + EWMA_ALPHA * (sample - previous)
}

/// Two-tier (hot in-process + warm Redis) cache for stream data points (§4.5, §4.6).
pub struct StreamCache {
    hot: StreamHotCache,
    facade: RedisClientFacade,
    warm_prefix: String,
    warm_cache_ttl_seconds: u32,
    stream_batch_size: usize,
    events: Arc<dyn EventBus>,
    stats: parking_lot::Mutex<Stats>,
}

impl StreamCache {
    /// Builds a stream cache over `facade`, storing warm entries under `warm_prefix:<key>`.
    pub fn new(facade: RedisClientFacade, warm_prefix: impl Into<String>, hot_cache_ttl_ms: i64, max_hot_cache_size: usize, warm_cache_ttl_seconds: u32, stream_batch_size: usize) -> Self {
        Self {
            hot: StreamHotCache::new(max_hot_cache_size, hot_cache_ttl_ms),
            facade,
            warm_prefix: warm_prefix.into(),
            warm_cache_ttl_seconds,
            stream_batch_size,
            events: Arc::new(NullEventBus),
            stats: parking_lot::Mutex::new(Stats::default()),
        }
    }

    /// Routes metric events to `events` instead of the default no-op bus.
    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    fn warm_key(&self, key: &str) -> String {
        format!("{}:{}", self.warm_prefix, key)
    }

    fn emit(&self, name: &'static str, layer: CacheLayer) {
        self.events.emit(CacheEvent::counter("stream-cache", name).with_tag("layer", layer.tag()));
    }

    /// Reads `key`, preferring the hot tier; a warm hit is promoted to hot.
    pub async fn get(&self, key: &str) -> (Option<Vec<StreamDataPoint>>, CacheLayer) {
        let now = now_ms();
        let started = std::time::Instant::now();
        if let Some(points) = self.hot.get(key, now) {
            self.record_hit(CacheLayer::Hot, started.elapsed());
            self.emit(events::CACHE_GET_SUCCESS, CacheLayer::Hot);
            return (Some(points), CacheLayer::Hot);
        }

        let started = std::time::Instant::now();
        match self.facade.get(&self.warm_key(key)).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<StreamDataPoint>>(&raw) {
                Ok(points) => {
                    self.record_hit(CacheLayer::Warm, started.elapsed());
                    self.hot.set(key, points.clone(), now);
                    self.emit(events::CACHE_GET_SUCCESS, CacheLayer::Warm);
                    (Some(points), CacheLayer::Warm)
                }
                Err(err) => {
                    self.record_error(err.to_string());
                    self.emit(events::CACHE_GET_FAILED, CacheLayer::Warm);
                    (None, CacheLayer::Miss)
                }
            },
            Ok(None) => {
                self.emit(events::CACHE_GET_SUCCESS, CacheLayer::Miss);
                (None, CacheLayer::Miss)
            }
            Err(err) => {
                self.record_error(err.to_string());
                self.emit(events::CACHE_GET_FAILED, CacheLayer::Miss);
                (None, CacheLayer::Miss)
            }
        }
    }

    /// Writes `points`, always to warm; to hot per `priority` (§4.6).
    pub async fn set(&self, key: &str, points: Vec<StreamDataPoint>, priority: StoragePriority) -> bool {
        let now = now_ms();
        let serialized = match serde_json::to_string(&points) {
            Ok(s) => s,
            Err(err) => {
                self.record_error(err.to_string());
                return false;
            }
        };
        self.record_compression_ratio(&points, serialized.len());

        let write_ok = self
            .facade
            .set_ex(&self.warm_key(key), self.warm_cache_ttl_seconds as u64, &serialized)
            .await
            .map_err(|err| self.record_error(err.to_string()))
            .is_ok();

        let promote = match priority {
            StoragePriority::Hot => true,
            StoragePriority::Warm => false,
            StoragePriority::Auto => serialized.len() < PROMOTE_MAX_BYTES && points.len() < PROMOTE_MAX_POINTS,
        };
        if promote {
            self.hot.set(key, points, now);
        }
        write_ok
    }

    /// Fetches `key` and filters to points strictly after `since_ms`, preserving order (I6).
    pub async fn get_since(&self, key: &str, since_ms: i64) -> Option<Vec<StreamDataPoint>> {
        let (points, _layer) = self.get(key).await;
        let filtered: Vec<StreamDataPoint> = points?.into_iter().filter(|p| p.t > since_ms).collect();
        if filtered.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Resolves `keys` in order: hot first, then one pipeline per
    /// `stream_batch_size` chunk of remaining keys. Falls back to
    /// per-key `get` if a pipeline fails.
    pub async fn batch_get(&self, keys: &[String]) -> Vec<Option<Vec<StreamDataPoint>>> {
        let now = now_ms();
        let mut results: Vec<Option<Vec<StreamDataPoint>>> = vec![None; keys.len()];
        let mut pending: Vec<usize> = Vec::new();

        for (i, key) in keys.iter().enumerate() {
            if let Some(points) = self.hot.get(key, now) {
                results[i] = Some(points);
            } else {
                pending.push(i);
            }
        }

        for chunk in pending.chunks(self.stream_batch_size.max(1)) {
            let ops: Vec<PipelineOp> = chunk.iter().map(|&i| PipelineOp::Get(self.warm_key(&keys[i]))).collect();
            match self.facade.pipeline(&ops).await {
                Ok(replies) => {
                    for (&i, reply) in chunk.iter().zip(replies) {
                        if let PipelineReply::Bulk(Some(raw)) = reply {
                            if let Ok(points) = serde_json::from_str::<Vec<StreamDataPoint>>(&raw) {
                                self.hot.set(&keys[i], points.clone(), now);
                                results[i] = Some(points);
                            }
                        }
                    }
                }
                Err(err) => {
                    self.record_error(err.to_string());
                    for &i in chunk {
                        let (points, _layer) = self.get(&keys[i]).await;
                        results[i] = points;
                    }
                }
            }
        }
        results
    }

    /// Deletes keys matching `pattern` (under the warm prefix), choosing a
    /// strategy by volume (§4.6). Returns the number of keys removed.
    pub async fn clear(&self, pattern: &str, options: ClearOptions) -> Result<u64, CacheError> {
        let full_pattern = self.warm_key(pattern);
        let matched = self.facade.scan(&full_pattern, 0).await.map_err(|e| {
            self.record_error(e.to_string());
            CacheError::ServiceUnavailable(e.to_string())
        })?;

        if let Some(max_age_seconds) = options.preserve_active_max_age_seconds {
            return self.clear_preserve_active(matched, max_age_seconds).await;
        }
        if matched.len() < SMALL_CLEAR_THRESHOLD || options.forced {
            return self.clear_small(matched).await;
        }
        self.clear_large(matched).await
    }

    async fn clear_small(&self, keys: Vec<String>) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self.facade.unlink(&keys).await.map_err(|e| {
            self.record_error(e.to_string());
            CacheError::ServiceUnavailable(e.to_string())
        })?;
        for key in &keys {
            self.hot.remove(&self.strip_prefix(key));
        }
        Ok(removed)
    }

    async fn clear_large(&self, keys: Vec<String>) -> Result<u64, CacheError> {
        let mut total = 0u64;
        let chunks: Vec<&[String]> = keys.chunks(CLEAR_CHUNK_SIZE).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let removed = self.facade.unlink(chunk).await.map_err(|e| {
                self.record_error(e.to_string());
                CacheError::ServiceUnavailable(e.to_string())
            })?;
            total += removed;
            for key in *chunk {
                self.hot.remove(&self.strip_prefix(key));
            }
            if i + 1 < chunks.len() {
                tokio::time::sleep(CLEAR_PAUSE).await;
            }
        }
        Ok(total)
    }

    async fn clear_preserve_active(&self, keys: Vec<String>, max_age_seconds: u64) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let ops: Vec<PipelineOp> = keys.iter().map(|k| PipelineOp::Pttl(k.clone())).collect();
        let replies = self.facade.pipeline(&ops).await.map_err(|e| {
            self.record_error(e.to_string());
            CacheError::ServiceUnavailable(e.to_string())
        })?;

        let max_age_ms = (max_age_seconds.saturating_mul(1_000)) as i64;
        let victims: Vec<String> = keys
            .into_iter()
            .zip(replies)
            .filter_map(|(key, reply)| match reply {
                PipelineReply::Int(pttl_ms) if pttl_ms == -1 || pttl_ms > max_age_ms => Some(key),
                _ => None,
            })
            .collect();

        self.clear_small(victims).await
    }

    fn strip_prefix<'a>(&self, full_key: &'a str) -> &'a str {
        full_key.strip_prefix(&format!("{}:", self.warm_prefix)).unwrap_or(full_key)
    }

    fn record_hit(&self, layer: CacheLayer, elapsed: Duration) {
        let mut stats = self.stats.lock();
        let ms = elapsed.as_secs_f64() * 1_000.0;
        match layer {
            CacheLayer::Hot => stats.avg_hot_hit_ms = ewma(stats.avg_hot_hit_ms, ms),
            CacheLayer::Warm => stats.avg_warm_hit_ms = ewma(stats.avg_warm_hit_ms, ms),
            CacheLayer::Miss => {}
        }
    }

    fn record_compression_ratio(&self, points: &[StreamDataPoint], compact_len: usize) {
        let verbose_len: usize = points
            .iter()
            .map(|p| {
                serde_json::json!({
                    "symbol": p.s, "price": p.p, "volume": p.v,
                    "timestamp": p.t, "change": p.c, "changePercent": p.cp,
                })
                .to_string()
                .len()
            })
            .sum();
        if verbose_len == 0 {
            return;
        }
        let ratio = compact_len as f64 / verbose_len as f64;
        let mut stats = self.stats.lock();
        stats.compression_ratio = ewma(stats.compression_ratio, ratio);
    }

    fn record_error(&self, message: String) {
        warn!(error = %message, "stream cache warm-tier error");
        self.stats.lock().last_error = Some(message);
    }

    /// Current health snapshot (§4.6).
    pub async fn health(&self) -> StreamCacheHealth {
        let redis_connected = self.facade.ping().await.is_ok();
        let stats = self.stats.lock();
        StreamCacheHealth {
            hot_cache_size: self.hot.len(),
            redis_connected,
            last_error: stats.last_error.clone(),
            performance: StreamCachePerformance {
                avg_hot_hit_time_ms: stats.avg_hot_hit_ms,
                avg_warm_hit_time_ms: stats.avg_warm_hit_ms,
                compression_ratio: stats.compression_ratio,
            },
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> StreamCache {
        let facade = RedisClientFacade::new("redis://127.0.0.1:1/", 31_536_000).unwrap();
        StreamCache::new(facade, "stream", 10_000, 1_000, 3_600, 50)
    }

    #[test]
    fn warm_key_prefixes_with_configured_prefix() {
        let cache = cache();
        assert_eq!(cache.warm_key("AAPL"), "stream:AAPL");
    }

    #[test]
    fn strip_prefix_recovers_the_bare_stream_key() {
        let cache = cache();
        assert_eq!(cache.strip_prefix("stream:AAPL"), "AAPL");
        assert_eq!(cache.strip_prefix("unrelated"), "unrelated");
    }

    #[tokio::test]
    async fn get_since_preserves_order_and_filters_by_timestamp() {
        let cache = cache();
        let points = vec![
            StreamDataPoint::new("AAPL", 100.0, 1.0, 1_000),
            StreamDataPoint::new("AAPL", 101.0, 1.0, 2_000),
            StreamDataPoint::new("AAPL", 102.0, 1.0, 3_000),
        ];
        cache.hot.set("AAPL", points.clone(), now_ms());
        let since = cache.get_since("AAPL", 1_500).await.unwrap();
        assert_eq!(since, points[1..].to_vec());
    }

    #[tokio::test]
    async fn get_since_returns_none_when_nothing_qualifies() {
        let cache = cache();
        cache.hot.set("AAPL", vec![StreamDataPoint::new("AAPL", 100.0, 1.0, 1_000)], now_ms());
        assert!(cache.get_since("AAPL", 5_000).await.is_none());
    }
}
