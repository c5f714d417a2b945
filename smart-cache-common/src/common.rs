//! Common Cache (C): single-key and batch operations over the Redis facade.

use serde::de::DeserializeOwned;
use serde::Serialize;
use smart_cache_codec::{decode, from_wire_json, serialize, to_wire_json, Decoded};
use smart_cache_core::config::Config;
use smart_cache_core::orchestrator::FetchFn;
use smart_cache_core::CacheError;
use smart_cache_redis::{PipelineOp, RedisClientFacade};
use tracing::warn;

use crate::result_types::{
    EnhancedGetResult, EnhancedSetSummary, EntryMetadata, GetOptions, ResultSource, SetOptions, SetOutcome,
};

/// Value plus remaining TTL returned by [`CommonCache::get`] and friends.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResult<T> {
    /// The decoded value.
    pub data: T,
    /// Seconds of TTL remaining when this was read.
    pub ttl_remaining_seconds: u64,
}

/// One entry submitted to [`CommonCache::mget_enhanced`].
pub struct EnhancedGetRequest<T> {
    /// Key to read.
    pub key: String,
    /// Invoked on miss (or on a stale hit, per `options.max_age_seconds`).
    pub fetch_fn: Option<Box<dyn FetchFn<T>>>,
    /// TTL applied if `fetch_fn` writes a fresh value.
    pub ttl_seconds: Option<u32>,
    /// Per-request read options.
    pub options: GetOptions,
}

/// One entry submitted to [`CommonCache::mset_enhanced`].
pub struct EnhancedSetRequest<T> {
    /// Key to write.
    pub key: String,
    /// Value to write.
    pub value: T,
    /// TTL to apply.
    pub ttl_seconds: u32,
    /// Per-entry write options.
    pub options: SetOptions,
}

/// Single-key and batch cache operations (§4.3).
///
/// Every read-path method swallows errors and returns `None`/`false`/an
/// empty slot rather than propagating — per §7, only batch-size overflow
/// and `fetchFn` errors are allowed to surface as [`CacheError`].
#[derive(Clone)]
pub struct CommonCache {
    facade: RedisClientFacade,
    config: Config,
}

impl CommonCache {
    /// Builds a cache over `facade`, using `config` for TTL clamping and
    /// limits. `config.retry` is applied to `facade` so every idempotent
    /// read this cache issues retries with the configured backoff (§7).
    pub fn new(facade: RedisClientFacade, config: Config) -> Self {
        let facade = facade.with_retry_settings(config.retry);
        Self { facade, config }
    }

    fn check_batch_size(&self, len: usize) -> Result<(), CacheError> {
        if len > self.config.limits.max_batch_size {
            return Err(CacheError::BatchTooLarge { size: len, limit: self.config.limits.max_batch_size });
        }
        Ok(())
    }

    /// `GET key` + `PTTL key`, issued concurrently. Returns `None` on miss or any error.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<GetResult<T>> {
        let (data, pttl) = tokio::join!(self.facade.get(key), self.facade.pttl(key));
        let raw = match data {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, error = %err, "common cache get failed");
                return None;
            }
        };
        let ttl_remaining_seconds = pttl.unwrap_or(0);
        decode_entry(key, &raw).map(|data| GetResult { data, ttl_remaining_seconds })
    }

    /// Clamps `ttl_seconds` to the configured bounds, serializes with the
    /// configured compression policy, and `SETEX`s. Swallows failures.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u32) -> bool {
        let ttl = self.config.clamp_ttl(ttl_seconds);
        let entry = match serialize(value, now_ms(), self.config.compression_threshold_bytes, self.config.compression_enabled) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, error = %err, "common cache serialize failed");
                return false;
            }
        };
        let wire = match to_wire_json(&entry) {
            Ok(wire) => wire,
            Err(err) => {
                warn!(key, error = %err, "common cache envelope encoding failed");
                return false;
            }
        };
        match self.facade.set_ex(key, ttl as u64, &wire).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "common cache set failed");
                false
            }
        }
    }

    /// `DEL key`.
    pub async fn delete(&self, key: &str) -> bool {
        match self.facade.del(key).await {
            Ok(count) => count > 0,
            Err(err) => {
                warn!(key, error = %err, "common cache delete failed");
                false
            }
        }
    }

    /// Pipelined `MGET` plus one `PTTL` per key, issued concurrently (I5).
    pub async fn mget<T: DeserializeOwned>(&self, keys: &[String]) -> Result<Vec<Option<GetResult<T>>>, CacheError> {
        self.check_batch_size(keys.len())?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let pttl_ops: Vec<_> = keys.iter().map(|k| self.facade.pttl(k)).collect();
        let (values, pttls) = tokio::join!(self.facade.mget(keys), futures::future::join_all(pttl_ops));

        let values = match values {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "common cache mget failed");
                return Ok(keys.iter().map(|_| None).collect());
            }
        };

        Ok(keys
            .iter()
            .zip(values)
            .zip(pttls)
            .map(|((key, raw), pttl)| {
                let raw = raw?;
                let ttl_remaining_seconds = pttl.unwrap_or(0);
                decode_entry(key, &raw).map(|data| GetResult { data, ttl_remaining_seconds })
            })
            .collect())
    }

    /// Writes `entries` in chunks of `limits.pipelineMaxSize`. A chunk fails
    /// only if every entry in it fails to serialize or write.
    pub async fn mset<T: Serialize>(&self, entries: &[(String, T, u32)]) -> Result<Vec<bool>, CacheError> {
        self.check_batch_size(entries.len())?;
        let chunk_size = self.config.limits.pipeline_max_size.max(1);
        let mut results = Vec::with_capacity(entries.len());

        for chunk in entries.chunks(chunk_size) {
            let mut ops = Vec::with_capacity(chunk.len());
            let mut serialized_ok = Vec::with_capacity(chunk.len());
            for (key, value, ttl_seconds) in chunk {
                let ttl = self.config.clamp_ttl(*ttl_seconds);
                let wire = serialize(value, now_ms(), self.config.compression_threshold_bytes, self.config.compression_enabled)
                    .and_then(|entry| to_wire_json(&entry));
                match wire {
                    Ok(wire) => {
                        ops.push(PipelineOp::SetEx(key.clone(), ttl as u64, wire));
                        serialized_ok.push(true);
                    }
                    Err(err) => {
                        warn!(key = %key, error = %err, "common cache mset serialize failed");
                        serialized_ok.push(false);
                    }
                }
            }
            if ops.is_empty() {
                results.extend(serialized_ok.iter().map(|_| false));
                continue;
            }
            let outcome = self.facade.pipeline(&ops).await;
            let pipeline_ok = outcome.is_ok();
            if outcome.is_err() {
                warn!(error = ?outcome.err(), "common cache mset pipeline failed");
            }
            let mut ok_iter = serialized_ok.into_iter();
            for serialized in ok_iter.by_ref() {
                results.push(serialized && pipeline_ok);
            }
        }
        Ok(results)
    }

    /// [`CommonCache::mget`] plus, per request, an optional `fetch_fn` and
    /// freshness policy (§4.3).
    pub async fn mget_enhanced<T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static>(
        &self,
        requests: Vec<EnhancedGetRequest<T>>,
    ) -> Result<Vec<EnhancedGetResult<T>>, CacheError> {
        self.check_batch_size(requests.len())?;
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            if !request.options.use_cache {
                results.push(self.fetch_only(request).await);
                continue;
            }

            match self.get::<T>(&request.key).await {
                Some(hit) => {
                    let stale = request
                        .options
                        .max_age_seconds
                        .is_some_and(|max_age| hit.ttl_remaining_seconds < max_age);
                    if stale && request.fetch_fn.is_some() {
                        results.push(self.refresh_or_fallback(request, hit).await);
                    } else {
                        results.push(EnhancedGetResult {
                            key: request.key,
                            data: Some(hit.data),
                            hit: true,
                            ttl_remaining: Some(hit.ttl_remaining_seconds),
                            source: ResultSource::Cache,
                            metadata: request.options.include_metadata.then_some(EntryMetadata { stored_at_ms: now_ms() }),
                        });
                    }
                }
                None => results.push(self.fetch_only(request).await),
            }
        }
        Ok(results)
    }

    async fn fetch_only<T: Serialize + Clone + Send + Sync + 'static>(&self, request: EnhancedGetRequest<T>) -> EnhancedGetResult<T> {
        let key = request.key;
        match request.fetch_fn {
            None => EnhancedGetResult { key, data: None, hit: false, ttl_remaining: None, source: ResultSource::Error, metadata: None },
            Some(fetch_fn) => match fetch_fn.call().await {
                Ok(value) => {
                    if let Some(ttl) = request.ttl_seconds {
                        let cache = self.clone();
                        let write_key = key.clone();
                        let write_value = value.clone();
                        tokio::spawn(async move {
                            cache.set(&write_key, &write_value, ttl).await;
                        });
                    }
                    EnhancedGetResult { key, data: Some(value), hit: false, ttl_remaining: Some(0), source: ResultSource::Fetch, metadata: None }
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "mget_enhanced fetch failed");
                    EnhancedGetResult { key, data: None, hit: false, ttl_remaining: None, source: ResultSource::Error, metadata: None }
                }
            },
        }
    }

    async fn refresh_or_fallback<T: Serialize + Clone + Send + 'static>(
        &self,
        request: EnhancedGetRequest<T>,
        stale_hit: GetResult<T>,
    ) -> EnhancedGetResult<T> {
        let key = request.key.clone();
        let ttl_seconds = request.ttl_seconds;
        let Some(fetch_fn) = request.fetch_fn else {
            return EnhancedGetResult {
                key,
                data: Some(stale_hit.data),
                hit: true,
                ttl_remaining: Some(stale_hit.ttl_remaining_seconds),
                source: ResultSource::Cache,
                metadata: None,
            };
        };
        match fetch_fn.call().await {
            Ok(value) => {
                if let Some(ttl) = ttl_seconds {
                    self.set(&key, &value, ttl).await;
                }
                EnhancedGetResult { key, data: Some(value), hit: false, ttl_remaining: Some(0), source: ResultSource::Fetch, metadata: None }
            }
            Err(err) => {
                warn!(key = %key, error = %err, "stale re-fetch failed, serving stale cache");
                EnhancedGetResult {
                    key,
                    data: Some(stale_hit.data),
                    hit: true,
                    ttl_remaining: Some(stale_hit.ttl_remaining_seconds),
                    source: ResultSource::Cache,
                    metadata: None,
                }
            }
        }
    }

    /// Writes `entries` honoring per-entry `skip_if_exists`/`only_if_exists` (§4.3).
    pub async fn mset_enhanced<T: Serialize>(&self, entries: Vec<EnhancedSetRequest<T>>) -> Result<EnhancedSetSummary, CacheError> {
        self.check_batch_size(entries.len())?;
        let total = entries.len();

        let conditional_keys: Vec<String> = entries
            .iter()
            .filter(|e| e.options.skip_if_exists || e.options.only_if_exists)
            .map(|e| e.key.clone())
            .collect();
        let mut existence = std::collections::HashMap::new();
        if !conditional_keys.is_empty() {
            let checks = futures::future::join_all(conditional_keys.iter().map(|k| self.facade.exists(k))).await;
            for (key, exists) in conditional_keys.into_iter().zip(checks) {
                existence.insert(key, exists.unwrap_or(false));
            }
        }

        let mut summary = EnhancedSetSummary { total, ..Default::default() };
        for entry in entries {
            let exists = existence.get(&entry.key).copied().unwrap_or(false);
            if entry.options.skip_if_exists && exists {
                summary.skipped += 1;
                summary.details.push(SetOutcome::Skipped);
                continue;
            }
            if entry.options.only_if_exists && !exists {
                summary.skipped += 1;
                summary.details.push(SetOutcome::Skipped);
                continue;
            }
            if self.set(&entry.key, &entry.value, entry.ttl_seconds).await {
                summary.successful += 1;
                summary.details.push(SetOutcome::Written);
            } else {
                summary.failed += 1;
                summary.details.push(SetOutcome::Failed(entry.key.clone()));
            }
        }
        Ok(summary)
    }

    /// Like [`CommonCache::mget`] but also surfaces `stored_at_ms` without
    /// re-deserializing, so the orchestrator can evaluate refresh eligibility.
    pub async fn mget_with_metadata<T: DeserializeOwned>(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<(GetResult<T>, EntryMetadata)>>, CacheError> {
        self.check_batch_size(keys.len())?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let pttl_ops: Vec<_> = keys.iter().map(|k| self.facade.pttl(k)).collect();
        let (values, pttls) = tokio::join!(self.facade.mget(keys), futures::future::join_all(pttl_ops));
        let values = values.unwrap_or_else(|_| keys.iter().map(|_| None).collect());

        Ok(keys
            .iter()
            .zip(values)
            .zip(pttls)
            .map(|((key, raw), pttl)| {
                let raw = raw?;
                let stored_at_ms = stored_at_ms_of(&raw)?;
                let ttl_remaining_seconds = pttl.unwrap_or(0);
                decode_entry(key, &raw).map(|data| (GetResult { data, ttl_remaining_seconds }, EntryMetadata { stored_at_ms }))
            })
            .collect())
    }

    /// Cache-aside convenience: on miss, calls `fetch_fn`, writes the result
    /// back asynchronously, and returns it immediately.
    pub async fn get_with_fallback<T, F, Fut>(&self, key: &str, fetch_fn: F, ttl_seconds: u32) -> Option<T>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, CacheError>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Some(hit.data);
        }
        match fetch_fn().await {
            Ok(value) => {
                let cache = self.clone();
                let key = key.to_string();
                let write_value = value.clone();
                tokio::spawn(async move {
                    cache.set(&key, &write_value, ttl_seconds).await;
                });
                Some(value)
            }
            Err(err) => {
                warn!(key = %key, error = %err, "get_with_fallback fetch failed");
                None
            }
        }
    }
}

fn decode_entry<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    let entry = match from_wire_json(raw) {
        Ok(entry) => entry,
        Err(err) => {
            warn!(key, error = %err, "malformed envelope, dropping entry");
            return None;
        }
    };
    match decode::<T>(&entry) {
        Decoded::Parsed(value) => Some(value),
        Decoded::Raw { error, .. } => {
            warn!(key, error = %error, "decompression/parse fallback produced no typed value");
            None
        }
    }
}

fn stored_at_ms_of(raw: &str) -> Option<i64> {
    from_wire_json(raw).ok().map(|entry| entry.stored_at_ms)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with(config: Config) -> CommonCache {
        let facade = RedisClientFacade::new("redis://127.0.0.1:1/", 31_536_000).unwrap();
        CommonCache::new(facade, config)
    }

    #[test]
    fn batch_size_at_limit_is_accepted() {
        let cache = cache_with(Config::default());
        let limit = cache.config.limits.max_batch_size;
        assert!(cache.check_batch_size(limit).is_ok());
    }

    #[test]
    fn batch_size_over_limit_is_rejected() {
        let cache = cache_with(Config::default());
        let limit = cache.config.limits.max_batch_size;
        let err = cache.check_batch_size(limit + 1).unwrap_err();
        assert_eq!(err.tag(), "batch_too_large");
    }

    #[tokio::test]
    async fn mget_rejects_oversized_batch_before_touching_the_network() {
        let mut config = Config::default();
        config.limits.max_batch_size = 2;
        let cache = cache_with(config);
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = cache.mget::<String>(&keys).await.unwrap_err();
        assert_eq!(err.tag(), "batch_too_large");
    }

    #[tokio::test]
    async fn mset_enhanced_rejects_oversized_batch_before_touching_the_network() {
        let mut config = Config::default();
        config.limits.max_batch_size = 1;
        let cache = cache_with(config);
        let entries = vec![
            EnhancedSetRequest { key: "a".into(), value: 1u32, ttl_seconds: 60, options: SetOptions::default() },
            EnhancedSetRequest { key: "b".into(), value: 2u32, ttl_seconds: 60, options: SetOptions::default() },
        ];
        let err = cache.mset_enhanced(entries).await.unwrap_err();
        assert_eq!(err.tag(), "batch_too_large");
    }
}
