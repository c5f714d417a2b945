//! Configuration surface (§6) for the smart caching core.
//!
//! [`Config`] is a plain `serde`-deserializable struct covering every field
//! enumerated in spec.md §6. [`ConfigBuilder`] mirrors the chainable-setter
//! shape of `hitbox::config::ConfigBuilder`, minus its generic typestate —
//! there is exactly one concrete config shape here, not one per consumer
//! request type.

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// TTL selection inputs for the orchestrator's strategy table (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtlSettings {
    /// TTL for `STRONG_TIMELINESS`.
    pub real_time_ttl_seconds: u32,
    /// TTL for `ADAPTIVE` and the open-market `MARKET_AWARE` branch.
    pub near_real_time_ttl_seconds: u32,
    /// TTL for `WEAK_TIMELINESS`.
    pub batch_query_ttl_seconds: u32,
    /// TTL for `MARKET_AWARE` when the market is closed (not a holiday).
    pub off_hours_ttl_seconds: u32,
    /// TTL for `MARKET_AWARE` when the market reports a holiday.
    pub weekend_ttl_seconds: u32,
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            real_time_ttl_seconds: 5,
            near_real_time_ttl_seconds: 30,
            batch_query_ttl_seconds: 300,
            off_hours_ttl_seconds: 1800,
            weekend_ttl_seconds: 86_400,
        }
    }
}

/// Throughput/latency budget knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSettings {
    /// Soft memory budget for the process, used by the decompression governor.
    pub max_memory_mb: u32,
    /// Default page size for batch operations that don't specify one.
    pub default_batch_size: usize,
    /// Default initial concurrency for bounded-concurrency subsystems.
    pub max_concurrent_operations: usize,
    /// Operations slower than this are worth a `warn!` log line.
    pub slow_operation_threshold_ms: u64,
    /// Per-call timeout applied to every Redis operation.
    pub connection_timeout_ms: u64,
    /// Deadline inherited by every `fetchFn` invocation.
    pub operation_timeout_ms: u64,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            default_batch_size: 100,
            max_concurrent_operations: 10,
            slow_operation_threshold_ms: 200,
            connection_timeout_ms: 2_000,
            operation_timeout_ms: 5_000,
        }
    }
}

/// Periodic background task cadences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalSettings {
    /// How often expired local-state cleanup runs.
    pub cleanup_interval_ms: u64,
    /// How often backend health is probed.
    pub health_check_interval_ms: u64,
    /// How often aggregated metrics are flushed.
    pub metrics_collection_interval_ms: u64,
    /// How often a liveness heartbeat event is emitted.
    pub heartbeat_interval_ms: u64,
}

impl Default for IntervalSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: 60_000,
            health_check_interval_ms: 30_000,
            metrics_collection_interval_ms: 10_000,
            heartbeat_interval_ms: 15_000,
        }
    }
}

/// Hard limits enforced at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSettings {
    /// Maximum length, in bytes, of a constructed cache key (I7).
    pub max_key_length: usize,
    /// Maximum size, in bytes, of a single stored value.
    pub max_value_size_bytes: usize,
    /// Soft cap on total tracked cache entries (used by hot-cache sizing).
    pub max_cache_entries: usize,
    /// Fraction of `max_memory_mb` considered "under pressure".
    pub memory_threshold_ratio: f64,
    /// Error rate above which alerting should fire.
    pub error_rate_alert_threshold: f64,
    /// Hard ceiling on batch operation size; exceeding it is an error.
    pub max_batch_size: usize,
    /// Maximum entries per Redis pipeline chunk.
    pub pipeline_max_size: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_key_length: 512,
            max_value_size_bytes: 10 * 1024 * 1024,
            max_cache_entries: 100_000,
            memory_threshold_ratio: 0.85,
            error_rate_alert_threshold: 0.05,
            max_batch_size: 1_000,
            pipeline_max_size: 100,
        }
    }
}

/// Exponential backoff parameters for idempotent Redis retries (§7).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    /// Maximum retry attempts before giving up.
    pub max_retry_attempts: u32,
    /// Delay before the first retry.
    pub base_retry_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub retry_delay_multiplier: f64,
    /// Upper bound on the computed delay.
    pub max_retry_delay_ms: u64,
    /// Whether backoff grows exponentially or stays fixed at `base_retry_delay_ms`.
    pub exponential_backoff_enabled: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            base_retry_delay_ms: 50,
            retry_delay_multiplier: 2.0,
            max_retry_delay_ms: 2_000,
            exponential_backoff_enabled: true,
        }
    }
}

/// Stream-cache-specific tuning (§6, "Stream-specific").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    /// Hot-tier entry lifetime.
    pub hot_cache_ttl_ms: i64,
    /// Warm-tier (Redis) entry lifetime.
    pub warm_cache_ttl_seconds: u32,
    /// Maximum number of keys held in the hot tier.
    pub max_hot_cache_size: usize,
    /// Default chunk size for `BatchGet`.
    pub stream_batch_size: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            hot_cache_ttl_ms: 10_000,
            warm_cache_ttl_seconds: 3_600,
            max_hot_cache_size: 1_000,
            stream_batch_size: 50,
        }
    }
}

/// Root configuration for the smart caching core (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// TTL used when no more specific rule applies.
    pub default_ttl_seconds: u32,
    /// Floor every effective TTL is clamped to (I1).
    pub min_ttl_seconds: u32,
    /// Ceiling every effective TTL is clamped to (I1).
    pub max_ttl_seconds: u32,
    /// Master switch for gzip compression in the serializer.
    pub compression_enabled: bool,
    /// Values smaller than this are never compressed.
    pub compression_threshold_bytes: usize,
    /// Sentinel TTL used when Redis `PTTL` reports "no expiry" (`-1`).
    pub no_expire_ttl_seconds: u64,
    /// Strategy TTL table.
    pub ttl: TtlSettings,
    /// Throughput/latency knobs.
    pub performance: PerformanceSettings,
    /// Background task cadences.
    pub intervals: IntervalSettings,
    /// Hard limits.
    pub limits: LimitSettings,
    /// Retry/backoff parameters.
    pub retry: RetrySettings,
    /// Stream-cache tuning.
    pub stream: StreamSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 300,
            min_ttl_seconds: 1,
            max_ttl_seconds: 86_400,
            compression_enabled: true,
            compression_threshold_bytes: 1_024,
            no_expire_ttl_seconds: 31_536_000,
            ttl: TtlSettings::default(),
            performance: PerformanceSettings::default(),
            intervals: IntervalSettings::default(),
            limits: LimitSettings::default(),
            retry: RetrySettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl Config {
    /// Creates a [`ConfigBuilder`] seeded with defaults.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Clamps `ttl` into `[min_ttl_seconds, max_ttl_seconds]` (I1).
    pub fn clamp_ttl(&self, ttl: u32) -> u32 {
        ttl.clamp(self.min_ttl_seconds, self.max_ttl_seconds)
    }

    /// Validates static invariants. Startup should treat failure as fatal (§7).
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.min_ttl_seconds > self.max_ttl_seconds {
            return Err(CacheError::Configuration(format!(
                "min_ttl_seconds ({}) exceeds max_ttl_seconds ({})",
                self.min_ttl_seconds, self.max_ttl_seconds
            )));
        }
        if !(self.min_ttl_seconds..=self.max_ttl_seconds).contains(&self.default_ttl_seconds) {
            return Err(CacheError::Configuration(format!(
                "default_ttl_seconds ({}) must be within [{}, {}]",
                self.default_ttl_seconds, self.min_ttl_seconds, self.max_ttl_seconds
            )));
        }
        if self.limits.max_batch_size == 0 {
            return Err(CacheError::Configuration("limits.max_batch_size must be > 0".into()));
        }
        if self.limits.pipeline_max_size == 0 {
            return Err(CacheError::Configuration("limits.pipeline_max_size must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.limits.memory_threshold_ratio) {
            return Err(CacheError::Configuration(
                "limits.memory_threshold_ratio must be within [0.0, 1.0]".into(),
            ));
        }
        if self.stream.max_hot_cache_size == 0 {
            return Err(CacheError::Configuration("stream.max_hot_cache_size must be > 0".into()));
        }
        if self.retry.retry_delay_multiplier < 1.0 {
            return Err(CacheError::Configuration(
                "retry.retry_delay_multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Chainable builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: ConfigOrDefault,
}

#[derive(Debug, Clone)]
struct ConfigOrDefault(Config);

impl Default for ConfigOrDefault {
    fn default() -> Self {
        Self(Config::default())
    }
}

impl ConfigBuilder {
    /// Overrides `default_ttl_seconds`.
    pub fn default_ttl_seconds(mut self, value: u32) -> Self {
        self.config.0.default_ttl_seconds = value;
        self
    }

    /// Overrides the `[min_ttl_seconds, max_ttl_seconds]` bounds.
    pub fn ttl_bounds(mut self, min: u32, max: u32) -> Self {
        self.config.0.min_ttl_seconds = min;
        self.config.0.max_ttl_seconds = max;
        self
    }

    /// Overrides `compression_enabled`/`compression_threshold_bytes`.
    pub fn compression(mut self, enabled: bool, threshold_bytes: usize) -> Self {
        self.config.0.compression_enabled = enabled;
        self.config.0.compression_threshold_bytes = threshold_bytes;
        self
    }

    /// Overrides the TTL strategy table.
    pub fn ttl_settings(mut self, ttl: TtlSettings) -> Self {
        self.config.0.ttl = ttl;
        self
    }

    /// Overrides performance knobs.
    pub fn performance(mut self, performance: PerformanceSettings) -> Self {
        self.config.0.performance = performance;
        self
    }

    /// Overrides background task cadences.
    pub fn intervals(mut self, intervals: IntervalSettings) -> Self {
        self.config.0.intervals = intervals;
        self
    }

    /// Overrides hard limits.
    pub fn limits(mut self, limits: LimitSettings) -> Self {
        self.config.0.limits = limits;
        self
    }

    /// Overrides retry/backoff parameters.
    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.config.0.retry = retry;
        self
    }

    /// Overrides stream-cache tuning.
    pub fn stream(mut self, stream: StreamSettings) -> Self {
        self.config.0.stream = stream;
        self
    }

    /// Builds and validates the [`Config`].
    pub fn build(self) -> Result<Config, CacheError> {
        self.config.0.validate()?;
        Ok(self.config.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn builder_rejects_inverted_ttl_bounds() {
        let err = Config::builder().ttl_bounds(100, 10).build().unwrap_err();
        assert!(matches!(err, CacheError::Configuration(_)));
    }

    #[test]
    fn clamp_ttl_respects_bounds() {
        let config = Config::builder().ttl_bounds(10, 100).build().unwrap();
        assert_eq!(config.clamp_ttl(5), 10);
        assert_eq!(config.clamp_ttl(500), 100);
        assert_eq!(config.clamp_ttl(50), 50);
    }
}
