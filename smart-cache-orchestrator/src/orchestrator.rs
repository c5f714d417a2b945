//! Smart Cache Orchestrator (J): strategy dispatch, single-flight, and
//! background refresh over [`smart_cache_common::CommonCache`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use smart_cache_common::CommonCache;
use smart_cache_core::config::Config;
use smart_cache_core::{
    events, CacheError, CacheEvent, CacheKey, CacheStrategy, EventBus, MarketState, MarketStatusProvider,
    NullEventBus, OrchestratorRequest, OrchestratorResult,
};
use smart_cache_redis::RedisClientFacade;
use tracing::{debug, warn};

use crate::flight::{FlightDecision, SingleFlight};
use crate::refresh::{RefreshPolicy, RefreshTracker};

const DEFAULT_MARKET_CODE: &str = "NASDAQ";

/// Point-in-time counters surfaced by [`Orchestrator::get_stats`].
#[derive(Debug, Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    fetch_errors: AtomicU64,
    background_refreshes_scheduled: AtomicU64,
    background_refreshes_completed: AtomicU64,
    background_refreshes_failed: AtomicU64,
}

/// Snapshot of [`Counters`] returned by [`Orchestrator::get_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    /// Requests resolved from cache.
    pub cache_hits: u64,
    /// Requests that missed cache and ran `fetchFn`.
    pub cache_misses: u64,
    /// `fetchFn` invocations that returned an error.
    pub fetch_errors: u64,
    /// Background refreshes enqueued.
    pub background_refreshes_scheduled: u64,
    /// Background refreshes that completed successfully.
    pub background_refreshes_completed: u64,
    /// Background refreshes that failed.
    pub background_refreshes_failed: u64,
}

/// Health snapshot returned by [`Orchestrator::get_health`].
#[derive(Debug, Clone)]
pub struct OrchestratorHealth {
    /// Whether the last `PING` to Redis succeeded.
    pub redis_connected: bool,
    /// Keys with a `fetchFn` currently in flight.
    pub in_flight_keys: usize,
    /// Background refreshes currently running.
    pub active_refreshes: usize,
}

/// Coordinates cache reads/writes, strategy-driven TTL selection,
/// single-flight de-duplication, and background refresh for value type `T`.
///
/// Scoped to one value type per instance (as `OrchestratorRequest<T>`'s own
/// doc comment frames it: "ephemeral; one per caller invocation") rather
/// than attempting a heterogeneous-`T` orchestrator — callers needing
/// several response types run one `Orchestrator<T>` per type, the same way
/// a service would hold one typed repository per entity.
pub struct Orchestrator<T> {
    cache: CommonCache,
    facade: RedisClientFacade,
    config: Config,
    market: Arc<dyn MarketStatusProvider>,
    events: Arc<dyn EventBus>,
    default_market_code: String,
    refresh_policy: RefreshPolicy,
    flight: SingleFlight<T>,
    refresh: RefreshTracker,
    counters: Arc<Counters>,
}

impl<T> Orchestrator<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Builds an orchestrator over `facade`, using `market` for
    /// `MARKET_AWARE` TTL lookups. Events are dropped ([`NullEventBus`])
    /// until [`Self::with_event_bus`] is called.
    pub fn new(facade: RedisClientFacade, config: Config, market: Arc<dyn MarketStatusProvider>) -> Self {
        let facade = facade.with_retry_settings(config.retry);
        Self {
            cache: CommonCache::new(facade.clone(), config.clone()),
            facade,
            config,
            market,
            events: Arc::new(NullEventBus),
            default_market_code: DEFAULT_MARKET_CODE.to_string(),
            refresh_policy: RefreshPolicy::default(),
            flight: SingleFlight::new(),
            refresh: RefreshTracker::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Wires an [`EventBus`] other than the no-op default.
    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Overrides the market code used for `MARKET_AWARE` requests that
    /// don't carry a `marketCode` entry in `OrchestratorRequest::metadata`.
    pub fn with_default_market_code(mut self, market_code: impl Into<String>) -> Self {
        self.default_market_code = market_code.into();
        self
    }

    /// Overrides the background-refresh eligibility thresholds.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Resolves one request per spec.md §4.9's execution pseudocode:
    /// cache hit short-circuits (scheduling a background refresh if stale),
    /// `NO_CACHE` always fetches, everything else funnels through
    /// single-flight on miss.
    pub async fn orchestrate(&self, request: OrchestratorRequest<T>) -> OrchestratorResult<T> {
        let key = request.cache_key.clone();
        let strategy = request.strategy;
        let ttl = self.resolve_ttl(strategy, &request).await;

        if ttl > 0 {
            if let Some(hit) = self.cache.get::<T>(key.as_str()).await {
                self.emit_counter(events::CACHE_GET_SUCCESS, &key);
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                if self.refresh_policy.applies_to(strategy)
                    && self.refresh_policy.is_stale(strategy, hit.ttl_remaining_seconds, ttl as u64)
                {
                    self.schedule_refresh(key.clone(), strategy, ttl, request.fetch_fn);
                }
                return OrchestratorResult::hit(hit.data, key, strategy, hit.ttl_remaining_seconds);
            }
        }

        if ttl == 0 {
            return self.fetch_only(request, key, strategy).await;
        }

        match self.flight.enter(&key) {
            FlightDecision::Leader => self.fetch_set_and_resolve(request, key, strategy, ttl).await,
            FlightDecision::Follower(mut rx) => match rx.recv().await {
                Ok(outcome) => outcome_to_result(&outcome, key, strategy),
                Err(_) => {
                    debug!(key = %key, "single-flight broadcast missed, falling through to a direct fetch");
                    self.fetch_set_and_resolve(request, key, strategy, ttl).await
                }
            },
        }
    }

    /// Runs [`Self::orchestrate`] for every request concurrently, sharing
    /// the single-flight map across the batch.
    pub async fn batch_orchestrate(&self, requests: Vec<OrchestratorRequest<T>>) -> Vec<OrchestratorResult<T>> {
        let futures = requests.into_iter().map(|request| self.orchestrate(request));
        futures::future::join_all(futures).await
    }

    async fn resolve_ttl(&self, strategy: CacheStrategy, request: &OrchestratorRequest<T>) -> u32 {
        match strategy {
            CacheStrategy::NoCache => 0,
            CacheStrategy::StrongTimeliness => self.config.ttl.real_time_ttl_seconds.max(1),
            CacheStrategy::WeakTimeliness => self.config.ttl.batch_query_ttl_seconds,
            CacheStrategy::Adaptive => self.config.ttl.near_real_time_ttl_seconds,
            CacheStrategy::MarketAware => self.market_aware_ttl(request).await,
        }
    }

    async fn market_aware_ttl(&self, request: &OrchestratorRequest<T>) -> u32 {
        let market_code = request
            .metadata
            .as_ref()
            .and_then(|tags| tags.get("marketCode"))
            .cloned()
            .unwrap_or_else(|| self.default_market_code.clone());
        match self.market.get_market_status(&market_code).await {
            Ok(status) if status.is_holiday() => self.config.ttl.weekend_ttl_seconds,
            Ok(status) if matches!(status.status, MarketState::Trading | MarketState::PreMarket) => {
                self.config.ttl.near_real_time_ttl_seconds
            }
            Ok(_closed) => self.config.ttl.off_hours_ttl_seconds,
            Err(err) => {
                warn!(market_code = %market_code, error = %err, "market status lookup failed, falling back to near-real-time ttl");
                self.config.ttl.near_real_time_ttl_seconds
            }
        }
    }

    async fn fetch_only(&self, request: OrchestratorRequest<T>, key: CacheKey, strategy: CacheStrategy) -> OrchestratorResult<T> {
        match request.fetch_fn.call().await {
            Ok(data) => {
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                OrchestratorResult::miss(data, key, strategy, Some(0))
            }
            Err(err) => {
                self.counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                self.emit_counter(events::CACHE_GET_FAILED, &key);
                OrchestratorResult::error(key, strategy, err.to_string())
            }
        }
    }

    async fn fetch_set_and_resolve(
        &self,
        request: OrchestratorRequest<T>,
        key: CacheKey,
        strategy: CacheStrategy,
        ttl: u32,
    ) -> OrchestratorResult<T> {
        let fetch_result = request.fetch_fn.call().await;
        let outcome = Arc::new(match &fetch_result {
            Ok(data) => Ok((data.clone(), ttl as u64)),
            Err(err) => Err(err.to_string()),
        });
        match fetch_result {
            Ok(data) => {
                self.cache.set(key.as_str(), &data, ttl).await;
                self.flight.resolve(&key, outcome);
                self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
                self.emit_counter(events::CACHE_GET_SUCCESS, &key);
                OrchestratorResult::miss(data, key, strategy, Some(ttl as u64))
            }
            Err(err) => {
                self.flight.resolve(&key, outcome);
                self.counters.fetch_errors.fetch_add(1, Ordering::Relaxed);
                self.emit_counter(events::CACHE_GET_FAILED, &key);
                OrchestratorResult::error(key, strategy, err.to_string())
            }
        }
    }

    /// Schedules a proactive refresh reusing the current call's `fetch_fn`.
    /// Deduplicated and interval-gated by [`RefreshTracker`]; per-key state
    /// only (no symbol-level lock), preserving the spec's explicit locking
    /// granularity.
    fn schedule_refresh(&self, key: CacheKey, strategy: CacheStrategy, ttl: u32, fetch_fn: Box<dyn smart_cache_core::FetchFn<T>>) {
        let now_ms = now_ms();
        if self.refresh.should_skip(&key, now_ms, self.refresh_policy.min_update_interval_ms) {
            return;
        }
        self.emit_counter(events::BACKGROUND_UPDATE_SCHEDULED, &key);
        self.counters.background_refreshes_scheduled.fetch_add(1, Ordering::Relaxed);

        let cache = self.cache.clone();
        let event_bus = self.events.clone();
        let counters = self.counters.clone();
        let refresh_key = key.clone();
        let handle = tokio::spawn(async move {
            match fetch_fn.call().await {
                Ok(data) => {
                    cache.set(refresh_key.as_str(), &data, ttl).await;
                    counters.background_refreshes_completed.fetch_add(1, Ordering::Relaxed);
                    event_bus.emit(CacheEvent::counter("orchestrator", events::BACKGROUND_UPDATE_COMPLETED).with_tag("cache_key", refresh_key.as_str()));
                }
                Err(err) => {
                    warn!(key = %refresh_key, error = %err, strategy = %strategy, "background refresh failed");
                    counters.background_refreshes_failed.fetch_add(1, Ordering::Relaxed);
                    event_bus.emit(CacheEvent::counter("orchestrator", events::BACKGROUND_UPDATE_FAILED).with_tag("cache_key", refresh_key.as_str()));
                }
            }
        });
        self.refresh.track(key, now_ms, handle);
    }

    fn emit_counter(&self, name: &'static str, key: &CacheKey) {
        self.events.emit(CacheEvent::counter("orchestrator", name).with_tag("cache_key", key.as_str()));
    }

    /// `GET key` through the underlying [`CommonCache`].
    pub async fn get<V: DeserializeOwned>(&self, key: &str) -> Option<smart_cache_common::GetResult<V>> {
        self.cache.get(key).await
    }

    /// `SET key value ttl` through the underlying [`CommonCache`].
    pub async fn set<V: Serialize>(&self, key: &str, value: &V, ttl_seconds: u32) -> bool {
        self.cache.set(key, value, ttl_seconds).await
    }

    /// `DEL key`.
    pub async fn delete(&self, key: &str) -> bool {
        self.cache.delete(key).await
    }

    /// `EXISTS key`.
    pub async fn exists(&self, key: &str) -> bool {
        self.facade.exists(key).await.unwrap_or(false)
    }

    /// `TTL key`, `None` on any facade error.
    pub async fn ttl(&self, key: &str) -> Option<i64> {
        self.facade.ttl(key).await.ok()
    }

    /// Re-stamps `key`'s expiry to `ttl_seconds`. The facade exposes no raw
    /// `EXPIRE` verb, so this is emulated with the commands it does have:
    /// read the current value and `SETEX` it back. A no-op (returns
    /// `false`) if `key` is absent.
    pub async fn expire(&self, key: &str, ttl_seconds: u32) -> bool {
        match self.facade.get(key).await {
            Ok(Some(value)) => self.facade.set_ex(key, ttl_seconds as u64, &value).await.is_ok(),
            _ => false,
        }
    }

    /// `PING`s the Redis backend.
    pub async fn ping(&self) -> bool {
        self.facade.ping().await.is_ok()
    }

    /// Snapshot of request/refresh counters.
    pub fn get_stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
            fetch_errors: self.counters.fetch_errors.load(Ordering::Relaxed),
            background_refreshes_scheduled: self.counters.background_refreshes_scheduled.load(Ordering::Relaxed),
            background_refreshes_completed: self.counters.background_refreshes_completed.load(Ordering::Relaxed),
            background_refreshes_failed: self.counters.background_refreshes_failed.load(Ordering::Relaxed),
        }
    }

    /// Resets every counter in [`Self::get_stats`] to zero.
    pub fn reset_stats(&self) {
        self.counters.cache_hits.store(0, Ordering::Relaxed);
        self.counters.cache_misses.store(0, Ordering::Relaxed);
        self.counters.fetch_errors.store(0, Ordering::Relaxed);
        self.counters.background_refreshes_scheduled.store(0, Ordering::Relaxed);
        self.counters.background_refreshes_completed.store(0, Ordering::Relaxed);
        self.counters.background_refreshes_failed.store(0, Ordering::Relaxed);
    }

    /// Connectivity plus single-flight/refresh queue depth.
    pub async fn get_health(&self) -> OrchestratorHealth {
        OrchestratorHealth {
            redis_connected: self.ping().await,
            in_flight_keys: self.flight.len(),
            active_refreshes: self.refresh.active_count(),
        }
    }
}

fn outcome_to_result<T: Clone>(outcome: &crate::flight::SharedOutcome<T>, key: CacheKey, strategy: CacheStrategy) -> OrchestratorResult<T> {
    match outcome.as_ref() {
        Ok((data, ttl)) => OrchestratorResult::miss(data.clone(), key, strategy, Some(*ttl)),
        Err(message) => OrchestratorResult::error(key, strategy, message.clone()),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_cache_core::{MarketStatus, StaticMarketStatusProvider};
    use std::sync::atomic::AtomicU32;

    fn orchestrator_with(market_status: MarketStatus) -> Orchestrator<String> {
        let facade = RedisClientFacade::new("redis://127.0.0.1:1/", 31_536_000).unwrap();
        let market = Arc::new(StaticMarketStatusProvider::new(market_status));
        Orchestrator::new(facade, Config::default(), market)
    }

    fn trading_status() -> MarketStatus {
        MarketStatus { is_open: true, timezone: "America/New_York", status: MarketState::Trading, next_state_change: None }
    }

    #[tokio::test]
    async fn no_cache_strategy_always_fetches_and_never_touches_redis() {
        let orchestrator = orchestrator_with(trading_status());
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let request = OrchestratorRequest::new(CacheKey::from("smart-cache:AAPL"), CacheStrategy::NoCache, vec!["AAPL".into()], move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok::<_, CacheError>("fetched".to_string())
            }
        });
        let result = orchestrator.orchestrate(request).await;
        assert_eq!(result.data.as_deref(), Some("fetched"));
        assert!(!result.hit);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn market_aware_holiday_uses_weekend_ttl() {
        let holiday = MarketStatus { is_open: false, timezone: "America/New_York", status: MarketState::Holiday, next_state_change: None };
        let orchestrator = orchestrator_with(holiday);
        let request: OrchestratorRequest<String> = OrchestratorRequest::new(
            CacheKey::from("smart-cache:AAPL"),
            CacheStrategy::MarketAware,
            vec!["AAPL".into()],
            || async { Ok("x".to_string()) },
        );
        let ttl = orchestrator.resolve_ttl(CacheStrategy::MarketAware, &request).await;
        assert_eq!(ttl, orchestrator.config.ttl.weekend_ttl_seconds);
    }

    #[tokio::test]
    async fn market_aware_closed_but_not_holiday_uses_off_hours_ttl() {
        let closed = MarketStatus { is_open: false, timezone: "America/New_York", status: MarketState::Closed, next_state_change: None };
        let orchestrator = orchestrator_with(closed);
        let request: OrchestratorRequest<String> = OrchestratorRequest::new(
            CacheKey::from("smart-cache:AAPL"),
            CacheStrategy::MarketAware,
            vec!["AAPL".into()],
            || async { Ok("x".to_string()) },
        );
        let ttl = orchestrator.resolve_ttl(CacheStrategy::MarketAware, &request).await;
        assert_eq!(ttl, orchestrator.config.ttl.off_hours_ttl_seconds);
    }

    #[tokio::test]
    async fn fetch_error_surfaces_without_panicking_and_clears_the_flight() {
        let orchestrator = orchestrator_with(trading_status());
        let request: OrchestratorRequest<String> = OrchestratorRequest::new(
            CacheKey::from("smart-cache:ERR"),
            CacheStrategy::StrongTimeliness,
            vec!["ERR".into()],
            || async { Err(CacheError::Upstream("boom".into())) },
        );
        let result = orchestrator.orchestrate(request).await;
        assert_eq!(result.error.as_deref(), Some("upstream fetch failed: boom"));
        assert!(orchestrator.flight.is_empty());
    }
}
