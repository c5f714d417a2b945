//! Background refresh queue (§4.9).
//!
//! `OffloadManager`'s `DashMap<OffloadKey, OffloadHandle>` dedup-by-key
//! pattern, adapted: a `fetchFn` is ephemeral per `OrchestratorRequest` (it
//! runs at most once, per its own doc comment), so there is no persisted
//! closure table to scan periodically. Instead, eligibility is evaluated at
//! the moment [`crate::Orchestrator::orchestrate`] observes a stale hit,
//! reusing that call's own `fetchFn` as the refresh task. Dedup and the
//! minimum-interval gate still need the tracker below so that a burst of
//! concurrent stale hits on one key doesn't spawn a burst of refreshes.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use smart_cache_core::{CacheKey, CacheStrategy};
use tokio::task::JoinHandle;

/// Ratio/interval thresholds governing background-refresh eligibility.
///
/// Not part of spec.md §6's enumerated configuration surface (an Open
/// Question — recorded in DESIGN.md), so this lives as orchestrator-local
/// policy rather than a `smart_cache_core::Config` field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshPolicy {
    /// `STRONG_TIMELINESS`/`ADAPTIVE` refresh once `ttlRemaining/originalTtl` drops below this.
    pub strong_update_ratio: f64,
    /// `WEAK_TIMELINESS` refreshes once `ttlRemaining/originalTtl` drops below this.
    pub weak_update_ratio: f64,
    /// Minimum time between two refreshes of the same key.
    pub min_update_interval_ms: i64,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self { strong_update_ratio: 0.5, weak_update_ratio: 0.25, min_update_interval_ms: 30_000 }
    }
}

impl RefreshPolicy {
    /// Whether `strategy` participates in background refresh at all.
    ///
    /// `MARKET_AWARE`'s TTL already tracks live market state and `NO_CACHE`
    /// never caches, so neither is eligible; this mirrors spec.md §4.9's
    /// wording, which names only `STRONG`/`WEAK` (with `ADAPTIVE` grouped
    /// under `STRONG` per its own "background-refreshed before expiry" doc).
    pub fn applies_to(&self, strategy: CacheStrategy) -> bool {
        matches!(strategy, CacheStrategy::StrongTimeliness | CacheStrategy::WeakTimeliness | CacheStrategy::Adaptive)
    }

    /// True iff `ttl_remaining_seconds / original_ttl_seconds` has crossed
    /// the threshold for `strategy`.
    pub fn is_stale(&self, strategy: CacheStrategy, ttl_remaining_seconds: u64, original_ttl_seconds: u64) -> bool {
        if original_ttl_seconds == 0 {
            return false;
        }
        let ratio = ttl_remaining_seconds as f64 / original_ttl_seconds as f64;
        let threshold = match strategy {
            CacheStrategy::WeakTimeliness => self.weak_update_ratio,
            _ => self.strong_update_ratio,
        };
        ratio < threshold
    }
}

/// Tracks in-flight background refreshes and last-refreshed timestamps, one
/// entry per [`CacheKey`].
pub struct RefreshTracker {
    inflight: DashMap<CacheKey, JoinHandle<()>>,
    last_refreshed_ms: DashMap<CacheKey, AtomicI64>,
}

impl Default for RefreshTracker {
    fn default() -> Self {
        Self { inflight: DashMap::new(), last_refreshed_ms: DashMap::new() }
    }
}

impl RefreshTracker {
    /// Builds an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff a refresh for `key` is already running, or the minimum
    /// interval since the last refresh hasn't elapsed yet.
    pub fn should_skip(&self, key: &CacheKey, now_ms: i64, min_interval_ms: i64) -> bool {
        if let Some(handle) = self.inflight.get(key) {
            if !handle.is_finished() {
                return true;
            }
        }
        self.inflight.remove_if(key, |_, handle| handle.is_finished());
        if let Some(last) = self.last_refreshed_ms.get(key) {
            if now_ms - last.load(Ordering::Relaxed) < min_interval_ms {
                return true;
            }
        }
        false
    }

    /// Registers `handle` as the in-flight refresh for `key` and stamps the
    /// last-refreshed time. Called by the leader right after `tokio::spawn`.
    pub fn track(&self, key: CacheKey, now_ms: i64, handle: JoinHandle<()>) {
        self.last_refreshed_ms
            .entry(key.clone())
            .and_modify(|ts| ts.store(now_ms, Ordering::Relaxed))
            .or_insert_with(|| AtomicI64::new(now_ms));
        match self.inflight.entry(key) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(handle);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
            }
        }
    }

    /// Number of refreshes currently running.
    pub fn active_count(&self) -> usize {
        self.inflight.iter().filter(|entry| !entry.value().is_finished()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_timeliness_is_stale_below_half_remaining() {
        let policy = RefreshPolicy::default();
        assert!(policy.is_stale(CacheStrategy::StrongTimeliness, 2, 5));
        assert!(!policy.is_stale(CacheStrategy::StrongTimeliness, 4, 5));
    }

    #[test]
    fn weak_timeliness_uses_the_lower_threshold() {
        let policy = RefreshPolicy::default();
        // ratio 0.3: stale for STRONG_TIMELINESS's 0.5 threshold, fresh for WEAK's 0.25.
        assert!(!policy.is_stale(CacheStrategy::WeakTimeliness, 3, 10));
        assert!(policy.is_stale(CacheStrategy::WeakTimeliness, 2, 10));
    }

    #[test]
    fn market_aware_and_no_cache_never_apply() {
        let policy = RefreshPolicy::default();
        assert!(!policy.applies_to(CacheStrategy::MarketAware));
        assert!(!policy.applies_to(CacheStrategy::NoCache));
        assert!(policy.applies_to(CacheStrategy::Adaptive));
    }

    #[tokio::test]
    async fn second_refresh_within_the_interval_is_skipped() {
        let tracker = RefreshTracker::new();
        let key = CacheKey::from("smart-cache:AAPL");
        assert!(!tracker.should_skip(&key, 0, 30_000));
        tracker.track(key.clone(), 0, tokio::spawn(async {}));
        // Let the (no-op) spawned refresh finish so only the interval gate is under test.
        tokio::task::yield_now().await;
        assert!(tracker.should_skip(&key, 1_000, 30_000));
        assert!(!tracker.should_skip(&key, 40_000, 30_000));
    }
}
