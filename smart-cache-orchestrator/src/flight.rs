//! Single-flight de-duplication (I4).
//!
//! Adapted from `hitbox::concurrency::BroadcastConcurrencyManager`, which
//! gates admission with a resizable `Semaphore` to allow up to N concurrent
//! fetches per key. Spec.md I4 asks for exactly one in-flight `fetchFn` per
//! key, not N, so the semaphore is dropped entirely: `DashMap::entry()`'s
//! `Vacant` branch already *is* the at-most-one admission check.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use smart_cache_core::CacheKey;
use tokio::sync::broadcast;

/// What every caller waiting on a key eventually receives: the fetched
/// value plus the TTL it was (or would have been) stored with, or the
/// upstream error message.
pub type SharedOutcome<T> = Arc<Result<(T, u64), String>>;

const CHANNEL_CAPACITY: usize = 1;

/// Either you are the sole caller responsible for running `fetchFn`, or
/// someone else already is and you get a receiver for their result.
pub enum FlightDecision<T> {
    /// No other caller is fetching this key; resolve it and call [`SingleFlight::resolve`].
    Leader,
    /// Another caller is already fetching; await its result.
    Follower(broadcast::Receiver<SharedOutcome<T>>),
}

/// Tracks in-flight fetches per [`CacheKey`], deduplicating concurrent
/// orchestration of the same key down to a single upstream call.
pub struct SingleFlight<T> {
    inflight: DashMap<CacheKey, broadcast::Sender<SharedOutcome<T>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self { inflight: DashMap::new() }
    }
}

impl<T> SingleFlight<T> {
    /// Builds an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the flight for `key`. Exactly one caller per key observes
    /// [`FlightDecision::Leader`] until that leader calls [`Self::resolve`].
    pub fn enter(&self, key: &CacheKey) -> FlightDecision<T> {
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(occupied) => FlightDecision::Follower(occupied.get().subscribe()),
            Entry::Vacant(vacant) => {
                let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
                vacant.insert(tx);
                FlightDecision::Leader
            }
        }
    }

    /// Removes `key` from the in-flight set and broadcasts `outcome` to
    /// every follower waiting on it. Called unconditionally by the leader,
    /// mirroring the execution pseudocode's `finally` cleanup.
    pub fn resolve(&self, key: &CacheKey, outcome: SharedOutcome<T>) {
        if let Some((_, tx)) = self.inflight.remove(key) {
            let _ = tx.send(outcome);
        }
    }

    /// Number of keys currently being fetched.
    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    /// True iff no key is currently being fetched.
    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_caller_is_leader_second_is_follower() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let key = CacheKey::from("smart-cache:AAPL");
        assert!(matches!(flight.enter(&key), FlightDecision::Leader));
        assert!(matches!(flight.enter(&key), FlightDecision::Follower(_)));
        assert_eq!(flight.len(), 1);
    }

    #[test]
    fn resolve_clears_the_key_and_admits_a_new_leader() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let key = CacheKey::from("smart-cache:AAPL");
        let _ = flight.enter(&key);
        flight.resolve(&key, Arc::new(Ok((42, 5))));
        assert!(flight.is_empty());
        assert!(matches!(flight.enter(&key), FlightDecision::Leader));
    }

    #[tokio::test]
    async fn follower_observes_the_leaders_broadcast_result() {
        let flight: SingleFlight<u32> = SingleFlight::new();
        let key = CacheKey::from("smart-cache:AAPL");
        assert!(matches!(flight.enter(&key), FlightDecision::Leader));
        let FlightDecision::Follower(mut rx) = flight.enter(&key) else {
            panic!("expected a follower decision");
        };
        flight.resolve(&key, Arc::new(Ok((7, 30))));
        let outcome = rx.recv().await.unwrap();
        assert_eq!(*outcome, Ok((7, 30)));
    }
}
