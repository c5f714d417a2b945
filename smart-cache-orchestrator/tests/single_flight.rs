//! Scenario 3 (spec §8): 1000 concurrent callers on one key invoke the
//! fetch closure exactly once; the first resolver sees `hit: false`, every
//! later caller sees `hit: true`.
//!
//! Exercises [`smart_cache_orchestrator::SingleFlight`] directly rather than
//! the full `Orchestrator`, since `Orchestrator::orchestrate` reaches a real
//! Redis connection for its cache read/write and this workspace has no
//! in-memory backend to substitute for it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smart_cache_core::CacheKey;
use smart_cache_orchestrator::{FlightDecision, SingleFlight};

const CALLERS: usize = 1000;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn fetch_fn_runs_once_across_a_thousand_concurrent_callers() {
    let flight: Arc<SingleFlight<u32>> = Arc::new(SingleFlight::new());
    let key = CacheKey::from("smart-cache:AAPL");
    let fetch_calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let flight = flight.clone();
        let key = key.clone();
        let fetch_calls = fetch_calls.clone();
        handles.push(tokio::spawn(async move {
            match flight.enter(&key) {
                FlightDecision::Leader => {
                    fetch_calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    let outcome = Arc::new(Ok((42u32, 5u64)));
                    flight.resolve(&key, outcome);
                    (false, 42u32)
                }
                FlightDecision::Follower(mut rx) => {
                    let outcome = rx.recv().await.expect("leader always resolves the flight");
                    match outcome.as_ref() {
                        Ok((data, _ttl)) => (true, *data),
                        Err(message) => panic!("unexpected fetch error: {message}"),
                    }
                }
            }
        }));
    }

    let mut hits = 0;
    for handle in handles {
        let (hit, data) = handle.await.expect("caller task panicked");
        assert_eq!(data, 42);
        if hit {
            hits += 1;
        }
    }

    assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(hits, CALLERS - 1);
    assert!(flight.is_empty());
}
