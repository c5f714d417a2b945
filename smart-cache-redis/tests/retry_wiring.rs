//! Proves `RedisClientFacade::get` actually retries through `with_retry`
//! (§7) rather than calling the connection once and giving up.
//!
//! There's no injectable failure point inside a real `redis::Client`, so
//! this points the facade at a closed port (connection refused, a transient
//! failure category) and measures wall-clock: a facade that never retries
//! fails in well under one backoff delay, one wired to retry N times blocks
//! for at least N delays before giving up.

use std::time::Instant;

use smart_cache_core::config::RetrySettings;
use smart_cache_redis::RedisClientFacade;

fn unreachable_facade(retry: RetrySettings) -> RedisClientFacade {
    RedisClientFacade::new("redis://127.0.0.1:1/", 31_536_000)
        .unwrap()
        .with_retry_settings(retry)
}

#[tokio::test]
async fn get_retries_the_configured_number_of_times_before_giving_up() {
    let no_retry = RetrySettings {
        max_retry_attempts: 0,
        base_retry_delay_ms: 30,
        retry_delay_multiplier: 1.0,
        max_retry_delay_ms: 30,
        exponential_backoff_enabled: false,
    };
    let with_retry = RetrySettings { max_retry_attempts: 3, ..no_retry };

    let start = Instant::now();
    assert!(unreachable_facade(no_retry).get("smart-cache:AAPL").await.is_err());
    let no_retry_elapsed = start.elapsed();

    let start = Instant::now();
    assert!(unreachable_facade(with_retry).get("smart-cache:AAPL").await.is_err());
    let with_retry_elapsed = start.elapsed();

    // 3 retries at a fixed 30ms delay sleep strictly between attempts: at
    // least 90ms must elapse, while the zero-retry call has no sleep at all.
    assert!(
        with_retry_elapsed >= no_retry_elapsed + std::time::Duration::from_millis(80),
        "expected retries to add backoff delay: no_retry={no_retry_elapsed:?} with_retry={with_retry_elapsed:?}"
    );
}
