//! Retry-with-backoff helper for idempotent Redis operations (§7).

use std::time::Duration;

use smart_cache_core::config::RetrySettings;
use tracing::debug;

use crate::error::RedisFacadeError;

/// Retries `op` up to `settings.max_retry_attempts` times with exponential
/// (or fixed, per `settings.exponential_backoff_enabled`) backoff.
///
/// Only meant for idempotent operations (`Get`, `Exists`, `Ttl`, `Pttl`,
/// `Ping`, ...) — callers are responsible for not wrapping non-idempotent
/// writes that could double-apply on a false-negative timeout.
pub async fn with_retry<T, F, Fut>(settings: &RetrySettings, mut op: F) -> Result<T, RedisFacadeError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RedisFacadeError>>,
{
    let mut attempt = 0u32;
    let mut delay = Duration::from_millis(settings.base_retry_delay_ms);
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < settings.max_retry_attempts => {
                attempt += 1;
                debug!(attempt, error = %err, "retrying redis operation");
                tokio::time::sleep(delay).await;
                delay = if settings.exponential_backoff_enabled {
                    Duration::from_millis(
                        ((delay.as_millis() as f64 * settings.retry_delay_multiplier) as u64)
                            .min(settings.max_retry_delay_ms),
                    )
                } else {
                    delay
                };
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let settings = RetrySettings {
            max_retry_attempts: 3,
            base_retry_delay_ms: 1,
            retry_delay_multiplier: 1.0,
            max_retry_delay_ms: 10,
            exponential_backoff_enabled: false,
        };
        let attempts = AtomicU32::new(0);
        let result = with_retry(&settings, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(RedisFacadeError::Other("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_attempts() {
        let settings = RetrySettings {
            max_retry_attempts: 1,
            base_retry_delay_ms: 1,
            retry_delay_multiplier: 1.0,
            max_retry_delay_ms: 10,
            exponential_backoff_enabled: false,
        };
        let result: Result<(), _> =
            with_retry(&settings, || async { Err(RedisFacadeError::Other("down".into())) }).await;
        assert!(result.is_err());
    }
}
