//! Scenario 4 (spec §8): with `maxConcurrent=10, maxQueueSize=50`, 60
//! concurrent submissions are all admitted (10 running + 50 queued); the
//! 61st is rejected immediately with `queue full`; releasing the gate lets
//! all 60 complete.

use std::sync::Arc;

use smart_cache_codec::error::GovernorError;
use smart_cache_codec::governor::{DecompressionGovernor, GovernorConfig, GovernorMode, NullResourceSampler, TaskPriority};
use tokio::sync::Notify;

const RUNNING: usize = 10;
const QUEUED: usize = 50;
const ADMITTED: usize = RUNNING + QUEUED;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn sixty_tasks_admitted_the_sixty_first_rejected() {
    let governor = DecompressionGovernor::new(
        GovernorConfig { base_concurrency: RUNNING, max_queue_size: QUEUED, mode: GovernorMode::Balanced },
        Arc::new(NullResourceSampler),
    );
    let gate = Arc::new(Notify::new());

    let mut handles = Vec::with_capacity(ADMITTED);
    for _ in 0..ADMITTED {
        let governor = governor.clone();
        let gate = gate.clone();
        handles.push(tokio::spawn(async move {
            governor
                .submit(TaskPriority::Normal, move || {
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        Ok("done".to_string())
                    }
                })
                .await
        }));
    }

    // Give every spawned submission a chance to run its (synchronous,
    // non-blocking) admission check before the overflow attempt below.
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }

    let overflow = governor.submit(TaskPriority::Normal, || async { Ok("overflow".to_string()) }).await;
    assert!(matches!(overflow, Err(GovernorError::QueueFull(QUEUED))));

    gate.notify_waiters();
    for handle in handles {
        let result = handle.await.expect("task panicked");
        assert_eq!(result.unwrap(), "done");
    }
}
