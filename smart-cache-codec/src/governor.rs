//! Decompression Governor (D): bounded-concurrency gunzip scheduling with an
//! adaptive concurrency controller (§4.4).
//!
//! Grounded on two teacher patterns: `hitbox::offload::OffloadManager` for
//! the spawn-and-track-by-key shape, and `hitbox::concurrency`'s
//! semaphore-gated admission for bounding parallel work. Priority queueing
//! (high > normal > low, FIFO within a tier) is implemented with one
//! unbounded `mpsc` channel per tier drained by a single dispatcher task, a
//! standard worker-pool idiom rather than a custom priority heap.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tracing::{debug, warn};

use crate::error::{CodecError, GovernorError};

/// Priority tier for a queued decompression task (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Lowest scheduling priority.
    Low,
    /// Default priority.
    Normal,
    /// Highest scheduling priority.
    High,
}

/// Concurrency mode, each mapping to an initial-concurrency multiplier (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorMode {
    /// `0.5x` the configured base concurrency.
    Conservative,
    /// `1.0x` the configured base concurrency.
    Balanced,
    /// `1.5x` the configured base concurrency.
    Aggressive,
    /// Starts at `1.0x` and lets the adaptive controller take over immediately.
    Adaptive,
}

impl GovernorMode {
    /// Initial-concurrency multiplier for this mode.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Conservative => 0.5,
            Self::Balanced => 1.0,
            Self::Aggressive => 1.5,
            Self::Adaptive => 1.0,
        }
    }
}

/// Static configuration for a [`DecompressionGovernor`].
#[derive(Debug, Clone, Copy)]
pub struct GovernorConfig {
    /// Base concurrency before `mode`'s multiplier is applied.
    pub base_concurrency: usize,
    /// Maximum number of tasks allowed to wait for a free concurrency slot.
    /// Admission is bounded by `concurrency + max_queue_size` in total: the
    /// first `concurrency` jobs run immediately, the rest queue.
    pub max_queue_size: usize,
    /// Scheduling mode.
    pub mode: GovernorMode,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            base_concurrency: 10,
            max_queue_size: 500,
            mode: GovernorMode::Balanced,
        }
    }
}

/// Live resource pressure inputs for the adaptive controller (§4.4).
///
/// Consumed interface — this crate has no system-metrics dependency of its
/// own, the same way `smart-cache-core`'s market/event/symbol contracts are
/// consumed rather than implemented.
pub trait ResourceSampler: Send + Sync {
    /// Returns `(memory_ratio, cpu_ratio)`, each in `[0.0, 1.0]`.
    fn sample(&self) -> (f64, f64);
}

/// Always reports no pressure; the default when no profiler is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResourceSampler;

impl ResourceSampler for NullResourceSampler {
    fn sample(&self) -> (f64, f64) {
        (0.0, 0.0)
    }
}

type DecompressOp = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<String, CodecError>> + Send>> + Send + Sync>;

struct Job {
    attempt: u32,
    op: DecompressOp,
    reply: oneshot::Sender<Result<String, GovernorError>>,
}

#[derive(Debug, Clone, Copy)]
struct OpRecord {
    success: bool,
    duration: Duration,
}

const WINDOW_SIZE: usize = 50;
const TICK_INTERVAL: Duration = Duration::from_secs(2);
const COOLDOWN: Duration = Duration::from_secs(5);

struct Shared {
    high: mpsc::UnboundedSender<Job>,
    normal: mpsc::UnboundedSender<Job>,
    low: mpsc::UnboundedSender<Job>,
    queue_len: AtomicUsize,
    max_queue_size: usize,
    semaphore: Arc<Semaphore>,
    concurrency: AtomicUsize,
    ceiling: usize,
    window: Mutex<VecDeque<OpRecord>>,
    last_adjustment: Mutex<Instant>,
}

/// Bounds concurrent gunzip work and adapts the bound to observed conditions.
///
/// Clone is cheap; every clone shares the same dispatcher and semaphore.
#[derive(Clone)]
pub struct DecompressionGovernor {
    shared: Arc<Shared>,
}

impl DecompressionGovernor {
    /// Builds a governor and spawns its dispatcher and adaptive-control
    /// tasks. Must be called from within a running Tokio runtime.
    pub fn new(config: GovernorConfig, sampler: Arc<dyn ResourceSampler>) -> Self {
        let initial = ((config.base_concurrency as f64) * config.mode.multiplier()).round().max(1.0) as usize;
        let ceiling = (config.base_concurrency * 2).max(50);

        let (high_tx, high_rx) = mpsc::unbounded_channel();
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (low_tx, low_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            high: high_tx,
            normal: normal_tx,
            low: low_tx,
            queue_len: AtomicUsize::new(0),
            max_queue_size: config.max_queue_size,
            semaphore: Arc::new(Semaphore::new(initial)),
            concurrency: AtomicUsize::new(initial),
            ceiling,
            window: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
            last_adjustment: Mutex::new(Instant::now() - COOLDOWN),
        });

        tokio::spawn(dispatch_loop(shared.clone(), high_rx, normal_rx, low_rx));
        tokio::spawn(adaptive_control_loop(shared.clone(), sampler));

        Self { shared }
    }

    /// Current concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.shared.concurrency.load(Ordering::SeqCst)
    }

    /// Submits a decompression operation at `priority`. Retries the
    /// operation up to twice on failure before rejecting it to the caller
    /// (§4.4, "Retry policy").
    pub async fn submit<F, Fut>(&self, priority: TaskPriority, op: F) -> Result<String, GovernorError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, CodecError>> + Send + 'static,
    {
        // queue_len counts everything admitted but not yet completed (running
        // or waiting); the running share is bounded separately by the
        // semaphore, so the admission ceiling is concurrency + max_queue_size.
        let capacity = self.shared.concurrency.load(Ordering::SeqCst) + self.shared.max_queue_size;
        let admitted = self.shared.queue_len.fetch_add(1, Ordering::SeqCst) + 1;
        if admitted > capacity {
            self.shared.queue_len.fetch_sub(1, Ordering::SeqCst);
            return Err(GovernorError::QueueFull(self.shared.max_queue_size));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            attempt: 0,
            op: Arc::new(move || Box::pin(op())),
            reply: reply_tx,
        };
        let sender = match priority {
            TaskPriority::High => &self.shared.high,
            TaskPriority::Normal => &self.shared.normal,
            TaskPriority::Low => &self.shared.low,
        };
        if sender.send(job).is_err() {
            self.shared.queue_len.fetch_sub(1, Ordering::SeqCst);
            return Err(GovernorError::Codec(CodecError::Unknown("dispatcher shut down".into())));
        }

        reply_rx
            .await
            .unwrap_or_else(|_| Err(GovernorError::Codec(CodecError::Unknown("dispatcher dropped reply".into()))))
    }
}

async fn dispatch_loop(
    shared: Arc<Shared>,
    mut high: mpsc::UnboundedReceiver<Job>,
    mut normal: mpsc::UnboundedReceiver<Job>,
    mut low: mpsc::UnboundedReceiver<Job>,
) {
    loop {
        let job = tokio::select! {
            biased;
            Some(job) = high.recv() => job,
            Some(job) = normal.recv() => job,
            Some(job) = low.recv() => job,
            else => break,
        };

        let permit = match shared.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let shared = shared.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let mut attempt = job.attempt;
            let result = loop {
                match (job.op)().await {
                    Ok(value) => break Ok(value),
                    Err(err) if attempt < 2 => {
                        attempt += 1;
                        debug!(attempt, "retrying decompression task");
                        continue;
                    }
                    Err(err) => break Err(GovernorError::from(err)),
                }
            };
            shared.queue_len.fetch_sub(1, Ordering::SeqCst);
            record(&shared, start.elapsed(), result.is_ok()).await;
            let _ = job.reply.send(result);
            drop(permit);
        });
    }
}

async fn record(shared: &Shared, duration: Duration, success: bool) {
    let mut window = shared.window.lock().await;
    if window.len() == WINDOW_SIZE {
        window.pop_front();
    }
    window.push_back(OpRecord { success, duration });
}

async fn adaptive_control_loop(shared: Arc<Shared>, sampler: Arc<dyn ResourceSampler>) {
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    loop {
        ticker.tick().await;
        adjust_once(&shared, sampler.as_ref()).await;
    }
}

async fn adjust_once(shared: &Shared, sampler: &dyn ResourceSampler) {
    let mut last_adjustment = shared.last_adjustment.lock().await;
    if last_adjustment.elapsed() < COOLDOWN {
        return;
    }

    let window = shared.window.lock().await;
    if window.len() < WINDOW_SIZE {
        return;
    }
    let success_rate = window.iter().filter(|r| r.success).count() as f64 / window.len() as f64;
    let avg_duration_ms =
        window.iter().map(|r| r.duration.as_millis() as f64).sum::<f64>() / window.len() as f64;
    drop(window);

    let (memory_ratio, cpu_ratio) = sampler.sample();
    let queue_size = shared.queue_len.load(Ordering::SeqCst);
    let current = shared.concurrency.load(Ordering::SeqCst);

    let should_raise = success_rate > 0.95
        && avg_duration_ms < 2_000.0
        && memory_ratio < 0.7
        && cpu_ratio < 0.7
        && queue_size > 5
        && current < shared.ceiling;

    let should_lower = (success_rate < 0.9 || avg_duration_ms > 4_000.0 || memory_ratio > 0.8 || cpu_ratio > 0.8)
        && current > 1;

    if should_raise {
        shared.semaphore.add_permits(1);
        shared.concurrency.fetch_add(1, Ordering::SeqCst);
        *last_adjustment = Instant::now();
        debug!(new_concurrency = current + 1, "raised decompression concurrency");
    } else if should_lower {
        shared.semaphore.forget_permits(1);
        shared.concurrency.fetch_sub(1, Ordering::SeqCst);
        *last_adjustment = Instant::now();
        warn!(new_concurrency = current - 1, "lowered decompression concurrency");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn successful_task_returns_its_value() {
        let governor = DecompressionGovernor::new(
            GovernorConfig { base_concurrency: 2, max_queue_size: 10, mode: GovernorMode::Balanced },
            Arc::new(NullResourceSampler),
        );
        let result = governor
            .submit(TaskPriority::Normal, || async { Ok("decoded".to_string()) })
            .await
            .unwrap();
        assert_eq!(result, "decoded");
    }

    #[tokio::test]
    async fn task_retries_twice_before_giving_up() {
        let governor = DecompressionGovernor::new(
            GovernorConfig { base_concurrency: 2, max_queue_size: 10, mode: GovernorMode::Balanced },
            Arc::new(NullResourceSampler),
        );
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();
        let result = governor
            .submit(TaskPriority::Normal, move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(CodecError::Unknown("always fails".into()))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn queue_full_rejects_immediately() {
        let governor = DecompressionGovernor::new(
            GovernorConfig { base_concurrency: 1, max_queue_size: 0, mode: GovernorMode::Balanced },
            Arc::new(NullResourceSampler),
        );
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();
        let gate_rx = Arc::new(Mutex::new(Some(gate_rx)));
        let blocker = {
            let governor = governor.clone();
            let gate_rx = gate_rx.clone();
            tokio::spawn(async move {
                governor
                    .submit(TaskPriority::Normal, move || {
                        let gate_rx = gate_rx.clone();
                        async move {
                            if let Some(rx) = gate_rx.lock().await.take() {
                                let _ = rx.await;
                            }
                            Ok("done".to_string())
                        }
                    })
                    .await
            })
        };
        // Give the dispatcher a chance to pick up the first job and block on the gate.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let overflow = governor.submit(TaskPriority::Normal, || async { Ok("x".to_string()) }).await;
        assert!(matches!(overflow, Err(GovernorError::QueueFull(_))));
        let _ = gate_tx.send(());
        let _ = blocker.await;
    }
}
