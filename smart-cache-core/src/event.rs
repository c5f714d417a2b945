//! Event Bus contract (K).
//!
//! The orchestrator and common cache emit fire-and-forget metric events
//! (`cache_get_success`, `background_update_scheduled`, ...) per spec.md
//! §4.9 and §6. Emission is non-blocking: [`EventBus::emit`] is a
//! synchronous, infallible method so callers on the hot path never await
//! it; implementations that need to do I/O (ship to a metrics backend)
//! are expected to buffer or spawn internally, the way
//! `hitbox::offload::OffloadManager` spawns background work rather than
//! blocking the caller.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// A single emitted metric event (§6 event record shape).
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Component that emitted the event, e.g. `"orchestrator"`, `"stream-cache"`.
    pub source: &'static str,
    /// Kind of metric: `"counter"`, `"gauge"`, `"histogram"`.
    pub metric_type: &'static str,
    /// Event name, e.g. `"cache_get_success"`, `"background_update_scheduled"`.
    pub metric_name: &'static str,
    /// Numeric value associated with the event (counts as 1.0 for pure markers).
    pub metric_value: f64,
    /// Free-form tags, e.g. `{"layer": "hot"}` or `{"cache_key": "..."}`.
    pub tags: HashMap<String, String>,
}

impl CacheEvent {
    /// Builds a counter-style event with value `1.0`.
    pub fn counter(source: &'static str, metric_name: &'static str) -> Self {
        Self {
            timestamp: Utc::now(),
            source,
            metric_type: "counter",
            metric_name,
            metric_value: 1.0,
            tags: HashMap::new(),
        }
    }

    /// Attaches a tag, builder-style.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Well-known event names, named by what they mark rather than enumerated
/// as a closed set — callers may emit other names too.
pub mod events {
    /// Symbol transformation succeeded.
    pub const SYMBOL_TRANSFORMATION_COMPLETED: &str = "symbol_transformation_completed";
    /// Symbol transformation failed.
    pub const SYMBOL_TRANSFORMATION_FAILED: &str = "symbol_transformation_failed";
    /// A cache read resolved (hit or fetch).
    pub const CACHE_GET_SUCCESS: &str = "cache_get_success";
    /// A cache read failed.
    pub const CACHE_GET_FAILED: &str = "cache_get_failed";
    /// A background refresh was enqueued.
    pub const BACKGROUND_UPDATE_SCHEDULED: &str = "background_update_scheduled";
    /// A background refresh finished successfully.
    pub const BACKGROUND_UPDATE_COMPLETED: &str = "background_update_completed";
    /// A background refresh failed.
    pub const BACKGROUND_UPDATE_FAILED: &str = "background_update_failed";
    /// The decompression governor changed its concurrency limit.
    pub const CONCURRENCY_ADJUSTED: &str = "concurrency_adjusted";
    /// The governor reacted to memory pressure.
    pub const MEMORY_PRESSURE_HANDLED: &str = "memory_pressure_handled";
    /// A bounded queue dropped work due to capacity.
    pub const CAPACITY_WARNING: &str = "capacity_warning";
    /// A read fell back to raw bytes after a decompression failure.
    pub const DECOMPRESSION_FAILED: &str = "decompression_failed";
}

/// Consumed interface for fire-and-forget metric emission (§4.9, METRIC_COLLECTED).
pub trait EventBus: Send + Sync {
    /// Emits one event. Must not block the caller.
    fn emit(&self, event: CacheEvent);
}

/// No-op [`EventBus`] — the default when no metrics collector is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _event: CacheEvent) {}
}

/// Test/diagnostic [`EventBus`] that retains every emitted event.
#[derive(Debug, Default)]
pub struct RecordingEventBus {
    events: Mutex<Vec<CacheEvent>>,
}

impl RecordingEventBus {
    /// Builds an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().expect("event log poisoned").clone()
    }

    /// Counts events matching `metric_name`.
    pub fn count(&self, metric_name: &str) -> usize {
        self.events
            .lock()
            .expect("event log poisoned")
            .iter()
            .filter(|e| e.metric_name == metric_name)
            .count()
    }
}

impl EventBus for RecordingEventBus {
    fn emit(&self, event: CacheEvent) {
        self.events.lock().expect("event log poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_event_bus_counts_by_name() {
        let bus = RecordingEventBus::new();
        bus.emit(CacheEvent::counter("orchestrator", events::CACHE_GET_SUCCESS));
        bus.emit(CacheEvent::counter("orchestrator", events::CACHE_GET_SUCCESS));
        bus.emit(CacheEvent::counter("orchestrator", events::CACHE_GET_FAILED));
        assert_eq!(bus.count(events::CACHE_GET_SUCCESS), 2);
        assert_eq!(bus.count(events::CACHE_GET_FAILED), 1);
    }
}
