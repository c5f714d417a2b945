#![warn(missing_docs)]
//! Smart Cache Orchestrator (J): strategy dispatch, single-flight
//! de-duplication, and background refresh scheduling over
//! [`smart_cache_common::CommonCache`].
//!
//! Grounded on `hitbox`'s concurrency and offload machinery, simplified
//! where the spec's invariants let it: single-flight (I4) asks for
//! at-most-one in-flight fetch per key, not `hitbox::concurrency`'s
//! N-permit admission, so [`flight::SingleFlight`] drops the semaphore
//! entirely.

/// Per-key single-flight de-duplication (I4).
pub mod flight;

/// Background refresh eligibility and task tracking.
pub mod refresh;

/// [`Orchestrator`] itself: strategy dispatch, execution, batch orchestration.
pub mod orchestrator;

pub use flight::{FlightDecision, SharedOutcome, SingleFlight};
pub use orchestrator::{Orchestrator, OrchestratorHealth, OrchestratorStats};
pub use refresh::{RefreshPolicy, RefreshTracker};
