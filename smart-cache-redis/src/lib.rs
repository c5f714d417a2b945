#![warn(missing_docs)]
//! Redis client facade (component A).
//!
//! A thin, typed layer over the `redis` crate: connection lifecycle,
//! PTTL-to-seconds mapping, and a retry helper for idempotent reads. Higher
//! layers (`smart-cache-common`, `smart-cache-stream`) depend on this crate
//! rather than on `redis` directly.

/// Typed errors for facade operations.
pub mod error;

/// Pure PTTL-to-seconds mapping.
pub mod pttl;

/// Retry-with-backoff helper for idempotent operations.
pub mod retry;

/// The facade itself.
pub mod facade;

pub use error::RedisFacadeError;
pub use facade::{PipelineOp, PipelineReply, RedisClientFacade};
pub use pttl::pttl_to_seconds;
pub use retry::with_retry;
