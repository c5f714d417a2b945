//! Error taxonomy for cache operations.
//!
//! [`CacheError`] is the umbrella error type returned from operations that
//! are allowed to fail loudly (batch-size overflow, configuration
//! validation, orchestration's `fetchFn` errors). Per the read-path policy
//! in spec.md §7, most read operations never surface this type to callers —
//! they return `None` and emit a metric instead.

use thiserror::Error;

/// Errors surfaced by cache operations that are not read-path "swallow and
/// log" operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested key does not exist.
    #[error("key not found")]
    KeyNotFound,

    /// A cache key failed validation (I7): empty, too long, or malformed.
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// A value exceeded `limits.maxValueSizeBytes`.
    #[error("value too large: {size} bytes exceeds limit of {limit} bytes")]
    ValueTooLarge {
        /// Size of the rejected value, in bytes.
        size: usize,
        /// Configured limit, in bytes.
        limit: usize,
    },

    /// A batch operation exceeded `limits.maxBatchSize`.
    #[error("batch size {size} exceeds limit of {limit}")]
    BatchTooLarge {
        /// Number of entries in the rejected batch.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// A generic operation failure not covered by a more specific variant.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// The requested operation is not supported by this backend/strategy.
    #[error("operation not supported: {0}")]
    OperationNotSupported(&'static str),

    /// A caller-supplied parameter was invalid.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The process exceeded its configured memory budget.
    #[error("memory exceeded: {0}")]
    MemoryExceeded(String),

    /// A quota (e.g. decompression queue capacity) was exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The backend is temporarily unavailable (connection/timeout/protocol).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An upstream `fetchFn` failed. Orchestration propagates this unchanged
    /// to the caller (spec.md §7: "Orchestration surfaces fetchFn errors
    /// unchanged to the caller").
    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    /// Startup configuration failed validation. Fatal per spec.md §7.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns a stable machine-readable tag for metrics/event emission.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::KeyNotFound => "key_not_found",
            Self::InvalidKeyFormat(_) => "invalid_key_format",
            Self::ValueTooLarge { .. } => "value_too_large",
            Self::BatchTooLarge { .. } => "batch_too_large",
            Self::OperationFailed(_) => "operation_failed",
            Self::OperationNotSupported(_) => "operation_not_supported",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::MemoryExceeded(_) => "memory_exceeded",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Upstream(_) => "upstream_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}
