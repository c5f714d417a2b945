//! Error types for the Redis client facade.

use thiserror::Error;

/// Typed failure categories surfaced by [`crate::RedisClientFacade`] (§4.1).
///
/// Variants mirror `redis::RedisError`'s `ErrorKind` buckets rather than
/// exposing the underlying client error directly, so callers above this
/// crate never need a `redis` dependency of their own.
#[derive(Debug, Error)]
pub enum RedisFacadeError {
    /// The connection to Redis could not be established or was dropped.
    #[error("redis connection error: {0}")]
    Connection(String),

    /// An operation exceeded its deadline.
    #[error("redis operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Redis returned a protocol-level or type error (wrong reply type, etc).
    #[error("redis protocol error: {0}")]
    Protocol(String),

    /// Any other failure, including `redis`-reported application errors.
    #[error("redis error: {0}")]
    Other(String),
}

impl RedisFacadeError {
    /// Stable tag for metrics/event emission (§4.1: "never logs business data").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::Protocol(_) => "protocol",
            Self::Other(_) => "other",
        }
    }
}

impl From<redis::RedisError> for RedisFacadeError {
    fn from(err: redis::RedisError) -> Self {
        use redis::ErrorKind;
        match err.kind() {
            ErrorKind::IoError => Self::Connection(err.to_string()),
            ErrorKind::TypeError | ErrorKind::ParseError => Self::Protocol(err.to_string()),
            _ if err.is_timeout() => Self::Timeout(std::time::Duration::default()),
            _ => Self::Other(err.to_string()),
        }
    }
}

impl From<RedisFacadeError> for smart_cache_core::CacheError {
    fn from(err: RedisFacadeError) -> Self {
        smart_cache_core::CacheError::ServiceUnavailable(err.to_string())
    }
}
