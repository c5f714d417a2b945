//! Typed Redis client facade (A).
//!
//! Wraps a [`redis::aio::ConnectionManager`] the way `hitbox_redis::RedisBackend`
//! wraps one: lazily, via [`tokio::sync::OnceCell`], so building a facade
//! never blocks and never fails on an unreachable server — only the first
//! operation does.

use redis::AsyncCommands;
use smart_cache_core::config::RetrySettings;
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::RedisFacadeError;
use crate::pttl::pttl_to_seconds;
use crate::retry::with_retry;

/// One step of a [`RedisClientFacade::pipeline`] call.
#[derive(Debug, Clone)]
pub enum PipelineOp {
    /// `GET key`.
    Get(String),
    /// `SETEX key ttl_seconds value`.
    SetEx(String, u64, String),
    /// `DEL key`.
    Del(String),
    /// `PTTL key`.
    Pttl(String),
}

/// Reply to one [`PipelineOp`].
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineReply {
    /// A bulk string reply, or `None` for a cache miss.
    Bulk(Option<String>),
    /// An integer reply (`DEL` count, `PTTL` milliseconds, ...).
    Int(i64),
}

/// Typed wrapper over a Redis-protocol client (§4.1).
///
/// Never logs business data — only operation names, keys' lengths, and
/// timing are eligible for `trace!`/`debug!` output.
#[derive(Clone)]
pub struct RedisClientFacade {
    client: redis::Client,
    connection: std::sync::Arc<OnceCell<redis::aio::ConnectionManager>>,
    no_expire_default_seconds: u64,
    retry: RetrySettings,
}

impl RedisClientFacade {
    /// Builds a facade for `connection_info` (e.g. `redis://127.0.0.1/`).
    ///
    /// The connection itself is established lazily on first operation.
    /// Idempotent reads retry per [`RetrySettings::default`] until
    /// [`Self::with_retry_settings`] overrides it.
    pub fn new(connection_info: impl AsRef<str>, no_expire_default_seconds: u64) -> Result<Self, RedisFacadeError> {
        let client = redis::Client::open(connection_info.as_ref())
            .map_err(|e| RedisFacadeError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            connection: std::sync::Arc::new(OnceCell::new()),
            no_expire_default_seconds,
            retry: RetrySettings::default(),
        })
    }

    /// Overrides the backoff policy idempotent operations retry with (§7).
    pub fn with_retry_settings(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager, RedisFacadeError> {
        trace!("acquiring redis connection manager");
        let manager = self
            .connection
            .get_or_try_init(|| async { self.client.get_connection_manager().await })
            .await
            .map_err(RedisFacadeError::from)?;
        Ok(manager.clone())
    }

    /// `GET key`. Retries on transient failure (§7).
    pub async fn get(&self, key: &str) -> Result<Option<String>, RedisFacadeError> {
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            conn.get(key).await.map_err(RedisFacadeError::from)
        })
        .await
    }

    /// `SETEX key ttl_seconds value`. Retries on transient failure: a
    /// `SETEX` replacing the whole value is idempotent (§7).
    pub async fn set_ex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<(), RedisFacadeError> {
        let ttl = ttl_seconds.max(1);
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            let _: () = conn.set_ex(key, value, ttl).await.map_err(RedisFacadeError::from)?;
            Ok(())
        })
        .await
    }

    /// `DEL key`. Returns the number of keys removed (`0` or `1`). Retries
    /// on transient failure: a repeated `DEL` of an already-gone key is a
    /// no-op, so this is idempotent (§7).
    pub async fn del(&self, key: &str) -> Result<u64, RedisFacadeError> {
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            conn.del(key).await.map_err(RedisFacadeError::from)
        })
        .await
    }

    /// `EXISTS key`. Retries on transient failure (§7).
    pub async fn exists(&self, key: &str) -> Result<bool, RedisFacadeError> {
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            let count: i64 = conn.exists(key).await.map_err(RedisFacadeError::from)?;
            Ok(count > 0)
        })
        .await
    }

    /// `TTL key`, seconds remaining (Redis-native semantics: `-2`/`-1` passed through).
    pub async fn ttl(&self, key: &str) -> Result<i64, RedisFacadeError> {
        let mut conn = self.connection().await?;
        conn.ttl(key).await.map_err(RedisFacadeError::from)
    }

    /// `PTTL key`, mapped to seconds per §4.1 (`-2 -> 0`, `-1 -> sentinel`).
    /// Retries on transient failure (§7).
    pub async fn pttl(&self, key: &str) -> Result<u64, RedisFacadeError> {
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            let pttl_ms: i64 = conn.pttl(key).await.map_err(RedisFacadeError::from)?;
            Ok(pttl_to_seconds(pttl_ms, self.no_expire_default_seconds))
        })
        .await
    }

    /// `MGET keys...`. Result length and order match `keys` (I5). Retries
    /// on transient failure (§7).
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>, RedisFacadeError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        with_retry(&self.retry, || async {
            let mut conn = self.connection().await?;
            conn.mget(keys).await.map_err(RedisFacadeError::from)
        })
        .await
    }

    /// Executes `ops` as a single pipeline, replies in the same order.
    pub async fn pipeline(&self, ops: &[PipelineOp]) -> Result<Vec<PipelineReply>, RedisFacadeError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for op in ops {
            match op {
                PipelineOp::Get(key) => {
                    pipe.cmd("GET").arg(key);
                }
                PipelineOp::SetEx(key, ttl, value) => {
                    pipe.cmd("SETEX").arg(key).arg(ttl.max(&1)).arg(value).ignore();
                }
                PipelineOp::Del(key) => {
                    pipe.cmd("DEL").arg(key);
                }
                PipelineOp::Pttl(key) => {
                    pipe.cmd("PTTL").arg(key);
                }
            }
        }
        let raw: Vec<redis::Value> = pipe.query_async(&mut conn).await.map_err(RedisFacadeError::from)?;
        let non_ignored = ops.iter().filter(|op| !matches!(op, PipelineOp::SetEx(..)));
        let mut replies = Vec::with_capacity(raw.len());
        for (value, op) in raw.into_iter().zip(non_ignored) {
            replies.push(reply_for(op, value)?);
        }
        Ok(replies)
    }

    /// `SCAN` with `MATCH pattern COUNT count`, collected to completion.
    ///
    /// Returns every matching key; callers needing incremental cursors
    /// should use a lower-level client directly (out of scope here, §4.6's
    /// `Clear` batches by repeatedly calling this with a bounded pattern).
    pub async fn scan(&self, pattern: &str, count: usize) -> Result<Vec<String>, RedisFacadeError> {
        let mut conn = self.connection().await?;
        let iter: redis::AsyncIter<String> = conn
            .scan_match(pattern)
            .await
            .map_err(RedisFacadeError::from)?;
        let mut keys: Vec<String> = Vec::new();
        tokio::pin!(iter);
        while let Some(key) = futures::StreamExt::next(&mut iter).await {
            keys.push(key);
            if keys.len() >= count && count > 0 {
                break;
            }
        }
        Ok(keys)
    }

    /// `UNLINK keys...`. Returns the number of keys removed.
    pub async fn unlink(&self, keys: &[String]) -> Result<u64, RedisFacadeError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        conn.unlink(keys).await.map_err(RedisFacadeError::from)
    }

    /// `PING`.
    pub async fn ping(&self) -> Result<(), RedisFacadeError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(RedisFacadeError::from)?;
        Ok(())
    }

    /// `INFO [section]`.
    pub async fn info(&self, section: Option<&str>) -> Result<String, RedisFacadeError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("INFO");
        if let Some(section) = section {
            cmd.arg(section);
        }
        cmd.query_async(&mut conn).await.map_err(RedisFacadeError::from)
    }
}

fn reply_for(op: &PipelineOp, value: redis::Value) -> Result<PipelineReply, RedisFacadeError> {
    match op {
        PipelineOp::Get(_) => {
            let bulk: Option<String> = redis::FromRedisValue::from_redis_value(&value).map_err(RedisFacadeError::from)?;
            Ok(PipelineReply::Bulk(bulk))
        }
        PipelineOp::Pttl(_) | PipelineOp::Del(_) => {
            let int: i64 = redis::FromRedisValue::from_redis_value(&value).map_err(RedisFacadeError::from)?;
            Ok(PipelineReply::Int(int))
        }
        PipelineOp::SetEx(..) => unreachable!("SetEx replies are ignored by the pipeline"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facade_construction_does_not_touch_the_network() {
        let facade = RedisClientFacade::new("redis://127.0.0.1:1/", 31_536_000);
        assert!(facade.is_ok());
    }

    #[test]
    fn facade_rejects_malformed_connection_url() {
        let facade = RedisClientFacade::new("not-a-redis-url", 31_536_000);
        assert!(facade.is_err());
    }
}
