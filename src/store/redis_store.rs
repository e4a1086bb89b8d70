use super::{Store, WindowHit, WindowSnapshot};
use crate::error::{RateLimitError, Result};
use crate::rules::MAX_WINDOW_SECONDS;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};

/// Redis-backed store.
///
/// A single multiplexed connection is opened lazily and shared by all
/// requests. It is dropped after any transport failure so the next call
/// reconnects.
pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(redis_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            RateLimitError::Config(format!("Failed to create Redis client: {}", e))
        })?;

        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    /// Deadline for one store operation, connect included.
    fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    /// Cached connection, or a fresh one opened without holding the cache
    /// lock so concurrent callers each stay within their own deadline.
    async fn connection(&self, deadline: Instant) -> Result<MultiplexedConnection> {
        let cached = time::timeout_at(deadline, self.connection.lock())
            .await
            .map_err(|_| self.timed_out("connect"))?
            .clone();
        if let Some(conn) = cached {
            return Ok(conn);
        }

        let conn = time::timeout_at(deadline, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| self.timed_out("connect"))?
            .map_err(|e| {
                RateLimitError::StoreUnavailable(format!("Failed to connect to Redis: {}", e))
            })?;

        let mut guard = self.connection.lock().await;
        match guard.as_ref() {
            // Another caller won the race; share its connection
            Some(existing) => Ok(existing.clone()),
            None => {
                info!(target: "ratewarden::store", "redis_connected");
                *guard = Some(conn.clone());
                Ok(conn)
            }
        }
    }

    async fn reset_connection(&self) {
        if self.connection.lock().await.take().is_some() {
            warn!(target: "ratewarden::store", "redis_connection_reset");
        }
    }

    fn timed_out(&self, op: &str) -> RateLimitError {
        error!(target: "ratewarden::store", op, "redis_command_timed_out");
        RateLimitError::StoreUnavailable(format!("{} timed out after {:?}", op, self.timeout))
    }

    /// Finish one round trip before `deadline`, mapping every failure to
    /// `StoreUnavailable`.
    async fn bounded<T, F>(&self, op: &'static str, deadline: Instant, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match time::timeout_at(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if is_transport_error(&e) {
                    self.reset_connection().await;
                }
                error!(target: "ratewarden::store", op, error = %e, "redis_command_failed");
                Err(RateLimitError::StoreUnavailable(format!("{} failed: {}", op, e)))
            }
            Err(_) => {
                self.reset_connection().await;
                Err(self.timed_out(op))
            }
        }
    }
}

fn is_transport_error(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal()
}

#[async_trait]
impl Store for RedisStore {
    async fn get_fields(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        let deadline = self.deadline();
        let mut conn = self.connection(deadline).await?;

        let mut cmd = redis::cmd("HMGET");
        cmd.arg(key);
        for field in fields {
            cmd.arg(field);
        }

        self.bounded("HMGET", deadline, cmd.query_async::<_, Vec<Option<String>>>(&mut conn))
            .await
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let deadline = self.deadline();
        let mut conn = self.connection(deadline).await?;

        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);

        self.bounded("HSET", deadline, cmd.query_async::<_, ()>(&mut conn)).await
    }

    async fn record_hit(&self, key: &str, hit: &WindowHit) -> Result<WindowSnapshot> {
        // An EXPIRE error inside EXEC would not undo the ZADD before it
        if hit.ttl_seconds == 0 || hit.ttl_seconds > MAX_WINDOW_SECONDS {
            return Err(RateLimitError::InvalidRule(format!(
                "window ttl {}s outside 1..={}",
                hit.ttl_seconds, MAX_WINDOW_SECONDS
            )));
        }

        let deadline = self.deadline();
        let mut conn = self.connection(deadline).await?;

        // MULTI/EXEC: the server runs the whole block before any other client
        // command touching the key.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(hit.min_score.saturating_sub(1))
            .ignore()
            .cmd("ZADD")
            .arg(key)
            .arg(hit.now)
            .arg(&hit.member)
            .ignore()
            .cmd("ZCARD")
            .arg(key)
            .cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("WITHSCORES")
            .cmd("EXPIRE")
            .arg(key)
            .arg(hit.ttl_seconds)
            .ignore();

        let (count, oldest): (u64, Vec<(String, f64)>) = self
            .bounded("window batch", deadline, pipe.query_async(&mut conn))
            .await?;

        Ok(WindowSnapshot {
            count,
            oldest: oldest.first().map(|(_, score)| *score as i64),
        })
    }

    async fn ping(&self) -> Result<()> {
        let deadline = self.deadline();
        let mut conn = self.connection(deadline).await?;
        self.bounded("PING", deadline, redis::cmd("PING").query_async::<_, String>(&mut conn))
            .await
            .map(|_| ())
    }

    async fn close(&self) {
        if self.connection.lock().await.take().is_some() {
            info!(target: "ratewarden::store", "redis_connection_closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = RedisStore::new("not-a-redis-url", Duration::from_millis(100));
        assert!(matches!(result, Err(RateLimitError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_store_unavailable() {
        // Nothing listens on port 1; the connect fails fast.
        let store = RedisStore::new("redis://127.0.0.1:1", Duration::from_millis(500)).unwrap();

        let ping = store.ping().await;
        assert!(matches!(ping, Err(RateLimitError::StoreUnavailable(_))));

        let hit = WindowHit {
            member: "1-a".to_string(),
            now: 1,
            min_score: 1,
            ttl_seconds: 60,
        };
        let batch = store.record_hit("rl:win:c:/e", &hit).await;
        assert!(matches!(batch, Err(RateLimitError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_oversized_ttl_rejected_before_any_command() {
        let store = RedisStore::new("redis://127.0.0.1:1", Duration::from_millis(500)).unwrap();
        let hit = WindowHit {
            member: "1-a".to_string(),
            now: 1,
            min_score: 1,
            ttl_seconds: MAX_WINDOW_SECONDS + 1,
        };

        let batch = store.record_hit("rl:win:c:/e", &hit).await;
        assert!(matches!(batch, Err(RateLimitError::InvalidRule(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_silent_server_does_not_queue_callers() {
        // Accepts connections and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(300);
        let store = std::sync::Arc::new(
            RedisStore::new(&format!("redis://{}", addr), timeout).unwrap(),
        );

        let started = std::time::Instant::now();
        let mut handles = Vec::new();
        for _ in 0..5 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let begun = std::time::Instant::now();
                let result = store.ping().await;
                (result, begun.elapsed())
            }));
        }

        for handle in handles {
            let (result, elapsed) = handle.await.unwrap();
            assert!(matches!(result, Err(RateLimitError::StoreUnavailable(_))));
            assert!(elapsed < timeout * 2, "ping took {:?}", elapsed);
        }
        assert!(started.elapsed() < timeout * 3, "total {:?}", started.elapsed());
    }
}
