//! Redis-backed cache store.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, RedisResult, aio::ConnectionManager};
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{AppError, CacheError, CacheStore, WindowCount};

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub connect_timeout: Duration,
    /// Upper bound for every single command
    pub op_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            op_timeout: Duration::from_millis(500),
        }
    }
}

/// Cache store over a reconnecting Redis connection.
pub struct RedisCache {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCache {
    pub async fn connect(redis_url: &str, config: RedisConfig) -> Result<Self, AppError> {
        info!("Connecting to Redis...");
        let client = Client::open(redis_url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let conn = tokio::time::timeout(config.connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(millis(config.connect_timeout)))??;
        info!("Connected to Redis");
        Ok(Self {
            conn,
            op_timeout: config.op_timeout,
        })
    }

    async fn run<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> Result<T, AppError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout(millis(self.op_timeout)).into()),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `PTTL` is negative when the key has no expiry or is gone.
fn window_resets_in(ttl_ms: i64, window: Duration) -> Duration {
    u64::try_from(ttl_ms).map_or(window, Duration::from_millis)
}

#[async_trait]
impl CacheStore for RedisCache {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        self.run(async move { redis::cmd("PING").query_async::<String>(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        self.run(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.run(async move { conn.set_ex::<_, _, ()>(key, value, seconds).await })
            .await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let keys = keys.to_vec();
        self.run(async move { conn.del::<_, ()>(keys).await }).await
    }

    /// Counts a hit in a fixed window.
    ///
    /// `INCR`, `PEXPIRE .. NX` and `PTTL` run in one `MULTI` block, so the
    /// first hit of a window always gets its expiry. Needs Redis 7.
    #[instrument(skip(self))]
    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount, AppError> {
        let mut conn = self.conn.clone();
        let window_ms = i64::try_from(millis(window).max(1)).unwrap_or(i64::MAX);
        let (count, _, ttl_ms): (u64, i64, i64) = self
            .run(async move {
                redis::pipe()
                    .atomic()
                    .incr(key, 1u64)
                    .cmd("PEXPIRE")
                    .arg(key)
                    .arg(window_ms)
                    .arg("NX")
                    .pttl(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        Ok(WindowCount {
            count,
            resets_in: window_resets_in(ttl_ms, window),
        })
    }

}
