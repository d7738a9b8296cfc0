//! Cache store implementations.

pub mod redis;

pub use self::redis::{RedisCache, RedisConfig};

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{AppError, CacheError, CacheStore, WindowCount};

/// Stand-in used when Redis is unreachable at startup.
///
/// Reads always miss and writes are dropped, so services fall through to the
/// database. Window counters error out, which the rate limiter treats as
/// fail-open.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    async fn health_check(&self) -> Result<(), AppError> {
        Err(CacheError::Disabled.into())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), AppError> {
        Ok(())
    }

    async fn incr_window(&self, _key: &str, _window: Duration) -> Result<WindowCount, AppError> {
        Err(CacheError::Disabled.into())
    }
}
