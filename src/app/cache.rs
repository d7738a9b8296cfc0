//! Read-through JSON snapshot cache.
//!
//! Cache failures never surface to callers: reads degrade to a miss and
//! writes/invalidations are logged and dropped, so the database stays the
//! source of truth.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{AppError, CacheStore, CrudRepository, Entity};

const CACHE_LOOKUPS_TOTAL: &str = "cache_lookups_total";

#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl ReadThroughCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the cached value, or `None` on miss, error or corrupt entry.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Corrupt cache entry, evicting");
                    self.invalidate(&[key.to_string()]).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, falling back to database");
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw, self.ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn invalidate(&self, keys: &[String]) {
        if let Err(e) = self.store.delete(keys).await {
            warn!(?keys, error = %e, "Cache invalidation failed");
        } else {
            debug!(?keys, "Cache entries invalidated");
        }
    }

    /// Fetch an entity by ID through the cache, populating it on miss.
    pub async fn get_entity<T, R>(&self, repo: &R, id: i64) -> Result<Option<T>, AppError>
    where
        T: Entity,
        R: CrudRepository<T> + ?Sized,
    {
        let key = T::cache_key(id);
        if let Some(hit) = self.get::<T>(&key).await {
            metrics::counter!(CACHE_LOOKUPS_TOTAL, "entity" => T::NAME, "result" => "hit")
                .increment(1);
            return Ok(Some(hit));
        }
        metrics::counter!(CACHE_LOOKUPS_TOTAL, "entity" => T::NAME, "result" => "miss")
            .increment(1);

        let found = repo.get_by_id(id).await?;
        if let Some(entity) = &found {
            self.put(&key, entity).await;
        }
        Ok(found)
    }
}
