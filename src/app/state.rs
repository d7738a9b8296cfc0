//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

use super::article_service::ArticleService;
use super::auth_service::AuthService;
use super::cache::ReadThroughCache;
use super::user_service::UserService;
use crate::domain::{
    CacheStore, DatabaseClient, HealthResponse, HealthStatus, PasswordHasher, TokenIssuer,
};

/// Shared application state for the Axum web server.
///
/// Services are built once from the injected clients; handlers only see
/// trait objects and never the concrete infrastructure types.
///
/// # Example
///
/// ```ignore
/// let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
/// let cache = Arc::new(RedisCache::connect(&redis_url, RedisConfig::default()).await?);
/// let state = AppState::new(db, cache, hasher, tokens, Duration::from_secs(600));
///
/// let router = create_router(Arc::new(state), RouterConfig::default());
/// ```
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub articles: Arc<ArticleService>,
    pub auth: Arc<AuthService>,

    /// Verifies bearer tokens in the auth middleware.
    pub tokens: Arc<dyn TokenIssuer>,

    pub db_client: Arc<dyn DatabaseClient>,
    pub cache: Arc<dyn CacheStore>,
}

impl AppState {
    /// Wires every service to the given clients.
    ///
    /// Generic over the database so one concrete client can back the user
    /// and article repository handles at the same time.
    #[must_use]
    pub fn new<D>(
        db: Arc<D>,
        cache: Arc<dyn CacheStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        cache_ttl: Duration,
    ) -> Self
    where
        D: DatabaseClient + 'static,
    {
        let read_through = ReadThroughCache::new(Arc::clone(&cache), cache_ttl);

        let users = Arc::new(UserService::new(
            db.clone(),
            read_through.clone(),
            Arc::clone(&hasher),
        ));
        let articles = Arc::new(ArticleService::new(db.clone(), db.clone(), read_through));
        let auth = Arc::new(AuthService::new(
            Arc::clone(&users),
            db.clone(),
            hasher,
            Arc::clone(&tokens),
        ));

        Self {
            users,
            articles,
            auth,
            tokens,
            db_client: db,
            cache,
        }
    }

    /// Performs a health check on all dependencies.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_health = match self.db_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };

        let cache_health = match self.cache.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Cache health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(db_health, cache_health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockCache, MockConfig, MockDatabase, fast_hasher, test_jwt};

    fn state(db: Arc<MockDatabase>, cache: Arc<MockCache>) -> AppState {
        AppState::new(
            db,
            cache,
            fast_hasher(),
            Arc::new(test_jwt()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = state(Arc::new(MockDatabase::new()), Arc::new(MockCache::new()));
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.users, &cloned.users));
        assert!(Arc::ptr_eq(&state.articles, &cloned.articles));
    }

    #[tokio::test]
    async fn test_health_all_up() {
        let state = state(Arc::new(MockDatabase::new()), Arc::new(MockCache::new()));
        let health = state.health_check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_health_cache_down_is_degraded() {
        let cache = Arc::new(MockCache::with_config(MockConfig::failure("down")));
        let state = state(Arc::new(MockDatabase::new()), cache);
        let health = state.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.cache, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_health_database_down_is_unhealthy() {
        let db = Arc::new(MockDatabase::new());
        db.set_healthy(false);
        let state = state(db, Arc::new(MockCache::new()));
        let health = state.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.database, HealthStatus::Unhealthy);
    }
}
