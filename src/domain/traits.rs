//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use super::error::{AppError, AuthError};
use super::types::{
    Article, ArticleCounter, ArticleId, AuthUser, Entity, IssuedToken, ListQuery,
    PaginatedResponse, User, UserCredentials, UserId,
};

/// Generic persistence contract shared by every entity.
///
/// Soft-deleted rows are invisible to all of these operations.
#[async_trait]
pub trait CrudRepository<T: Entity>: Send + Sync {
    /// Insert a new row and return it as stored
    async fn create(&self, data: &T::New) -> Result<T, AppError>;

    /// Get a single live row by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<T>, AppError>;

    /// Apply a partial update. Fails with `NotFound` when the row is absent.
    async fn update(&self, id: i64, changes: &T::Changes) -> Result<T, AppError>;

    /// Mark a row deleted. Fails with `NotFound` when absent or already deleted.
    async fn soft_delete(&self, id: i64) -> Result<(), AppError>;

    /// Filtered, sorted, paginated listing
    async fn list(&self, query: &ListQuery<T::Status>) -> Result<PaginatedResponse<T>, AppError>;
}

#[async_trait]
pub trait UserRepository: CrudRepository<User> {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Credential lookup for login. Never goes through the cache.
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError>;

    async fn get_credentials_by_id(&self, id: UserId)
    -> Result<Option<UserCredentials>, AppError>;

    /// Whether a live user other than `exclude` holds this username
    async fn username_exists(
        &self,
        username: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, AppError>;

    /// Whether a live user other than `exclude` holds this email
    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> Result<bool, AppError>;

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError>;

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Number of live users
    async fn count(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait ArticleRepository: CrudRepository<Article> {
    /// Atomically bump a counter and return its new value
    async fn increment_counter(
        &self,
        id: ArticleId,
        counter: ArticleCounter,
    ) -> Result<i64, AppError>;
}

/// Database client trait for persistence operations
#[async_trait]
pub trait DatabaseClient: UserRepository + ArticleRepository {
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Key/value store used for read-through caching and window counters.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check cache connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    async fn delete(&self, keys: &[String]) -> Result<(), AppError>;

    /// Increment a fixed-window counter, starting the window on first hit
    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount, AppError>;
}

/// State of a fixed-window counter after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    pub resets_in: Duration,
}

/// One-way password hashing.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plain: &str) -> Result<String, AppError>;

    async fn verify(&self, plain: &str, hash: &str) -> Result<bool, AppError>;

    /// Burn the same amount of work as a real verification, so a missing
    /// account is not observable through response time.
    async fn verify_dummy(&self, plain: &str) -> Result<(), AppError>;
}

/// Bearer token issuance and verification.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user_id: UserId, username: &str) -> Result<IssuedToken, AppError>;

    fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}
