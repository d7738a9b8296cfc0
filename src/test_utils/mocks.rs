//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate various scenarios including
//! success, failure, and edge cases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::{
    AppError, Article, ArticleChanges, ArticleCounter, ArticleId, ArticleRepository,
    ArticleStatus, CacheError, CacheStore, CrudRepository, DatabaseClient, DatabaseError,
    ListQuery, NewArticle, NewUser, PaginatedResponse, SortOrder, User, UserChanges,
    UserCredentials, UserId, UserRepository, UserStatus, WindowCount,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

struct UserRow {
    user: User,
    password_hash: String,
    deleted: bool,
}

struct ArticleRow {
    article: Article,
    deleted: bool,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, UserRow>,
    articles: HashMap<ArticleId, ArticleRow>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_user(&self, id: UserId) -> Option<&UserRow> {
        self.users.get(&id).filter(|row| !row.deleted)
    }

    fn live_user_by_name(&self, username: &str) -> Option<&UserRow> {
        self.users
            .values()
            .find(|row| !row.deleted && row.user.username == username)
    }

    fn taken(&self, exclude: Option<UserId>, pred: impl Fn(&User) -> bool) -> bool {
        self.users
            .values()
            .any(|row| !row.deleted && Some(row.user.id) != exclude && pred(&row.user))
    }
}

/// In-memory stand-in for PostgreSQL.
///
/// Mirrors the SQL semantics the services rely on: soft deletes, unique
/// username/email among live rows, atomic counters and allow-listed sorting.
///
/// # Example
///
/// ```
/// use axum_backend_template::test_utils::{MockConfig, MockDatabase};
///
/// let mock = MockDatabase::new();
/// let failing_mock = MockDatabase::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockDatabase {
    tables: Arc<Mutex<Tables>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockDatabase {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Stored hash for a user, deleted or not.
    pub fn password_hash(&self, id: UserId) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .users
            .get(&id)
            .map(|row| row.password_hash.clone())
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn paginate<T, S>(
    mut rows: Vec<T>,
    query: &ListQuery<S>,
    compare: impl Fn(&T, &T, &str) -> CmpOrdering,
    id: impl Fn(&T) -> i64,
) -> PaginatedResponse<T> {
    rows.sort_by(|a, b| {
        let primary = match query.order {
            SortOrder::Asc => compare(a, b, query.sort_by),
            SortOrder::Desc => compare(b, a, query.sort_by),
        };
        let tie = match query.order {
            SortOrder::Asc => id(a).cmp(&id(b)),
            SortOrder::Desc => id(b).cmp(&id(a)),
        };
        primary.then(tie)
    });

    let total = rows.len() as u64;
    let items = rows
        .into_iter()
        .skip(query.offset() as usize)
        .take(query.limit() as usize)
        .collect();
    PaginatedResponse::for_query(items, total, query)
}

fn cmp_opt_time(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> CmpOrdering {
    a.cmp(b)
}

fn compare_users(a: &User, b: &User, field: &str) -> CmpOrdering {
    match field {
        "username" => a.username.cmp(&b.username),
        "email" => a.email.cmp(&b.email),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        "last_login_at" => cmp_opt_time(&a.last_login_at, &b.last_login_at),
        _ => a.id.cmp(&b.id),
    }
}

fn compare_articles(a: &Article, b: &Article, field: &str) -> CmpOrdering {
    match field {
        "title" => a.title.cmp(&b.title),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        "published_at" => cmp_opt_time(&a.published_at, &b.published_at),
        "view_count" => a.view_count.cmp(&b.view_count),
        "like_count" => a.like_count.cmp(&b.like_count),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl CrudRepository<User> for MockDatabase {
    async fn create(&self, data: &NewUser) -> Result<User, AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();

        if tables.taken(None, |u| u.username == data.username || u.email == data.email) {
            return Err(DatabaseError::Duplicate("users_username_or_email".to_string()).into());
        }

        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            username: data.username.clone(),
            email: data.email.clone(),
            nickname: data.nickname.clone(),
            avatar: data.avatar.clone(),
            status: data.status,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                password_hash: data.password_hash.clone(),
                deleted: false,
            },
        );
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.live_user(id).map(|row| row.user.clone()))
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<User, AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();

        let clash = tables.taken(Some(id), |u| {
            changes.username.as_deref() == Some(u.username.as_str())
                || changes.email.as_deref() == Some(u.email.as_str())
        });
        if clash {
            return Err(DatabaseError::Duplicate("users_username_or_email".to_string()).into());
        }

        let row = tables
            .users
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
        let user = &mut row.user;
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(nickname) = &changes.nickname {
            user.nickname = Some(nickname.clone());
        }
        if let Some(avatar) = &changes.avatar {
            user.avatar = Some(avatar.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        match tables.users.get_mut(&id).filter(|row| !row.deleted) {
            Some(row) => {
                row.deleted = true;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("user {id}"))),
        }
    }

    async fn list(&self, query: &ListQuery<UserStatus>) -> Result<PaginatedResponse<User>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        let rows: Vec<User> = tables
            .users
            .values()
            .filter(|row| !row.deleted)
            .map(|row| &row.user)
            .filter(|u| query.status.is_none_or(|s| u.status == s))
            .filter(|u| {
                query.keyword.as_deref().is_none_or(|k| {
                    contains_ci(&u.username, k)
                        || contains_ci(&u.email, k)
                        || u.nickname.as_deref().is_some_and(|n| contains_ci(n, k))
                })
            })
            .cloned()
            .collect();
        Ok(paginate(rows, query, compare_users, |u| u.id))
    }
}

#[async_trait]
impl UserRepository for MockDatabase {
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.live_user_by_name(username).map(|row| row.user.clone()))
    }

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.live_user_by_name(username).map(credentials))
    }

    async fn get_credentials_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<UserCredentials>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.live_user(id).map(credentials))
    }

    async fn username_exists(
        &self,
        username: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.taken(exclude, |u| u.username == username))
    }

    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> Result<bool, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.taken(exclude, |u| u.email == email))
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .users
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
        row.password_hash = password_hash.to_string();
        row.user.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        if let Some(row) = tables.users.get_mut(&id).filter(|row| !row.deleted) {
            row.user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().filter(|row| !row.deleted).count() as u64)
    }
}

fn credentials(row: &UserRow) -> UserCredentials {
    UserCredentials {
        id: row.user.id,
        username: row.user.username.clone(),
        password_hash: row.password_hash.clone(),
        status: row.user.status,
    }
}

#[async_trait]
impl CrudRepository<Article> for MockDatabase {
    async fn create(&self, data: &NewArticle) -> Result<Article, AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();

        if tables.live_user(data.author_id).is_none() {
            return Err(DatabaseError::ForeignKey(format!("user {}", data.author_id)).into());
        }

        let now = Utc::now();
        let article = Article {
            id: tables.next_id(),
            title: data.title.clone(),
            content: data.content.clone(),
            author_id: data.author_id,
            status: data.status,
            published_at: (data.status == ArticleStatus::Published).then_some(now),
            view_count: 0,
            like_count: 0,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.articles.insert(
            article.id,
            ArticleRow {
                article: article.clone(),
                deleted: false,
            },
        );
        Ok(article)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .articles
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.article.clone()))
    }

    async fn update(&self, id: i64, changes: &ArticleChanges) -> Result<Article, AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .articles
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| AppError::NotFound(format!("article {id}")))?;

        let now = Utc::now();
        let article = &mut row.article;
        if let Some(title) = &changes.title {
            article.title = title.clone();
        }
        if let Some(content) = &changes.content {
            article.content = content.clone();
        }
        if let Some(status) = changes.status {
            article.status = status;
            if status == ArticleStatus::Published && article.published_at.is_none() {
                article.published_at = Some(now);
            }
        }
        article.updated_at = now;
        Ok(article.clone())
    }

    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        match tables.articles.get_mut(&id).filter(|row| !row.deleted) {
            Some(row) => {
                row.deleted = true;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("article {id}"))),
        }
    }

    async fn list(
        &self,
        query: &ListQuery<ArticleStatus>,
    ) -> Result<PaginatedResponse<Article>, AppError> {
        self.enter().await?;
        let tables = self.tables.lock().unwrap();
        let rows: Vec<Article> = tables
            .articles
            .values()
            .filter(|row| !row.deleted)
            .map(|row| &row.article)
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .filter(|a| query.author_id.is_none_or(|id| a.author_id == id))
            .filter(|a| {
                query
                    .keyword
                    .as_deref()
                    .is_none_or(|k| contains_ci(&a.title, k) || contains_ci(&a.content, k))
            })
            .cloned()
            .collect();
        Ok(paginate(rows, query, compare_articles, |a| a.id))
    }
}

#[async_trait]
impl ArticleRepository for MockDatabase {
    async fn increment_counter(
        &self,
        id: ArticleId,
        counter: ArticleCounter,
    ) -> Result<i64, AppError> {
        self.enter().await?;
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .articles
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| AppError::NotFound(format!("article {id}")))?;

        let value = match counter {
            ArticleCounter::View => &mut row.article.view_count,
            ArticleCounter::Like => &mut row.article.like_count,
            ArticleCounter::Comment => &mut row.article.comment_count,
        };
        *value += 1;
        Ok(*value)
    }
}

#[async_trait]
impl DatabaseClient for MockDatabase {
    async fn health_check(&self) -> Result<(), AppError> {
        if !self.is_healthy.load(Ordering::Relaxed) {
            self.call_count.fetch_add(1, Ordering::Relaxed);
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }
        self.enter().await
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

struct Window {
    count: u64,
    resets_at: Instant,
}

/// In-memory stand-in for Redis with TTL expiry and failure injection.
pub struct MockCache {
    entries: Mutex<HashMap<String, Entry>>,
    windows: Mutex<HashMap<String, Window>>,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockCache {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
            config,
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Whether a live (unexpired) entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock cache error".to_string());
            return Err(AppError::Cache(CacheError::Connection(msg)));
        }
        Ok(())
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MockCache {
    async fn health_check(&self) -> Result<(), AppError> {
        self.enter().await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.enter().await?;
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        self.enter().await?;
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), AppError> {
        self.enter().await?;
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<WindowCount, AppError> {
        self.enter().await?;
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let slot = windows
            .entry(key.to_string())
            .and_modify(|w| {
                if w.resets_at <= now {
                    w.count = 0;
                    w.resets_at = now + window;
                }
            })
            .or_insert(Window {
                count: 0,
                resets_at: now + window,
            });
        slot.count += 1;
        Ok(WindowCount {
            count: slot.count,
            resets_in: slot.resets_at.saturating_duration_since(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Entity, ListParams};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@x.com"),
            password_hash: "hash".to_string(),
            nickname: None,
            avatar: None,
            status: UserStatus::Enabled,
        }
    }

    #[tokio::test]
    async fn test_mock_database_create_and_get() {
        let mock = MockDatabase::new();
        let created = CrudRepository::<User>::create(&mock, &new_user("alice"))
            .await
            .unwrap();

        let fetched = CrudRepository::<User>::get_by_id(&mock, created.id)
            .await
            .unwrap();
        assert_eq!(fetched, Some(created));
    }

    #[tokio::test]
    async fn test_mock_database_unique_among_live_rows() {
        let mock = MockDatabase::new();
        let alice = CrudRepository::<User>::create(&mock, &new_user("alice"))
            .await
            .unwrap();
        assert!(
            CrudRepository::<User>::create(&mock, &new_user("alice"))
                .await
                .is_err()
        );

        CrudRepository::<User>::soft_delete(&mock, alice.id)
            .await
            .unwrap();
        assert!(
            CrudRepository::<User>::create(&mock, &new_user("alice"))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_mock_database_list_pages_are_disjoint() {
        let mock = MockDatabase::new();
        for i in 0..11 {
            CrudRepository::<User>::create(&mock, &new_user(&format!("user{i:02}")))
                .await
                .unwrap();
        }

        let page = |n| {
            ListParams::<UserStatus> {
                page: Some(n),
                ..Default::default()
            }
            .into_query(User::SORTABLE)
            .unwrap()
        };
        let first = CrudRepository::<User>::list(&mock, &page(1)).await.unwrap();
        let second = CrudRepository::<User>::list(&mock, &page(2)).await.unwrap();

        assert_eq!(first.total, 11);
        assert_eq!(first.items.len(), 10);
        assert_eq!(second.items.len(), 1);
        assert!(
            second
                .items
                .iter()
                .all(|u| first.items.iter().all(|f| f.id != u.id))
        );
    }

    #[tokio::test]
    async fn test_mock_database_missing_rows_are_not_found() {
        let mock = MockDatabase::new();

        let err = CrudRepository::<User>::update(&mock, 42, &UserChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = CrudRepository::<User>::soft_delete(&mock, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = mock.update_password(42, "hash").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = CrudRepository::<Article>::soft_delete(&mock, 42)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = mock
            .increment_counter(42, ArticleCounter::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mock_database_failure() {
        let mock = MockDatabase::failing("Connection timeout");
        let result = CrudRepository::<User>::create(&mock, &new_user("alice")).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::Query(_)))
        ));
    }

    #[tokio::test]
    async fn test_mock_database_call_count() {
        let mock = MockDatabase::new();
        assert_eq!(mock.call_count(), 0);

        let _ = mock.health_check().await;
        assert_eq!(mock.call_count(), 1);

        let _ = mock.get_by_username("test").await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_cache_ttl_and_window() {
        let cache = MockCache::new();
        cache
            .set("k", "v", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("k").await.unwrap().is_none());

        let w = Duration::from_millis(50);
        assert_eq!(cache.incr_window("rl", w).await.unwrap().count, 1);
        assert_eq!(cache.incr_window("rl", w).await.unwrap().count, 2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.incr_window("rl", w).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let db = MockDatabase::new();
        let cache = MockCache::with_config(MockConfig::failure("down"));

        assert!(db.health_check().await.is_ok());
        assert!(cache.health_check().await.is_err());

        db.set_healthy(false);
        assert!(db.health_check().await.is_err());
    }
}
