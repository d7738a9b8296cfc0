use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::Validate;

use super::error::ValidationError;
use super::password::Password;

/// Primary key of a user row.
pub type UserId = i64;

/// Primary key of an article row.
pub type ArticleId = i64;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Treats `""` the same as an absent field so partial updates only
/// overwrite what the client actually filled in.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Account state. Stored as `1` (enabled) / `0` (disabled).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Disabled,
    #[default]
    Enabled,
}

impl UserStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            UserStatus::Disabled => 0,
            UserStatus::Enabled => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(UserStatus::Disabled),
            1 => Some(UserStatus::Enabled),
            _ => None,
        }
    }
}

/// Publication state. Stored as `0` (draft) / `1` (published).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

impl ArticleStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            ArticleStatus::Draft => 0,
            ArticleStatus::Published => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(ArticleStatus::Draft),
            1 => Some(ArticleStatus::Published),
            _ => None,
        }
    }
}

/// A persisted entity with generic CRUD semantics.
///
/// Ties together the payload types the repository takes, the status type
/// used for list filtering, and the columns a list may be sorted by.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    type New: Send + Sync;
    type Changes: Send + Sync;
    type Status: Copy + Send + Sync;

    /// Resource name, used as cache key prefix and in error messages.
    const NAME: &'static str;

    /// Columns accepted by `sort_by`.
    const SORTABLE: &'static [&'static str];

    fn id(&self) -> i64;

    fn cache_key(id: i64) -> String {
        format!("{}:{}", Self::NAME, id)
    }
}

/// Public view of an account. The password hash is never part of it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Enabled
    }
}

impl Entity for User {
    type New = NewUser;
    type Changes = UserChanges;
    type Status = UserStatus;

    const NAME: &'static str = "user";
    const SORTABLE: &'static [&'static str] = &[
        "id",
        "username",
        "email",
        "created_at",
        "updated_at",
        "last_login_at",
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

/// Cache key for the username index entry.
pub fn username_cache_key(username: &str) -> String {
    format!("user:username:{username}")
}

/// What a login needs to see. Never cached or serialized.
#[derive(Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub status: UserStatus,
}

impl UserCredentials {
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Enabled
    }
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("status", &self.status)
            .finish()
    }
}

/// Row to insert into `users`. The password is already hashed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub status: UserStatus,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("nickname", &self.nickname)
            .field("avatar", &self.avatar)
            .field("status", &self.status)
            .finish()
    }
}

/// Partial update of a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.nickname.is_none()
            && self.avatar.is_none()
    }
}

/// Self-service registration payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    pub password: Password,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
}

/// Authenticated user creation; may set an explicit status.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email, length(max = 100))]
    pub email: String,
    pub password: Password,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

impl From<RegisterRequest> for CreateUserRequest {
    fn from(req: RegisterRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            password: req.password,
            nickname: req.nickname,
            avatar: req.avatar,
            status: None,
        }
    }
}

/// Self-service profile edit. Account status is fixed at creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(email, length(max = 100))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 100))]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            username: req.username,
            email: req.email,
            nickname: req.nickname,
            avatar: req.avatar,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub old_password: Password,
    pub new_password: Password,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    pub password: Password,
}

/// A freshly signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

impl LoginResponse {
    pub fn new(token: IssuedToken, user: User) -> Self {
        Self {
            token: token.token,
            token_type: "Bearer".to_string(),
            expires_at: token.expires_at,
            user,
        }
    }
}

/// Identity attached to a request once its bearer token is verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub status: ArticleStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Article {
    type New = NewArticle;
    type Changes = ArticleChanges;
    type Status = ArticleStatus;

    const NAME: &'static str = "article";
    const SORTABLE: &'static [&'static str] = &[
        "id",
        "title",
        "created_at",
        "updated_at",
        "published_at",
        "view_count",
        "like_count",
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub status: ArticleStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<ArticleStatus>,
}

impl ArticleChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub status: ArticleStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateArticleRequest {
    #[serde(default, deserialize_with = "empty_as_none")]
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<ArticleStatus>,
}

impl From<UpdateArticleRequest> for ArticleChanges {
    fn from(req: UpdateArticleRequest) -> Self {
        Self {
            title: req.title,
            content: req.content,
            status: req.status,
        }
    }
}

/// Counters that only ever move through atomic increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleCounter {
    View,
    Like,
    Comment,
}

impl ArticleCounter {
    pub fn column(self) -> &'static str {
        match self {
            ArticleCounter::View => "view_count",
            ArticleCounter::Like => "like_count",
            ArticleCounter::Comment => "comment_count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Raw list parameters as they arrive in the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct ListParams<S> {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub keyword: Option<String>,
    pub status: Option<S>,
    pub author_id: Option<UserId>,
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
}

impl<S> Default for ListParams<S> {
    fn default() -> Self {
        Self {
            page: None,
            page_size: None,
            keyword: None,
            status: None,
            author_id: None,
            sort_by: None,
            order: None,
        }
    }
}

impl<S> ListParams<S> {
    /// Applies defaults and bounds, and resolves `sort_by` against the
    /// entity's allow-list.
    pub fn into_query(
        self,
        sortable: &'static [&'static str],
    ) -> Result<ListQuery<S>, ValidationError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(ValidationError::field("page", "must be at least 1"));
        }

        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ValidationError::field(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }

        let keyword = self
            .keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        if keyword
            .as_ref()
            .is_some_and(|k| k.chars().count() > MAX_KEYWORD_LENGTH)
        {
            return Err(ValidationError::field(
                "keyword",
                format!("must be at most {MAX_KEYWORD_LENGTH} characters"),
            ));
        }

        let sort_by = match self.sort_by.as_deref().filter(|s| !s.is_empty()) {
            None => "id",
            Some(requested) => sortable
                .iter()
                .copied()
                .find(|allowed| *allowed == requested)
                .ok_or_else(|| {
                    ValidationError::field(
                        "sort_by",
                        format!("must be one of: {}", sortable.join(", ")),
                    )
                })?,
        };

        Ok(ListQuery {
            page,
            page_size,
            keyword,
            status: self.status,
            author_id: self.author_id,
            sort_by,
            order: self.order.unwrap_or_default(),
        })
    }
}

/// Validated list query. `sort_by` always comes from an allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery<S> {
    pub page: u32,
    pub page_size: u32,
    pub keyword: Option<String>,
    pub status: Option<S>,
    pub author_id: Option<UserId>,
    pub sort_by: &'static str,
    pub order: SortOrder,
}

impl<S> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            keyword: None,
            status: None,
            author_id: None,
            sort_by: "id",
            order: SortOrder::Desc,
        }
    }
}

impl<S> ListQuery<S> {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u32, page_size: u32) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            total,
            page,
            page_size,
            total_pages,
        }
    }

    pub fn for_query<S>(items: Vec<T>, total: u64, query: &ListQuery<S>) -> Self {
        Self::new(items, total, query.page, query.page_size)
    }
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub cache: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// The database is required; a cache outage only degrades service.
    pub fn new(database: HealthStatus, cache: HealthStatus) -> Self {
        let status = match (&database, &cache) {
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            database,
            cache,
            timestamp: Utc::now(),
        }
    }
}
