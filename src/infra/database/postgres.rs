//! PostgreSQL database client implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use std::time::Duration;
use tracing::{info, instrument};

use super::query::{ListFilter, ListTable, count_query, page_query};
use crate::domain::{
    AppError, Article, ArticleChanges, ArticleCounter, ArticleId, ArticleRepository,
    ArticleStatus, CrudRepository, DatabaseClient, DatabaseError, ListQuery, NewArticle, NewUser,
    PaginatedResponse, User, UserChanges, UserCredentials, UserId, UserRepository, UserStatus,
};

const USER_COLUMNS: &str =
    "id, username, email, nickname, avatar, status, last_login_at, created_at, updated_at";

const ARTICLE_COLUMNS: &str = "id, title, content, author_id, status, published_at, \
     view_count, like_count, comment_count, created_at, updated_at";

const USERS_TABLE: ListTable = ListTable {
    name: "users",
    columns: USER_COLUMNS,
    search_columns: &["username", "email", "nickname"],
};

const ARTICLES_TABLE: ListTable = ListTable {
    name: "articles",
    columns: ARTICLE_COLUMNS,
    search_columns: &["title", "content"],
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL database client with connection pooling
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            "Connecting to PostgreSQL..."
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_user(row: &PgRow) -> Result<User, AppError> {
        let status: i16 = row.try_get("status")?;
        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            nickname: row.try_get("nickname")?,
            avatar: row.try_get("avatar")?,
            status: UserStatus::from_i16(status).ok_or_else(|| {
                DatabaseError::Query(format!("unknown user status {status}"))
            })?,
            last_login_at: row.try_get("last_login_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_credentials(row: &PgRow) -> Result<UserCredentials, AppError> {
        let status: i16 = row.try_get("status")?;
        Ok(UserCredentials {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            status: UserStatus::from_i16(status).ok_or_else(|| {
                DatabaseError::Query(format!("unknown user status {status}"))
            })?,
        })
    }

    fn row_to_article(row: &PgRow) -> Result<Article, AppError> {
        let status: i16 = row.try_get("status")?;
        Ok(Article {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            author_id: row.try_get("author_id")?,
            status: ArticleStatus::from_i16(status).ok_or_else(|| {
                DatabaseError::Query(format!("unknown article status {status}"))
            })?,
            published_at: row.try_get("published_at")?,
            view_count: row.try_get("view_count")?,
            like_count: row.try_get("like_count")?,
            comment_count: row.try_get("comment_count")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn list_rows<T>(
        &self,
        table: &ListTable,
        filter: ListFilter,
        query: &ListQuery<impl Copy>,
        map: fn(&PgRow) -> Result<T, AppError>,
    ) -> Result<PaginatedResponse<T>, AppError> {
        let total: i64 = count_query(table, &filter)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let rows = page_query(
            table,
            &filter,
            query.sort_by,
            query.order,
            query.limit(),
            query.offset(),
        )
        .build()
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(map).collect::<Result<Vec<_>, _>>()?;
        Ok(PaginatedResponse::for_query(
            items,
            u64::try_from(total).unwrap_or_default(),
            query,
        ))
    }
}

#[async_trait]
impl CrudRepository<User> for PostgresClient {
    #[instrument(skip(self, data), fields(username = %data.username))]
    async fn create(&self, data: &NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, nickname, avatar, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&data.username)
            .bind(&data.email)
            .bind(&data.password_hash)
            .bind(&data.nickname)
            .bind(&data.avatar)
            .bind(data.status.as_i16())
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_user(&row)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET \
                 username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 nickname = COALESCE($4, nickname), \
                 avatar = COALESCE($5, avatar), \
                 updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.nickname)
            .bind(&changes.avatar)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_user(&row),
            None => Err(AppError::NotFound(format!("user {id}"))),
        }
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &ListQuery<UserStatus>) -> Result<PaginatedResponse<User>, AppError> {
        let filter = ListFilter {
            author_id: None,
            ..ListFilter::from_query(query, UserStatus::as_i16)
        };
        self.list_rows(&USERS_TABLE, filter, query, Self::row_to_user)
            .await
    }
}

#[async_trait]
impl UserRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    #[instrument(skip(self))]
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, status FROM users \
             WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_credentials).transpose()
    }

    #[instrument(skip(self))]
    async fn get_credentials_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<UserCredentials>, AppError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, status FROM users \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::row_to_credentials).transpose()
    }

    #[instrument(skip(self))]
    async fn username_exists(
        &self,
        username: &str,
        exclude: Option<UserId>,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 \
             AND deleted_at IS NULL AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str, exclude: Option<UserId>) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 \
             AND deleted_at IS NULL AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> Result<u64, AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

#[async_trait]
impl CrudRepository<Article> for PostgresClient {
    #[instrument(skip(self, data), fields(author_id = data.author_id))]
    async fn create(&self, data: &NewArticle) -> Result<Article, AppError> {
        let published_at = (data.status == ArticleStatus::Published).then(Utc::now);
        let sql = format!(
            "INSERT INTO articles (title, content, author_id, status, published_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&data.title)
            .bind(&data.content)
            .bind(data.author_id)
            .bind(data.status.as_i16())
            .bind(published_at)
            .fetch_one(&self.pool)
            .await?;
        Self::row_to_article(&row)
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>, AppError> {
        let sql =
            format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1 AND deleted_at IS NULL");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_article).transpose()
    }

    #[instrument(skip(self, changes))]
    async fn update(&self, id: i64, changes: &ArticleChanges) -> Result<Article, AppError> {
        // published_at is stamped once, the first time the article goes live
        let sql = format!(
            "UPDATE articles SET \
                 title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 status = COALESCE($4, status), \
                 published_at = CASE \
                     WHEN COALESCE($4, status) = 1 AND published_at IS NULL THEN NOW() \
                     ELSE published_at END, \
                 updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {ARTICLE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.status.map(ArticleStatus::as_i16))
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::row_to_article(&row),
            None => Err(AppError::NotFound(format!("article {id}"))),
        }
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE articles SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("article {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        query: &ListQuery<ArticleStatus>,
    ) -> Result<PaginatedResponse<Article>, AppError> {
        let filter = ListFilter::from_query(query, ArticleStatus::as_i16);
        self.list_rows(&ARTICLES_TABLE, filter, query, Self::row_to_article)
            .await
    }
}

#[async_trait]
impl ArticleRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn increment_counter(
        &self,
        id: ArticleId,
        counter: ArticleCounter,
    ) -> Result<i64, AppError> {
        let column = counter.column();
        let sql = format!(
            "UPDATE articles SET {column} = {column} + 1 \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {column}"
        );
        let value: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        value.ok_or_else(|| AppError::NotFound(format!("article {id}")))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }
}
