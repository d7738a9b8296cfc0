//! HTTP request handlers.
//!
//! Handlers only translate between HTTP and the services; every response
//! goes out in the [`ApiResponse`] envelope.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::extract::{ValidJson, ValidPath, ValidQuery};
use super::response::{ApiResponse, code, error_response};
use crate::app::AppState;
use crate::domain::{
    AppError, Article, ArticleId, ArticleStatus, AuthUser, ChangePasswordRequest,
    CreateArticleRequest, CreateUserRequest, Entity, HealthResponse, HealthStatus, ListParams,
    LoginRequest, LoginResponse, PaginatedResponse, RegisterRequest, UpdateArticleRequest,
    UpdateUserRequest, User, UserId, UserStatus,
};
use crate::infra::observability::PrometheusHandle;

type ApiResult<T> = Result<ApiResponse<T>, AppError>;

// Auth

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> ApiResult<User> {
    let user = state.auth.register(payload).await?;
    Ok(ApiResponse::success(user))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.auth.login(payload).await?;
    Ok(ApiResponse::success(response))
}

pub async fn me_handler(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<User> {
    Ok(ApiResponse::success(state.auth.me(&user).await?))
}

// Users

pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams<UserStatus>>,
) -> ApiResult<PaginatedResponse<User>> {
    let query = params.into_query(User::SORTABLE)?;
    Ok(ApiResponse::success(state.users.list(&query).await?))
}

pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<UserId>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.get_by_id(id).await?))
}

pub async fn get_user_by_username_handler(
    State(state): State<Arc<AppState>>,
    ValidPath(username): ValidPath<String>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(
        state.users.get_by_username(&username).await?,
    ))
}

pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    _actor: AuthUser,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(state.users.create(payload).await?))
}

pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidPath(id): ValidPath<UserId>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> ApiResult<User> {
    Ok(ApiResponse::success(
        state.users.update(&actor, id, payload).await?,
    ))
}

pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidPath(id): ValidPath<UserId>,
) -> ApiResult<()> {
    state.users.delete(&actor, id).await?;
    Ok(ApiResponse::ok())
}

pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidJson(payload): ValidJson<ChangePasswordRequest>,
) -> ApiResult<()> {
    state.users.change_password(&actor, payload).await?;
    Ok(ApiResponse::ok())
}

// Articles

pub async fn list_articles_handler(
    State(state): State<Arc<AppState>>,
    ValidQuery(params): ValidQuery<ListParams<ArticleStatus>>,
) -> ApiResult<PaginatedResponse<Article>> {
    let query = params.into_query(Article::SORTABLE)?;
    Ok(ApiResponse::success(state.articles.list(&query).await?))
}

pub async fn get_article_handler(
    State(state): State<Arc<AppState>>,
    ValidPath(id): ValidPath<ArticleId>,
) -> ApiResult<Article> {
    Ok(ApiResponse::success(state.articles.get(id).await?))
}

pub async fn create_article_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidJson(payload): ValidJson<CreateArticleRequest>,
) -> ApiResult<Article> {
    Ok(ApiResponse::success(
        state.articles.create(&actor, payload).await?,
    ))
}

pub async fn update_article_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidPath(id): ValidPath<ArticleId>,
    ValidJson(payload): ValidJson<UpdateArticleRequest>,
) -> ApiResult<Article> {
    Ok(ApiResponse::success(
        state.articles.update(&actor, id, payload).await?,
    ))
}

pub async fn delete_article_handler(
    State(state): State<Arc<AppState>>,
    actor: AuthUser,
    ValidPath(id): ValidPath<ArticleId>,
) -> ApiResult<()> {
    state.articles.delete(&actor, id).await?;
    Ok(ApiResponse::ok())
}

pub async fn like_article_handler(
    State(state): State<Arc<AppState>>,
    _actor: AuthUser,
    ValidPath(id): ValidPath<ArticleId>,
) -> ApiResult<Article> {
    Ok(ApiResponse::success(state.articles.like(id).await?))
}

pub async fn comment_article_handler(
    State(state): State<Arc<AppState>>,
    _actor: AuthUser,
    ValidPath(id): ValidPath<ArticleId>,
) -> ApiResult<Article> {
    Ok(ApiResponse::success(state.articles.comment(id).await?))
}

// Health

/// Detailed health check
pub async fn health_check_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResponse<HealthResponse> {
    ApiResponse::success(state.health_check().await)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> ApiResponse<()> {
    ApiResponse::ok()
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => {
            ApiResponse::success(health).into_response()
        }
        HealthStatus::Unhealthy => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            code::INTERNAL,
            "service not ready",
        ),
    }
}

pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

pub async fn fallback_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, code::NOT_FOUND, "route not found")
}
