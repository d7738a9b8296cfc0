//! HTTP routing and the middleware stack.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, Response, StatusCode, header},
    middleware,
    routing::{MethodRouter, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, error, warn};

use super::handlers::{
    change_password_handler, comment_article_handler, create_article_handler,
    create_user_handler, delete_article_handler, delete_user_handler, fallback_handler,
    get_article_handler, get_user_by_username_handler, get_user_handler, health_check_handler,
    like_article_handler, list_articles_handler, list_users_handler, liveness_handler,
    login_handler, me_handler, metrics_handler, readiness_handler, register_handler,
    update_article_handler, update_user_handler,
};
use super::middleware::{auth_middleware, envelope_bare_errors, security_headers, track_metrics};
use super::rate_limit::{RateLimitState, rate_limit_middleware};
use super::response::{code, error_response};
use crate::app::AppState;
use crate::infra::observability::PrometheusHandle;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Router-level options that aren't part of the application state.
#[derive(Clone)]
pub struct RouterConfig {
    pub request_timeout: Duration,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
    /// `None` disables rate limiting
    pub rate_limit: Option<Arc<RateLimitState>>,
    /// `None` leaves `/metrics` unrouted
    pub metrics: Option<PrometheusHandle>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            cors_allowed_origins: Vec::new(),
            rate_limit: None,
            metrics: None,
        }
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!(panic = %detail, "Request handler panicked");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        code::INTERNAL,
        "internal server error",
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            header::HeaderName::from_static(REQUEST_ID_HEADER),
            header::RETRY_AFTER,
        ])
        .max_age(Duration::from_secs(12 * 3600));

    if origins.is_empty() {
        return base.allow_origin(AnyOrigin);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Builds the application router.
///
/// Health and metrics routes sit outside the rate limiter; protected
/// routes additionally pass through bearer token authentication.
pub fn create_router(app_state: Arc<AppState>, config: RouterConfig) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/users", get(list_users_handler))
        .route("/users/{id}", get(get_user_handler))
        .route(
            "/users/username/{username}",
            get(get_user_by_username_handler),
        )
        .route("/articles", get(list_articles_handler))
        .route("/articles/{id}", get(get_article_handler));

    // Per-route layering keeps the 405 fallback of shared paths unauthenticated
    let auth = |route: MethodRouter<Arc<AppState>>| {
        route.route_layer(middleware::from_fn_with_state(
            Arc::clone(&app_state),
            auth_middleware,
        ))
    };
    let protected_routes = Router::new()
        .route("/auth/me", auth(get(me_handler)))
        .route("/users", auth(post(create_user_handler)))
        .route(
            "/users/{id}",
            auth(put(update_user_handler).delete(delete_user_handler)),
        )
        .route(
            "/users/change-password",
            auth(post(change_password_handler)),
        )
        .route("/articles", auth(post(create_article_handler)))
        .route(
            "/articles/{id}",
            auth(put(update_article_handler).delete(delete_article_handler)),
        )
        .route("/articles/{id}/like", auth(post(like_article_handler)))
        .route(
            "/articles/{id}/comment",
            auth(post(comment_article_handler)),
        );

    let mut api_routes = public_routes.merge(protected_routes);
    if let Some(limiter) = config.rate_limit.clone() {
        api_routes = api_routes.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    let health_routes = Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler));

    let mut router = Router::new()
        .merge(api_routes)
        .nest("/health", health_routes)
        .with_state(app_state);

    if let Some(handle) = config.metrics.clone() {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    let stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(middleware::from_fn(track_metrics))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(envelope_bare_errors))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(middleware::from_fn(security_headers));

    router.fallback(fallback_handler).layer(stack)
}
