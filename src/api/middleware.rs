//! HTTP middleware for API layer.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, Response, header},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::response::{code_for_status, error_response};
use crate::app::AppState;
use crate::domain::{AppError, AuthError};
use crate::infra::observability::record_http_request;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("x-xss-protection", "1; mode=block"),
    ("content-security-policy", "default-src 'self'"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    (
        "permissions-policy",
        "geolocation=(), microphone=(), camera=()",
    ),
];

/// Extracts the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::TokenMissing)?
        .to_str()
        .map_err(|_| AuthError::TokenInvalid)?
        .trim();
    if value.is_empty() {
        return Err(AuthError::TokenMissing);
    }

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::TokenInvalid)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::TokenInvalid);
    }
    Ok(token)
}

/// Bearer token authentication for protected routes.
///
/// On success the verified [`AuthUser`](crate::domain::AuthUser) is stored
/// in the request extensions for handlers to extract.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response<Body>, AppError> {
    let user = bearer_token(request.headers())
        .and_then(|token| state.tokens.verify(token))
        .map_err(|e| {
            warn!(reason = %e, path = %request.uri().path(), "Authentication failed");
            AppError::Auth(e)
        })?;

    debug!(user_id = user.user_id, "Request authenticated");
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for &(name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

/// Counts requests and records latency, labelled by the matched route
/// template so IDs don't explode label cardinality.
pub async fn track_metrics(request: Request<Body>, next: Next) -> Response<Body> {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_http_request(&method, &route, response.status().as_u16(), start.elapsed());
    response
}

/// Wraps body-less error responses produced by tower layers (timeouts,
/// method mismatch) in the envelope.
pub async fn envelope_bare_errors(request: Request<Body>, next: Next) -> Response<Body> {
    let response = next.run(request).await;
    let status = response.status();
    let is_error = status.is_client_error() || status.is_server_error();
    if !is_error || response.headers().contains_key(header::CONTENT_TYPE) {
        return response;
    }

    let reason = status.canonical_reason().unwrap_or("error").to_lowercase();
    let mut wrapped = error_response(status, code_for_status(status), reason);
    // Keep headers set by inner layers such as Allow or Retry-After
    for (name, value) in response.headers() {
        if *name != header::CONTENT_LENGTH {
            wrapped.headers_mut().entry(name).or_insert(value.clone());
        }
    }
    wrapped.into_response()
}
