//! The `{code, message, data}` response envelope and error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::domain::{AppError, AuthError, DatabaseError};

/// Envelope codes. `0` is success; 1xxx are generic, 2xxx are auth specific.
pub mod code {
    pub const SUCCESS: i32 = 0;
    pub const INVALID_PARAMS: i32 = 1001;
    pub const UNAUTHORIZED: i32 = 1002;
    pub const FORBIDDEN: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const INTERNAL: i32 = 1005;
    pub const CONFLICT: i32 = 1006;
    pub const TOO_MANY_REQUESTS: i32 = 1007;
    pub const TIMEOUT: i32 = 1008;
    pub const INVALID_CREDENTIALS: i32 = 2003;
    pub const TOKEN_EXPIRED: i32 = 2004;
    pub const TOKEN_INVALID: i32 = 2005;
    pub const USER_DISABLED: i32 = 2006;
}

pub const SUCCESS_MESSAGE: &str = "success";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: code::SUCCESS,
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload (`"data": null`).
    pub fn ok() -> Self {
        Self {
            code: code::SUCCESS,
            message: SUCCESS_MESSAGE.to_string(),
            data: None,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Builds an error envelope with the given HTTP status.
pub fn error_response(status: StatusCode, code: i32, message: impl Into<String>) -> Response {
    (status, ApiResponse::error(code, message)).into_response()
}

/// Envelope code for a bare HTTP status produced outside the handlers
/// (timeouts, method mismatch, body limits).
pub fn code_for_status(status: StatusCode) -> i32 {
    match status {
        StatusCode::UNAUTHORIZED => code::UNAUTHORIZED,
        StatusCode::FORBIDDEN => code::FORBIDDEN,
        StatusCode::NOT_FOUND => code::NOT_FOUND,
        StatusCode::CONFLICT => code::CONFLICT,
        StatusCode::TOO_MANY_REQUESTS => code::TOO_MANY_REQUESTS,
        StatusCode::REQUEST_TIMEOUT => code::TIMEOUT,
        s if s.is_client_error() => code::INVALID_PARAMS,
        _ => code::INTERNAL,
    }
}

fn auth_mapping(err: AuthError) -> (StatusCode, i32) {
    match err {
        AuthError::TokenMissing => (StatusCode::UNAUTHORIZED, code::UNAUTHORIZED),
        AuthError::TokenInvalid => (StatusCode::UNAUTHORIZED, code::TOKEN_INVALID),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, code::TOKEN_EXPIRED),
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, code::INVALID_CREDENTIALS),
        AuthError::UserDisabled => (StatusCode::FORBIDDEN, code::USER_DISABLED),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, code::INVALID_PARAMS, e.to_string()),
            AppError::Auth(e) => {
                let (status, code) = auth_mapping(*e);
                (status, code, e.to_string())
            }
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, code::FORBIDDEN, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, code::NOT_FOUND, format!("{m} not found")),
            AppError::Conflict(m) => (StatusCode::CONFLICT, code::CONFLICT, m.clone()),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                code::TOO_MANY_REQUESTS,
                "too many requests".to_string(),
            ),
            AppError::Database(db_err) => match db_err {
                DatabaseError::NotFound(_) | DatabaseError::ForeignKey(_) => (
                    StatusCode::NOT_FOUND,
                    code::NOT_FOUND,
                    "resource not found".to_string(),
                ),
                DatabaseError::Duplicate(_) => (
                    StatusCode::CONFLICT,
                    code::CONFLICT,
                    "resource already exists".to_string(),
                ),
                DatabaseError::PoolExhausted(_) | DatabaseError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    code::INTERNAL,
                    "service temporarily unavailable".to_string(),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    code::INTERNAL,
                    "internal server error".to_string(),
                ),
            },
            AppError::Cache(_)
            | AppError::Config(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                code::INTERNAL,
                "internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            // Details stay in the log; the client only sees the opaque message
            error!(error = %self, status = status.as_u16(), "Server error");
        } else if matches!(self, AppError::Database(_)) {
            warn!(error = %self, status = status.as_u16(), "Database constraint surfaced to client");
        }

        error_response(status, code, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CacheError, ValidationError};
    use http_body_util::BodyExt;

    async fn envelope(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let (status, body) = envelope(ApiResponse::success(vec![1, 2]).into_response()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["message"], "success");
        assert_eq!(body["data"], serde_json::json!([1, 2]));

        let (_, body) = envelope(ApiResponse::ok().into_response()).await;
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_error_mapping_table() {
        let cases: Vec<(AppError, StatusCode, i32)> = vec![
            (
                ValidationError::WeakPassword("x".into()).into(),
                StatusCode::BAD_REQUEST,
                1001,
            ),
            (AuthError::TokenMissing.into(), StatusCode::UNAUTHORIZED, 1002),
            (AuthError::TokenInvalid.into(), StatusCode::UNAUTHORIZED, 2005),
            (AuthError::TokenExpired.into(), StatusCode::UNAUTHORIZED, 2004),
            (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED, 2003),
            (AuthError::UserDisabled.into(), StatusCode::FORBIDDEN, 2006),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN, 1003),
            (AppError::NotFound("user 1".into()), StatusCode::NOT_FOUND, 1004),
            (
                DatabaseError::ForeignKey("fk".into()).into(),
                StatusCode::NOT_FOUND,
                1004,
            ),
            (AppError::Conflict("dup".into()), StatusCode::CONFLICT, 1006),
            (
                DatabaseError::Duplicate("users_username_key".into()).into(),
                StatusCode::CONFLICT,
                1006,
            ),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS, 1007),
            (
                DatabaseError::PoolExhausted("timed out".into()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
                1005,
            ),
            (
                CacheError::Timeout(500).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                1005,
            ),
        ];

        for (err, expected_status, expected_code) in cases {
            let label = format!("{err:?}");
            let (status, body) = envelope(err.into_response()).await;
            assert_eq!(status, expected_status, "{label}");
            assert_eq!(body["code"], expected_code, "{label}");
            assert!(body["data"].is_null());
        }
    }

    #[tokio::test]
    async fn test_server_errors_are_opaque() {
        let err = AppError::Database(DatabaseError::Query(
            "relation \"users\" does not exist".into(),
        ));
        let (_, body) = envelope(err.into_response()).await;
        assert_eq!(body["message"], "internal server error");
    }

    #[tokio::test]
    async fn test_auth_messages_are_public() {
        let (_, body) = envelope(AppError::from(AuthError::TokenMissing).into_response()).await;
        assert_eq!(body["message"], "token missing");
    }

    #[test]
    fn test_code_for_status() {
        assert_eq!(code_for_status(StatusCode::REQUEST_TIMEOUT), code::TIMEOUT);
        assert_eq!(code_for_status(StatusCode::METHOD_NOT_ALLOWED), code::INVALID_PARAMS);
        assert_eq!(code_for_status(StatusCode::BAD_GATEWAY), code::INTERNAL);
    }
}
