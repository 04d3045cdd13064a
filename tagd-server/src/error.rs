//! Error types for tagd-server
//!
//! Every handler returns [`ApiResult`]. Errors render as
//! `{"detail": <message>, "code": <CODE>}`, the shape the web frontend
//! displays.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tagd_common::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::media::MediaError;
use crate::storage::StorageError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or invalid credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Request body over the configured limit (413)
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Media processing error
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Password/token error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// tagd-common error
    #[error(transparent)]
    Common(#[from] tagd_common::Error),
}

impl ApiError {
    /// Shorthand for the common 404 case
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Database(err) => {
                error!("Database error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            ApiError::Storage(StorageError::NotFound(_)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "File not found on disk".to_string(),
            ),
            ApiError::Storage(err) => {
                error!("Storage error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    err.to_string(),
                )
            }
            ApiError::Media(err) => (StatusCode::BAD_REQUEST, "MEDIA_ERROR", err.to_string()),
            ApiError::Auth(err) => match err {
                AuthError::WeakPassword => (
                    StatusCode::BAD_REQUEST,
                    "BAD_REQUEST",
                    AuthError::WeakPassword.to_string(),
                ),
                AuthError::InvalidToken(_) | AuthError::MissingSubject => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Could not validate credentials".to_string(),
                ),
                other => {
                    error!("Auth error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "AUTH_ERROR",
                        other.to_string(),
                    )
                }
            },
            ApiError::Common(err) => match err {
                tagd_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                tagd_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
                }
                other => {
                    error!("Internal error: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "COMMON_ERROR",
                        "Internal server error".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = Json(json!({
            "detail": message,
            "code": error_code,
        }));

        if status == StatusCode::UNAUTHORIZED {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized("Not authenticated".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("Photo").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Storage(StorageError::NotFound("gone".into()))
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Auth(AuthError::WeakPassword).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Auth(AuthError::MissingSubject)
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Common(tagd_common::Error::InvalidInput("bad".into()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_message() {
        match ApiError::not_found("Album") {
            ApiError::NotFound(msg) => assert_eq!(msg, "Album not found"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
