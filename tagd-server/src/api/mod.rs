//! HTTP API handlers for tagd-server

pub mod admin;
pub mod albums;
pub mod audio;
pub mod auth;
pub mod background;
pub mod extract;
pub mod files;
pub mod form;
pub mod health;
pub mod people;
pub mod photos;
pub mod vignettes;

use axum::{
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;

use crate::AppState;

pub use extract::{can_read, owner_filter, AdminUser, CurrentUser};
pub use form::{UploadForm, UploadedFile};
pub use health::health_routes;

/// `{"message": ...}` body returned by mutations without a resource
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn message(text: impl Into<String>) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.into(),
    })
}

/// All `/api` routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::routes())
        .merge(vignettes::routes())
        .merge(photos::routes())
        .merge(people::routes())
        .merge(albums::routes())
        .merge(audio::routes())
        .merge(files::routes())
        .merge(background::routes())
        .merge(admin::routes())
}

/// Raw bytes with a content type
pub(crate) fn bytes_response(data: Vec<u8>, content_type: &str) -> Response {
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    ([(header::CONTENT_TYPE, content_type)], data).into_response()
}

/// Raw bytes with extra headers
pub(crate) fn bytes_response_with_headers(
    data: Vec<u8>,
    content_type: &str,
    extra: &[(HeaderName, &str)],
) -> Response {
    let mut response = bytes_response(data, content_type);
    for (name, value) in extra {
        if let Ok(value) = HeaderValue::from_str(value) {
            response.headers_mut().insert(name.clone(), value);
        }
    }
    response
}
