//! Generic file endpoints
//!
//! Files carry a `source` saying which page they were uploaded from, so the
//! Files page and vignette attachments can be listed separately.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tagd_common::db::StoredFile;
use tagd_common::time::parse_client_datetime;
use tracing::{info, warn};

use super::{
    bytes_response_with_headers, can_read, message, owner_filter, AdminUser, CurrentUser,
    MessageResponse, UploadForm,
};
use crate::db::files::{self, FileChanges, NewFile, SOURCE_FILES};
use crate::error::{ApiError, ApiResult};
use crate::media;
use crate::storage::FILES_FOLDER;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilePatchRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

fn check_source(source: &str) -> ApiResult<()> {
    if files::is_valid_source(source) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid source '{}': expected 'files' or 'vignettes'",
            source
        )))
    }
}

/// Download name: the title when set, else the stored file name
fn download_name(file: &StoredFile) -> String {
    let name = file
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(&file.filename);
    // Keep the header value well-formed
    name.chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}

/// POST /api/files
///
/// Multipart: `file`, optional `title`, `description` and `source`.
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut form: UploadForm,
) -> ApiResult<Json<StoredFile>> {
    let source = form.text("source").unwrap_or(SOURCE_FILES).to_string();
    check_source(&source)?;

    let file = form.require_file()?;
    let original_name = file
        .file_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "file".to_string());
    let filename = media::unique_filename(&media::file_extension(&original_name));

    let file_type = file
        .content_type
        .clone()
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
        .unwrap_or_else(|| media::sniff_mime(&file.data, media::mime_from_filename(&original_name)));

    let location = state
        .store
        .put(FILES_FOLDER, &filename, &file.data, Some(&file_type))
        .await?;

    let title = form.text_owned("title").unwrap_or(original_name);
    let new_file = NewFile {
        filename: &filename,
        file_path: &location,
        title: Some(&title),
        description: form.text("description"),
        file_type: Some(&file_type),
        source: &source,
        uploaded_by_id: user.id,
    };

    let stored = match files::insert(&state.db, &new_file).await {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(cleanup) = state.store.delete(&location).await {
                warn!("Could not remove orphaned upload {}: {}", location, cleanup);
            }
            return Err(e.into());
        }
    };

    info!(
        "File {} uploaded by '{}' ({}, source {})",
        stored.id, user.username, file_type, source
    );
    Ok(Json(stored))
}

/// GET /api/files?source=
pub async fn list_files(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<FileListQuery>,
) -> ApiResult<Json<Vec<StoredFile>>> {
    let source = query.source.as_deref().filter(|s| !s.is_empty());
    if let Some(source) = source {
        check_source(source)?;
    }
    Ok(Json(files::list(&state.db, source, owner_filter(&user)).await?))
}

/// GET /api/files/:id
///
/// Served as an attachment named after the file's title.
pub async fn download_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let file = files::get(&state.db, id)
        .await?
        .filter(|file| can_read(&user, file.uploaded_by_id))
        .ok_or_else(|| ApiError::not_found("File"))?;

    // A lost stored file surfaces as 404 "File not found on disk"
    let data = state.store.read(&file.file_path).await?;

    let content_type = file
        .file_type
        .clone()
        .unwrap_or_else(|| media::sniff_mime(&data, media::mime_from_filename(&file.filename)));
    let disposition = format!("attachment; filename=\"{}\"", download_name(&file));

    Ok(bytes_response_with_headers(
        data,
        &content_type,
        &[(header::CONTENT_DISPOSITION, disposition.as_str())],
    ))
}

async fn apply_changes(state: &AppState, id: i64, changes: FileChanges) -> ApiResult<StoredFile> {
    files::update(&state.db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))
}

/// PUT /api/files/:id (admin)
///
/// Form fields `title` and `description`.
pub async fn update_file(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    form: UploadForm,
) -> ApiResult<Json<StoredFile>> {
    let changes = FileChanges {
        title: form.text_owned("title"),
        description: form.text_owned("description"),
        created_at: None,
    };
    let file = apply_changes(&state, id, changes).await?;

    info!("File {} updated by admin '{}'", id, admin.username);
    Ok(Json(file))
}

/// PATCH /api/files/:id (admin)
pub async fn patch_file(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<FilePatchRequest>,
) -> ApiResult<Json<StoredFile>> {
    let created_at = match request.created_at.as_deref() {
        Some(raw) => Some(
            parse_client_datetime(raw)
                .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))?,
        ),
        None => None,
    };

    let changes = FileChanges {
        title: request.title,
        description: request.description,
        created_at,
    };
    let file = apply_changes(&state, id, changes).await?;

    info!("File {} patched by admin '{}'", id, admin.username);
    Ok(Json(file))
}

/// DELETE /api/files/:id (admin)
pub async fn delete_file(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let file = files::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))?;

    if let Err(e) = state.store.delete(&file.file_path).await {
        warn!("Could not delete stored file {}: {}", file.file_path, e);
    }

    files::delete(&state.db, id).await?;
    info!("File {} deleted by admin '{}'", id, admin.username);
    Ok(message("File deleted successfully"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/files", get(list_files).post(upload_file))
        .route(
            "/api/files/:id",
            get(download_file)
                .put(update_file)
                .patch(patch_file)
                .delete(delete_file),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stored(title: Option<&str>) -> StoredFile {
        StoredFile {
            id: 1,
            filename: "abc.pdf".to_string(),
            file_path: "/tmp/abc.pdf".to_string(),
            title: title.map(str::to_string),
            description: None,
            file_type: Some("application/pdf".to_string()),
            source: SOURCE_FILES.to_string(),
            uploaded_by_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_download_name_prefers_title() {
        assert_eq!(download_name(&stored(Some("Recipe book"))), "Recipe book");
        assert_eq!(download_name(&stored(None)), "abc.pdf");
        assert_eq!(download_name(&stored(Some("  "))), "abc.pdf");
    }

    #[test]
    fn test_download_name_strips_quotes() {
        assert_eq!(download_name(&stored(Some("say \"hi\""))), "say hi");
    }

    #[test]
    fn test_check_source() {
        assert!(check_source("files").is_ok());
        assert!(check_source("vignettes").is_ok());
        assert!(matches!(check_source("photos"), Err(ApiError::BadRequest(_))));
    }
}
