//! Administration endpoints: invite codes, accounts, file source repair

use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tagd_common::auth::generate_invite_code;
use tagd_common::db::{InviteCode, StoredFile, User};
use tracing::{info, warn};

use super::{message, AdminUser, MessageResponse, UploadForm};
use crate::db::files::{SOURCE_FILES, SOURCE_VIGNETTES};
use crate::db::invites::{self, InviteCodeWithUser};
use crate::db::{albums, audio, files, photos, users};
use crate::error::{ApiError, ApiResult};
use crate::storage::FileStore;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InviteCodeRequest {
    pub email: Option<String>,
    pub expires_in_days: Option<i64>,
    #[serde(default)]
    pub send_email: bool,
    pub recipient_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MistaggedFiles {
    pub files: Vec<StoredFile>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct FixSourcesResponse {
    pub message: String,
    pub fixed: u64,
}

/// POST /api/admin/invite-codes
///
/// E-mail delivery is not wired up; a requested send is only logged.
pub async fn create_invite_code(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<InviteCodeRequest>,
) -> ApiResult<Json<InviteCode>> {
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let expires_at = match request.expires_in_days {
        Some(days) if days > 0 => Some(tagd_common::time::days_from_now(days).ok_or_else(|| {
            ApiError::BadRequest("expires_in_days is out of range".to_string())
        })?),
        Some(_) => {
            return Err(ApiError::BadRequest(
                "expires_in_days must be positive".to_string(),
            ))
        }
        None => None,
    };

    let code = generate_invite_code();
    let invite = invites::create(&state.db, &code, email, admin.id, expires_at).await?;
    info!("Invite code {} created by admin '{}'", invite.id, admin.username);

    if let (true, Some(email)) = (request.send_email, email) {
        warn!(
            "Invite e-mail for {} ({}) not sent: no mail transport configured",
            email,
            request.recipient_name.as_deref().unwrap_or("no name")
        );
    }

    Ok(Json(invite))
}

/// GET /api/admin/invite-codes
pub async fn list_invite_codes(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<InviteCodeWithUser>>> {
    Ok(Json(invites::list_with_users(&state.db).await?))
}

/// DELETE /api/admin/invite-codes/:id
pub async fn delete_invite_code(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if !invites::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Invite code"));
    }
    info!("Invite code {} deleted by admin '{}'", id, admin.username);
    Ok(message("Invite code deleted"))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<Vec<User>>> {
    let users = users::list(&state.db).await?;
    Ok(Json(users.into_iter().map(User::from).collect()))
}

/// Remove everything a user stored; database rows are left to cascade
///
/// Returns how many stored objects were deleted.
pub async fn remove_user_media(
    db: &sqlx::SqlitePool,
    store: &dyn FileStore,
    user_id: i64,
) -> ApiResult<usize> {
    let mut locations: Vec<String> = Vec::new();
    locations.extend(photos::list_by_uploader(db, user_id).await?.into_iter().map(|p| p.file_path));
    locations.extend(audio::list_by_author(db, user_id).await?.into_iter().map(|a| a.file_path));
    locations.extend(files::list_by_uploader(db, user_id).await?.into_iter().map(|f| f.file_path));
    locations.extend(
        albums::list_by_creator(db, user_id)
            .await?
            .into_iter()
            .filter_map(|a| a.background_path),
    );

    let mut removed = 0;
    for location in &locations {
        match store.delete(location).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!("Could not delete stored media {}: {}", location, e),
        }
    }
    Ok(removed)
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    if id == admin.id {
        return Err(ApiError::BadRequest(
            "Cannot delete your own account".to_string(),
        ));
    }

    let user = users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    let removed = remove_user_media(&state.db, state.store.as_ref(), id).await?;
    users::delete(&state.db, id).await?;

    info!(
        "User '{}' deleted by admin '{}' ({} stored files removed)",
        user.username, admin.username, removed
    );
    Ok(message("User deleted successfully"))
}

/// PATCH /api/admin/users/:id/username
///
/// Form field `new_username`.
pub async fn update_username(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
    form: UploadForm,
) -> ApiResult<Json<User>> {
    let new_username = form
        .text("new_username")
        .map(str::trim)
        .ok_or_else(|| ApiError::BadRequest("Username cannot be empty".to_string()))?;

    let user = users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if let Some(existing) = users::find_by_username(&state.db, new_username).await? {
        if existing.id != id {
            return Err(ApiError::BadRequest("Username already taken".to_string()));
        }
    }

    users::update_username(&state.db, id, new_username).await?;
    info!(
        "Username '{}' changed to '{}' by admin '{}'",
        user.username, new_username, admin.username
    );

    let updated = users::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(updated.into()))
}

/// GET /api/admin/mistagged-files
///
/// Files tagged as vignette attachments, candidates for moving to the
/// Files page.
pub async fn mistagged_files(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<MistaggedFiles>> {
    let files = files::list(&state.db, Some(SOURCE_VIGNETTES), None).await?;
    Ok(Json(MistaggedFiles {
        count: files.len(),
        files,
    }))
}

/// POST /api/admin/fix-file-sources
pub async fn fix_file_sources(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<Json<FixSourcesResponse>> {
    let fixed = files::retag_source(&state.db, SOURCE_VIGNETTES, SOURCE_FILES).await?;
    info!("{} file(s) retagged by admin '{}'", fixed, admin.username);

    Ok(Json(FixSourcesResponse {
        message: format!("Moved {} file(s) to the Files page", fixed),
        fixed,
    }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/invite-codes",
            get(list_invite_codes).post(create_invite_code),
        )
        .route("/api/admin/invite-codes/:id", delete(delete_invite_code))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", delete(delete_user))
        .route("/api/admin/users/:id/username", patch(update_username))
        .route("/api/admin/mistagged-files", get(mistagged_files))
        .route("/api/admin/fix-file-sources", post(fix_file_sources))
}
