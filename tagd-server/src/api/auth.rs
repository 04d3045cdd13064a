//! Account endpoints: registration, login, password management

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tagd_common::auth::{
    generate_reset_token, hash_password, issue_token, validate_new_password, verify_password,
};
use tagd_common::db::{InviteCode, User};
use tracing::{info, warn};

use super::{message, CurrentUser, MessageResponse, UploadForm};
use crate::db::{invites, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Same answer whether or not the address is known
const RESET_REQUEST_MESSAGE: &str =
    "If an account exists with this email, a reset link has been sent.";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub full_name: Option<String>,
    pub invite_code: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetRequestResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// bcrypt off the async workers
pub(crate) async fn hash_blocking(password: String, cost: u32) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(ApiError::from)
}

pub(crate) async fn verify_blocking(password: String, hashed: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
        .await
        .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid_invite() -> ApiError {
    ApiError::BadRequest("Invalid or already used invite code".to_string())
}

fn already_registered() -> ApiError {
    ApiError::BadRequest("Username or email already registered".to_string())
}

/// Check that an invite can be redeemed by `email`
fn check_invite(invite: Option<InviteCode>, email: Option<&str>) -> ApiResult<InviteCode> {
    let invite = invite
        .filter(|invite| !invite.is_used)
        .ok_or_else(invalid_invite)?;

    if invite.is_expired(tagd_common::time::now()) {
        return Err(ApiError::BadRequest("Invite code has expired".to_string()));
    }

    if let Some(restricted_to) = &invite.email {
        if !email.is_some_and(|e| e.eq_ignore_ascii_case(restricted_to)) {
            return Err(ApiError::BadRequest(
                "This invite code is restricted to a specific email address".to_string(),
            ));
        }
    }

    Ok(invite)
}

/// POST /api/auth/register
///
/// Creates an account from an unused invite code. The invite is checked
/// before the password is hashed, then again inside the transaction that
/// inserts the account and redeems it.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required".to_string()));
    }
    let email = non_blank(request.email);
    let full_name = non_blank(request.full_name);
    let code = request.invite_code.trim();
    validate_new_password(&request.password)?;

    {
        let mut conn = state.db.acquire().await?;
        check_invite(invites::find_by_code(&mut conn, code).await?, email.as_deref())?;
    }

    let hashed = hash_blocking(request.password, state.config.auth.bcrypt_cost).await?;

    let mut tx = state.db.begin().await?;

    let invite = check_invite(invites::find_by_code(&mut tx, code).await?, email.as_deref())?;

    let email_taken = match &email {
        Some(email) => users::email_exists(&mut tx, email).await?,
        None => false,
    };
    if email_taken || users::username_exists(&mut tx, &username).await? {
        return Err(already_registered());
    }

    let inserted = users::insert(
        &mut tx,
        &users::NewUser {
            username: &username,
            email: email.as_deref(),
            hashed_password: &hashed,
            full_name: full_name.as_deref(),
            is_admin: false,
        },
    )
    .await;
    let user_id = match inserted {
        Ok(id) => id,
        // Lost a race with a concurrent registration
        Err(e) if users::is_unique_violation(&e) => return Err(already_registered()),
        Err(e) => return Err(e.into()),
    };

    if !invites::mark_used(&mut tx, invite.id, user_id).await? {
        return Err(invalid_invite());
    }

    tx.commit().await?;
    info!("Registered user '{}' with invite {}", username, invite.id);

    let user = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Internal("Registered user vanished".to_string()))?;
    Ok(Json(user.into()))
}

/// POST /api/auth/login
///
/// Form fields `username` and `password` (urlencoded or multipart).
pub async fn login(
    State(state): State<AppState>,
    form: UploadForm,
) -> ApiResult<Json<LoginResponse>> {
    let (Some(username), Some(password)) = (form.text("username"), form.text("password")) else {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    };

    let invalid = || ApiError::Unauthorized("Incorrect username or password".to_string());

    let Some(user) = users::find_by_username(&state.db, username).await? else {
        warn!("Login failed: unknown username '{}'", username);
        return Err(invalid());
    };

    if !verify_blocking(password.to_string(), user.hashed_password.clone()).await? {
        warn!("Login failed: wrong password for '{}'", username);
        return Err(invalid());
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("Inactive user".to_string()));
    }

    let ttl = Duration::try_minutes(state.config.auth.access_token_expire_minutes)
        .ok_or_else(|| ApiError::Internal("Access token lifetime out of range".to_string()))?;
    let access_token = issue_token(&state.jwt_secret, &user.username, ttl)?;

    info!("Login succeeded for '{}'", user.username);
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user.into(),
    }))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user.into())
}

/// POST /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !verify_blocking(request.current_password, user.hashed_password.clone()).await? {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }
    validate_new_password(&request.new_password)?;

    let hashed = hash_blocking(request.new_password, state.config.auth.bcrypt_cost).await?;
    users::update_password(&state.db, user.id, &hashed).await?;

    info!("Password changed for '{}'", user.username);
    Ok(message("Password changed successfully"))
}

/// POST /api/auth/password-reset-request
///
/// Stores a reset token for the account with this email, if any. The
/// response never reveals whether the address exists.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> ApiResult<Json<PasswordResetRequestResponse>> {
    let mut token = None;

    if let Some(user) = users::find_by_email(&state.db, request.email.trim()).await? {
        let reset_token = generate_reset_token();
        let expires = tagd_common::time::minutes_from_now(state.config.auth.reset_token_ttl_minutes)
            .ok_or_else(|| ApiError::Internal("Reset token lifetime out of range".to_string()))?;
        users::set_reset_token(&state.db, user.id, Some(&reset_token), Some(expires)).await?;
        info!("Password reset requested for '{}'", user.username);
        token = Some(reset_token);
    }

    Ok(Json(PasswordResetRequestResponse {
        message: RESET_REQUEST_MESSAGE.to_string(),
        token: token.filter(|_| state.config.auth.expose_reset_token),
    }))
}

/// POST /api/auth/password-reset
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<PasswordReset>,
) -> ApiResult<Json<MessageResponse>> {
    let user = users::find_by_reset_token(&state.db, request.token.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    let expired = user
        .reset_token_expires
        .is_some_and(|expires| expires < tagd_common::time::now());
    if expired {
        users::set_reset_token(&state.db, user.id, None, None).await?;
        return Err(ApiError::BadRequest("Reset token has expired".to_string()));
    }

    validate_new_password(&request.new_password)?;
    let hashed = hash_blocking(request.new_password, state.config.auth.bcrypt_cost).await?;
    users::update_password(&state.db, user.id, &hashed).await?;

    info!("Password reset completed for '{}'", user.username);
    Ok(message("Password has been reset successfully"))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/password-reset-request", post(request_password_reset))
        .route("/api/auth/password-reset", post(reset_password))
}
