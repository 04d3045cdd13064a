//! Maintenance operations behind the `tagd-admin` CLI
//!
//! These run directly against the database (and storage, for file checks)
//! without going through HTTP, so they work while the server is down.

use anyhow::{bail, Context, Result};
use sqlx::SqlitePool;
use tagd_common::auth::{hash_password, validate_new_password};
use tagd_common::db::{Photo, StoredFile, User};
use tracing::{info, warn};

use crate::db::files::{SOURCE_FILES, SOURCE_VIGNETTES};
use crate::db::{files, photos, users};
use crate::storage::FileStore;

/// Account details for [`create_user`]
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

/// Result of [`check_photos`]
#[derive(Debug, Default)]
pub struct PhotoReport {
    pub total: i64,
    /// Photos whose uploader no longer exists
    pub orphaned: Vec<Photo>,
    /// Photos whose stored file is gone
    pub missing_files: Vec<Photo>,
}

impl PhotoReport {
    pub fn is_healthy(&self) -> bool {
        self.orphaned.is_empty() && self.missing_files.is_empty()
    }
}

/// Result of [`file_sources`]
#[derive(Debug, Default)]
pub struct FileSourceReport {
    /// Files tagged as vignette attachments (before any fix)
    pub mistagged: Vec<StoredFile>,
    /// Rows retagged; zero unless fixing
    pub fixed: u64,
}

async fn hash(password: String, cost: u32) -> Result<String> {
    let hashed = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .context("Hashing task failed")??;
    Ok(hashed)
}

/// Create an account, bypassing invite codes
pub async fn create_user(pool: &SqlitePool, account: &NewAccount, bcrypt_cost: u32) -> Result<User> {
    let username = account.username.trim();
    if username.is_empty() {
        bail!("Username is required");
    }
    validate_new_password(&account.password)?;

    let mut conn = pool.acquire().await?;
    if users::username_exists(&mut conn, username).await? {
        bail!("User '{}' already exists", username);
    }
    if let Some(email) = account.email.as_deref() {
        if users::email_exists(&mut conn, email).await? {
            bail!("Email '{}' is already registered", email);
        }
    }

    let hashed = hash(account.password.clone(), bcrypt_cost).await?;
    let id = users::insert(
        &mut conn,
        &users::NewUser {
            username,
            email: account.email.as_deref(),
            hashed_password: &hashed,
            full_name: account.full_name.as_deref(),
            is_admin: account.is_admin,
        },
    )
    .await?;
    drop(conn);

    info!("Created user '{}' (admin: {})", username, account.is_admin);
    let user = users::find_by_id(pool, id)
        .await?
        .with_context(|| format!("User {} missing after insert", id))?;
    Ok(user.into())
}

/// Set a new password for `username`
pub async fn reset_password(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<()> {
    validate_new_password(password)?;
    let Some(user) = users::find_by_username(pool, username).await? else {
        bail!("User '{}' not found", username);
    };

    let hashed = hash(password.to_string(), bcrypt_cost).await?;
    users::update_password(pool, user.id, &hashed).await?;
    info!("Password reset for '{}'", username);
    Ok(())
}

/// All accounts, newest first
pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let users = users::list(pool).await?;
    Ok(users.into_iter().map(User::from).collect())
}

/// Count photos and find rows with a missing uploader or stored file
pub async fn check_photos(pool: &SqlitePool, store: &dyn FileStore) -> Result<PhotoReport> {
    let mut report = PhotoReport {
        total: photos::count(pool).await?,
        orphaned: photos::list_orphaned(pool).await?,
        ..Default::default()
    };

    for photo in photos::list_all(pool).await? {
        let present = match store.exists(&photo.file_path).await {
            Ok(present) => present,
            Err(e) => {
                warn!("Photo {}: cannot check {}: {}", photo.id, photo.file_path, e);
                false
            }
        };
        if !present {
            report.missing_files.push(photo);
        }
    }
    Ok(report)
}

/// Report files tagged as vignette attachments; retag them when `fix`
pub async fn file_sources(pool: &SqlitePool, fix: bool) -> Result<FileSourceReport> {
    let mistagged = files::list(pool, Some(SOURCE_VIGNETTES), None).await?;
    let fixed = if fix && !mistagged.is_empty() {
        files::retag_source(pool, SOURCE_VIGNETTES, SOURCE_FILES).await?
    } else {
        0
    };

    if fixed > 0 {
        info!("Retagged {} file(s) from '{}' to '{}'", fixed, SOURCE_VIGNETTES, SOURCE_FILES);
    }
    Ok(FileSourceReport { mistagged, fixed })
}
