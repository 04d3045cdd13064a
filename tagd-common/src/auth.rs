//! Password hashing and session tokens
//!
//! # Architecture
//!
//! - Passwords are stored as bcrypt hashes. bcrypt only looks at the first
//!   72 bytes of input, so passwords are truncated explicitly before hashing
//!   and before verification.
//! - Sessions are HS256 JWTs whose subject is the username.
//! - The signing secret comes from configuration or, when absent, is
//!   generated once and stored in the `settings` table.
//!
//! Only pure functions and database operations live here; the HTTP layer
//! wraps them in extractors.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

/// bcrypt ignores input past this many bytes
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

/// Shortest password accepted for new accounts and password changes
pub const MIN_PASSWORD_LEN: usize = 4;

/// Settings key holding the generated JWT secret
pub const JWT_SECRET_SETTING: &str = "jwt_secret";

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token could not be decoded, failed signature check, or expired
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token decoded but carries no subject
    #[error("Token has no subject")]
    MissingSubject,

    /// Password does not satisfy the policy
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters long")]
    WeakPassword,

    /// bcrypt failure while hashing
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    /// Token encoding failure
    #[error("Token encoding failed: {0}")]
    Encoding(String),

    /// Database error loading or storing the signing secret
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Username
    pub sub: String,
    /// Expiry (seconds since Unix epoch)
    pub exp: i64,
}

// ========================================
// Passwords
// ========================================

fn truncated(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(BCRYPT_MAX_PASSWORD_BYTES)]
}

/// Hash a password with a fresh salt
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(truncated(password), cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored bcrypt hash
///
/// Malformed hashes verify as `false`.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    match bcrypt::verify(truncated(password), hashed) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!("Password verification error: {}", e);
            false
        }
    }
}

/// Enforce the minimum password length
pub fn validate_new_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

// ========================================
// Tokens
// ========================================

/// Issue a signed access token for `subject`, valid for `ttl`
pub fn issue_token(secret: &str, subject: &str, ttl: Duration) -> Result<String, AuthError> {
    let claims = Claims {
        sub: subject.to_string(),
        exp: crate::time::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Encoding("token lifetime out of range".to_string()))?
            .timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Encoding(e.to_string()))
}

/// Decode and validate an access token
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    if data.claims.sub.is_empty() {
        return Err(AuthError::MissingSubject);
    }

    Ok(data.claims)
}

// ========================================
// Random codes
// ========================================

fn random_urlsafe(num_bytes: usize) -> String {
    let mut buf = vec![0u8; num_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Invite code: 16 random bytes, URL-safe base64 (22 characters)
pub fn generate_invite_code() -> String {
    random_urlsafe(16)
}

/// Password reset token
pub fn generate_reset_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ========================================
// Signing secret
// ========================================

/// Load the JWT signing secret from `settings`, generating it on first use
pub async fn load_or_init_jwt_secret(db: &SqlitePool) -> Result<String, AuthError> {
    let existing: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(JWT_SECRET_SETTING)
            .fetch_optional(db)
            .await?;

    if let Some(secret) = existing.filter(|s| !s.is_empty()) {
        return Ok(secret);
    }

    let secret = random_urlsafe(32);
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(JWT_SECRET_SETTING)
        .bind(&secret)
        .execute(db)
        .await?;

    tracing::info!("Generated new JWT signing secret");
    Ok(secret)
}
