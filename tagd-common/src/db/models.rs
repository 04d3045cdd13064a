//! Database models
//!
//! One struct per table, decoded with `sqlx::FromRow`. Serialized field names
//! are the JSON names the web frontend reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full `users` row, including credentials
///
/// Never serialize this directly into a response; use [`User`].
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub reset_token: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            email: record.email,
            full_name: record.full_name,
            is_active: record.is_active,
            is_admin: record.is_admin,
            created_at: record.created_at,
        }
    }
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        record.clone().into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InviteCode {
    pub id: i64,
    pub code: String,
    pub email: Option<String>,
    pub created_by_id: Option<i64>,
    pub used_by_id: Option<i64>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl InviteCode {
    /// True once `expires_at` has passed; codes without an expiry never expire
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|t| t < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Vignette {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Photo {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploaded_by_id: i64,
    pub taken_at: Option<DateTime<Utc>>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_by_id: i64,
    pub background_filename: Option<String>,
    pub background_path: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AudioRecording {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author_id: i64,
    pub duration_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Row of the `files` table (generic uploads)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StoredFile {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_type: Option<String>,
    pub source: String,
    pub uploaded_by_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackgroundImage {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub uploaded_by_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
