//! Invite code persistence

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tagd_common::db::InviteCode;
use tagd_common::Result;

const INVITE_COLUMNS: &str =
    "id, code, email, created_by_id, used_by_id, is_used, created_at, used_at, expires_at";

/// Invite code joined with the account that redeemed it
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InviteCodeWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub invite: InviteCode,
    pub used_by_username: Option<String>,
    pub used_by_email: Option<String>,
    pub used_by_full_name: Option<String>,
}

pub async fn create(
    pool: &SqlitePool,
    code: &str,
    email: Option<&str>,
    created_by_id: i64,
    expires_at: Option<DateTime<Utc>>,
) -> Result<InviteCode> {
    let invite = sqlx::query_as::<_, InviteCode>(&format!(
        r#"
        INSERT INTO invite_codes (code, email, created_by_id, is_used, created_at, expires_at)
        VALUES (?, ?, ?, 0, ?, ?)
        RETURNING {}
        "#,
        INVITE_COLUMNS
    ))
    .bind(code)
    .bind(email)
    .bind(created_by_id)
    .bind(tagd_common::time::now())
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(invite)
}

pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> Result<Option<InviteCode>> {
    let invite = sqlx::query_as::<_, InviteCode>(&format!(
        "SELECT {} FROM invite_codes WHERE code = ?",
        INVITE_COLUMNS
    ))
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(invite)
}

/// Mark an unused invite as redeemed by `user_id`
///
/// Returns false when the invite was already used.
pub async fn mark_used(conn: &mut SqliteConnection, id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE invite_codes SET is_used = 1, used_by_id = ?, used_at = ? WHERE id = ? AND is_used = 0",
    )
    .bind(user_id)
    .bind(tagd_common::time::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All invites, newest first, with redeeming user details
pub async fn list_with_users(pool: &SqlitePool) -> Result<Vec<InviteCodeWithUser>> {
    let invites = sqlx::query_as::<_, InviteCodeWithUser>(
        r#"
        SELECT i.id, i.code, i.email, i.created_by_id, i.used_by_id, i.is_used,
               i.created_at, i.used_at, i.expires_at,
               u.username AS used_by_username,
               u.email AS used_by_email,
               u.full_name AS used_by_full_name
        FROM invite_codes i
        LEFT JOIN users u ON u.id = i.used_by_id
        ORDER BY i.created_at DESC, i.id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(invites)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM invite_codes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
