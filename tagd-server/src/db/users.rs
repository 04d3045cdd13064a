//! User account persistence

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tagd_common::db::UserRecord;
use tagd_common::Result;

const USER_COLUMNS: &str = "id, username, email, hashed_password, full_name, is_active, is_admin, reset_token, reset_token_expires, created_at";

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub hashed_password: &'a str,
    pub full_name: Option<&'a str>,
    pub is_admin: bool,
}

/// Whether `err` is a UNIQUE constraint failure (username or email taken)
pub fn is_unique_violation(err: &tagd_common::Error) -> bool {
    matches!(
        err,
        tagd_common::Error::Database(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

/// Insert a user, returning the new id
pub async fn insert(conn: &mut SqliteConnection, user: &NewUser<'_>) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (username, email, hashed_password, full_name, is_active, is_admin, created_at)
        VALUES (?, ?, ?, ?, 1, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user.username)
    .bind(user.email)
    .bind(user.hashed_password)
    .bind(user.full_name)
    .bind(user.is_admin)
    .bind(tagd_common::time::now())
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<UserRecord>> {
    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<UserRecord>> {
    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRecord>> {
    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_reset_token(pool: &SqlitePool, token: &str) -> Result<Option<UserRecord>> {
    let user = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users WHERE reset_token = ?",
        USER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// True when `username` is taken
pub async fn username_exists(conn: &mut SqliteConnection, username: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// True when `email` is taken
pub async fn email_exists(conn: &mut SqliteConnection, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

/// All users, newest first
pub async fn list(pool: &SqlitePool) -> Result<Vec<UserRecord>> {
    let users = sqlx::query_as::<_, UserRecord>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(users)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Replace the password hash and clear any pending reset token
pub async fn update_password(pool: &SqlitePool, id: i64, hashed_password: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET hashed_password = ?, reset_token = NULL, reset_token_expires = NULL WHERE id = ?",
    )
    .bind(hashed_password)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Store (or clear, with `None`) a password reset token
pub async fn set_reset_token(
    pool: &SqlitePool,
    id: i64,
    token: Option<&str>,
    expires: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query("UPDATE users SET reset_token = ?, reset_token_expires = ? WHERE id = ?")
        .bind(token)
        .bind(expires)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn update_username(pool: &SqlitePool, id: i64, username: &str) -> Result<()> {
    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(username)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a user; owned content cascades. Returns false if absent.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
