//! Database schema migrations
//!
//! Versioned, idempotent upgrades for databases created by earlier releases.
//! Fresh databases already get the current schema from `init`; for them each
//! migration finds its column present and only records the version.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for users upgrading
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    if current_version < 3 {
        migrate_v3(pool).await?;
        set_schema_version(pool, 3).await?;
        info!("✓ Migration v3 completed");
    }

    Ok(())
}

/// Add `column` to `table` unless it is already there
///
/// Returns true when the column was added.
async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<bool> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;

    if !table_exists {
        info!("  {} table doesn't exist yet - skipping", table);
        return Ok(false);
    }

    let has_column: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
        table
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        return Ok(false);
    }

    let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition);
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            info!("  ✓ Added {}.{}", table, column);
            Ok(true)
        }
        // Two processes initializing the same file
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Migration v1: manual photo ordering
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: photos.sort_order");
    add_column_if_missing(pool, "photos", "sort_order", "INTEGER NOT NULL DEFAULT 0").await?;
    Ok(())
}

/// Migration v2: album ordering and album background images
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: album ordering and backgrounds");
    add_column_if_missing(pool, "albums", "sort_order", "INTEGER NOT NULL DEFAULT 0").await?;
    add_column_if_missing(pool, "albums", "background_filename", "TEXT").await?;
    add_column_if_missing(pool, "albums", "background_path", "TEXT").await?;
    Ok(())
}

/// Migration v3: split uploads between the Files page and the Vignettes page
async fn migrate_v3(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v3: files.source");
    add_column_if_missing(pool, "files", "source", "TEXT NOT NULL DEFAULT 'files'").await?;
    Ok(())
}
