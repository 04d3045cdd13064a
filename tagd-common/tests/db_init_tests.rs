//! Tests for database initialization, migrations and the stored JWT secret

use sqlx::SqlitePool;
use tagd_common::auth::{load_or_init_jwt_secret, JWT_SECRET_SETTING};
use tagd_common::db::init::init_database;
use tagd_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use tempfile::TempDir;

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> bool {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
        table
    ))
    .bind(column)
    .fetch_one(pool)
    .await
    .unwrap();
    count > 0
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("nested").join("tag_diary.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("tag_diary.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("tag_diary.db")).await.unwrap();

    for table in [
        "users",
        "invite_codes",
        "vignettes",
        "vignette_photos",
        "photos",
        "albums",
        "album_photos",
        "people",
        "photo_people",
        "audio_recordings",
        "files",
        "background_images",
        "settings",
        "schema_version",
    ] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }

    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("tag_diary.db")).await.unwrap();

    // No user 999 exists
    let result = sqlx::query(
        "INSERT INTO photos (filename, file_path, uploaded_by_id, created_at) VALUES ('a.jpg', '/x', 999, '2024-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "Foreign key violation was accepted");
}

#[tokio::test]
async fn test_deleting_user_cascades_to_content() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("tag_diary.db")).await.unwrap();

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, hashed_password, created_at) VALUES ('kid', 'x', '2024-01-01T00:00:00Z') RETURNING id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO photos (filename, file_path, uploaded_by_id, created_at) VALUES ('a.jpg', '/x', ?, '2024-01-01T00:00:00Z')",
    )
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO invite_codes (code, created_by_id, created_at) VALUES ('abc', ?, '2024-01-01T00:00:00Z')",
    )
    .bind(user_id)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let photos: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM photos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(photos, 0);

    // Invites survive with the creator cleared
    let creator: Option<i64> = sqlx::query_scalar("SELECT created_by_id FROM invite_codes WHERE code = 'abc'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(creator, None);
}

#[tokio::test]
async fn test_migrations_upgrade_old_schema() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("tag_diary.db");

    // Layout written by releases that predate ordering and file sources
    {
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await.unwrap();
        sqlx::query(
            "CREATE TABLE photos (id INTEGER PRIMARY KEY AUTOINCREMENT, filename TEXT NOT NULL, file_path TEXT NOT NULL, title TEXT, description TEXT, uploaded_by_id INTEGER NOT NULL, taken_at TIMESTAMP, created_at TIMESTAMP NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE albums (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, description TEXT, created_by_id INTEGER NOT NULL, created_at TIMESTAMP NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE files (id INTEGER PRIMARY KEY AUTOINCREMENT, filename TEXT NOT NULL, file_path TEXT NOT NULL, title TEXT, description TEXT, file_type TEXT, uploaded_by_id INTEGER NOT NULL, created_at TIMESTAMP NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();

    assert!(column_exists(&pool, "photos", "sort_order").await);
    assert!(column_exists(&pool, "albums", "sort_order").await);
    assert!(column_exists(&pool, "albums", "background_filename").await);
    assert!(column_exists(&pool, "albums", "background_path").await);
    assert!(column_exists(&pool, "files", "source").await);
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_jwt_secret_generated_once() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("tag_diary.db")).await.unwrap();

    let first = load_or_init_jwt_secret(&pool).await.unwrap();
    let second = load_or_init_jwt_secret(&pool).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);

    let stored: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(JWT_SECRET_SETTING)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, first);
}
