//! Tests for the operations behind `tagd-admin`

use sqlx::SqlitePool;
use std::sync::Arc;
use tagd_common::auth::verify_password;
use tagd_common::db::init_database;
use tagd_server::db::files::{self as file_db, NewFile, SOURCE_VIGNETTES};
use tagd_server::db::photos::{self as photo_db, NewPhoto};
use tagd_server::db::users;
use tagd_server::maintenance::{self, NewAccount};
use tagd_server::storage::{FileStore, LocalStore, PHOTOS_FOLDER};
use tempfile::TempDir;

async fn setup() -> (TempDir, SqlitePool, Arc<LocalStore>) {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("tag_diary.db")).await.unwrap();
    let store = Arc::new(LocalStore::new(temp.path().join("uploads")));
    (temp, pool, store)
}

fn account(username: &str, password: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        password: password.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_user_rejects_duplicates_and_short_passwords() {
    let (_temp, pool, _store) = setup().await;

    let user = maintenance::create_user(&pool, &account("dad", "dadpass"), 4)
        .await
        .unwrap();
    assert_eq!(user.username, "dad");
    assert!(!user.is_admin);

    assert!(maintenance::create_user(&pool, &account("dad", "other"), 4)
        .await
        .is_err());
    assert!(maintenance::create_user(&pool, &account("mum", "abc"), 4)
        .await
        .is_err());

    let users = maintenance::list_users(&pool).await.unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_reset_password() {
    let (_temp, pool, _store) = setup().await;
    maintenance::create_user(&pool, &account("gran", "oldpass"), 4)
        .await
        .unwrap();

    maintenance::reset_password(&pool, "gran", "newpass", 4)
        .await
        .unwrap();
    let record = users::find_by_username(&pool, "gran").await.unwrap().unwrap();
    assert!(verify_password("newpass", &record.hashed_password));
    assert!(!verify_password("oldpass", &record.hashed_password));

    assert!(maintenance::reset_password(&pool, "nobody", "newpass", 4)
        .await
        .is_err());
}

#[tokio::test]
async fn test_check_photos_reports_missing_files() {
    let (_temp, pool, store) = setup().await;
    let user = maintenance::create_user(&pool, &account("aunt", "auntpass"), 4)
        .await
        .unwrap();

    let present = store
        .put(PHOTOS_FOLDER, "present.jpg", b"jpeg", Some("image/jpeg"))
        .await
        .unwrap();
    let missing = store.uploads_dir().join(PHOTOS_FOLDER).join("missing.jpg");
    let missing = missing.to_string_lossy().into_owned();

    let outside = "/outside/uploads/stray.jpg".to_string();

    for (filename, path) in [
        ("present.jpg", &present),
        ("missing.jpg", &missing),
        ("stray.jpg", &outside),
    ] {
        photo_db::insert(
            &pool,
            &NewPhoto {
                filename,
                file_path: path,
                title: None,
                description: None,
                uploaded_by_id: user.id,
                taken_at: None,
            },
        )
        .await
        .unwrap();
    }

    let report = maintenance::check_photos(&pool, &*store).await.unwrap();
    assert_eq!(report.total, 3);
    assert!(report.orphaned.is_empty());
    // A location the store rejects is reported rather than failing the check
    let missing: Vec<&str> = report
        .missing_files
        .iter()
        .map(|p| p.filename.as_str())
        .collect();
    assert_eq!(missing, ["missing.jpg", "stray.jpg"]);
    assert!(!report.is_healthy());
}

#[tokio::test]
async fn test_file_sources_report_and_fix() {
    let (_temp, pool, _store) = setup().await;
    let user = maintenance::create_user(&pool, &account("uncle", "unclepass"), 4)
        .await
        .unwrap();

    file_db::insert(
        &pool,
        &NewFile {
            filename: "a.pdf",
            file_path: "/nowhere/a.pdf",
            title: Some("Minutes"),
            description: None,
            file_type: Some("application/pdf"),
            source: SOURCE_VIGNETTES,
            uploaded_by_id: user.id,
        },
    )
    .await
    .unwrap();

    let report = maintenance::file_sources(&pool, false).await.unwrap();
    assert_eq!(report.mistagged.len(), 1);
    assert_eq!(report.fixed, 0);

    let report = maintenance::file_sources(&pool, true).await.unwrap();
    assert_eq!(report.fixed, 1);

    let report = maintenance::file_sources(&pool, false).await.unwrap();
    assert!(report.mistagged.is_empty());
}

#[tokio::test]
async fn test_duplicate_insert_is_unique_violation() {
    let (_temp, pool, _store) = setup().await;
    let new_user = users::NewUser {
        username: "twin",
        email: Some("twin@example.com"),
        hashed_password: "x",
        full_name: None,
        is_admin: false,
    };

    let mut conn = pool.acquire().await.unwrap();
    users::insert(&mut conn, &new_user).await.unwrap();
    let err = users::insert(&mut conn, &new_user).await.unwrap_err();
    assert!(users::is_unique_violation(&err));

    let other = tagd_common::Error::NotFound("twin".to_string());
    assert!(!users::is_unique_violation(&other));
}
