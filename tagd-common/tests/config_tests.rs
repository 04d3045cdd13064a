//! Tests for configuration loading and root folder resolution
//!
//! Tests that manipulate TAGD_ROOT_FOLDER are marked with #[serial]
//! so they never run in parallel with each other.

use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tagd_common::config::{resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use tempfile::TempDir;

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let root = resolve_root_folder(Some(Path::new("/from/cli")), &config);
    assert_eq!(root, PathBuf::from("/from/cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_default_root_folder_fallback() {
    env::remove_var(ROOT_FOLDER_ENV);
    let root = resolve_root_folder(None, &TomlConfig::default());

    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("tagd"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "   ");
    let config = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    assert_eq!(resolve_root_folder(None, &config), PathBuf::from("/from/toml"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("does-not-exist.toml");

    let config = TomlConfig::load(Some(&missing));
    assert!(config.is_ok(), "Missing config file should not be fatal");
}

#[test]
fn test_config_file_loaded() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        max_upload_bytes = 1024

        [cors]
        allowed_origins = ["https://family.example"]

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(Some(&path)).unwrap();
    assert_eq!(config.max_upload_bytes, 1024);
    assert_eq!(config.cors.allowed_origins, vec!["https://family.example".to_string()]);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_unparsable_config_file_is_error() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "max_upload_bytes = \"lots\"").unwrap();

    assert!(TomlConfig::load(Some(&path)).is_err());
}

#[test]
fn test_unreadable_config_file_uses_defaults() {
    let temp = TempDir::new().unwrap();
    // A directory exists but cannot be read as a file
    let unreadable = temp.path().join("config.toml");
    std::fs::create_dir(&unreadable).unwrap();

    let config = TomlConfig::load(Some(&unreadable)).unwrap();
    assert_eq!(config.max_upload_bytes, TomlConfig::default().max_upload_bytes);
    assert_eq!(config.logging.level, "info");
}
