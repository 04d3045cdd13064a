//! Configuration loading and root folder resolution
//!
//! Settings come from three places, highest priority first:
//! 1. Environment variables (names kept compatible with existing deployments)
//! 2. TOML config file
//! 3. Compiled defaults
//!
//! The root folder (database + uploads) additionally accepts a command-line
//! argument, which beats everything else.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TAGD_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "tag_diary.db";

/// Uploads directory name inside the root folder
pub const UPLOADS_DIR: &str = "uploads";

/// Full configuration as read from `config.toml`
///
/// Every field has a default so a partial (or absent) file is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding `tag_diary.db` and `uploads/`
    pub root_folder: Option<PathBuf>,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub cors: CorsSettings,
    /// Upper bound for request bodies (uploads), in bytes
    pub max_upload_bytes: usize,
    /// Built frontend to serve at `/` (optional)
    pub frontend_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            storage: StorageSettings::default(),
            cors: CorsSettings::default(),
            max_upload_bytes: 100 * 1024 * 1024,
            frontend_dir: None,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Session and password settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// JWT signing secret. When unset, a secret is generated once and kept
    /// in the database `settings` table.
    pub secret_key: Option<String>,
    pub access_token_expire_minutes: i64,
    pub reset_token_ttl_minutes: i64,
    pub bcrypt_cost: u32,
    /// Echo password reset tokens in the API response (development only)
    pub expose_reset_token: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            access_token_expire_minutes: 30,
            reset_token_ttl_minutes: 60,
            bcrypt_cost: 12,
            expose_reset_token: false,
        }
    }
}

/// S3-compatible object storage (Cloudflare R2, AWS S3, MinIO, ...)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub use_cloud: bool,
    pub endpoint_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket_name: Option<String>,
    /// Public base URL of the bucket, e.g. `https://files.example.com`
    pub public_url: Option<String>,
}

impl StorageSettings {
    /// Cloud storage is used only when enabled and fully specified
    pub fn is_cloud_configured(&self) -> bool {
        self.use_cloud
            && [
                &self.endpoint_url,
                &self.access_key,
                &self.secret_key,
                &self.bucket_name,
            ]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsSettings {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "https://mrtag.com".to_string(),
                "http://mrtag.com".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from `explicit` or the default config file location,
    /// then apply environment overrides.
    ///
    /// A missing or unreadable file is not an error: defaults are used and a
    /// warning logged. A file that fails to parse is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_file(),
        };

        let mut config = match path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(content) => {
                    info!("Loaded configuration from {}", path.display());
                    Self::from_toml_str(&content)?
                }
                Err(e) => {
                    warn!(
                        "Config file {} unreadable: {} (using defaults)",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Some(path) => {
                warn!("Config file not found: {} (using defaults)", path.display());
                Self::default()
            }
            None => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env();
        config.check_token_lifetimes();
        Ok(config)
    }

    /// Reset token lifetimes that are not positive or overflow a timestamp
    pub fn check_token_lifetimes(&mut self) {
        let defaults = AuthSettings::default();
        let usable = |minutes: i64| minutes > 0 && crate::time::minutes_from_now(minutes).is_some();

        if !usable(self.auth.access_token_expire_minutes) {
            warn!(
                "access_token_expire_minutes {} out of range, using {}",
                self.auth.access_token_expire_minutes, defaults.access_token_expire_minutes
            );
            self.auth.access_token_expire_minutes = defaults.access_token_expire_minutes;
        }
        if !usable(self.auth.reset_token_ttl_minutes) {
            warn!(
                "reset_token_ttl_minutes {} out of range, using {}",
                self.auth.reset_token_ttl_minutes, defaults.reset_token_ttl_minutes
            );
            self.auth.reset_token_ttl_minutes = defaults.reset_token_ttl_minutes;
        }
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TAGD_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("TAGD_PORT") {
            match v.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!("Invalid TAGD_PORT value '{}': {}", v, e),
            }
        }
        if let Some(v) = lookup("SECRET_KEY") {
            self.auth.secret_key = Some(v);
        }
        if let Some(v) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            match v.parse() {
                Ok(minutes) => self.auth.access_token_expire_minutes = minutes,
                Err(e) => warn!("Invalid ACCESS_TOKEN_EXPIRE_MINUTES value '{}': {}", v, e),
            }
        }
        if let Some(v) = lookup("USE_CLOUD_STORAGE") {
            self.storage.use_cloud = v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("S3_ENDPOINT_URL") {
            self.storage.endpoint_url = Some(v);
        }
        if let Some(v) = lookup("S3_ACCESS_KEY_ID") {
            self.storage.access_key = Some(v);
        }
        if let Some(v) = lookup("S3_SECRET_ACCESS_KEY") {
            self.storage.secret_key = Some(v);
        }
        if let Some(v) = lookup("S3_BUCKET_NAME") {
            self.storage.bucket_name = Some(v);
        }
        if let Some(v) = lookup("S3_PUBLIC_URL") {
            self.storage.public_url = Some(v.trim_end_matches('/').to_string());
        }
    }
}

/// Resolve the root folder
///
/// Priority: command-line argument, `TAGD_ROOT_FOLDER`, TOML `root_folder`,
/// then the OS-dependent default.
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database file inside the root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// Uploads directory inside the root folder
pub fn uploads_dir(root_folder: &Path) -> PathBuf {
    root_folder.join(UPLOADS_DIR)
}

/// Default configuration file path for the platform, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tagd").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/tagd/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("tagd"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\tagd"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("tagd"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/tagd"))
    } else {
        dirs::data_local_dir()
            .map(|d| d.join("tagd"))
            .unwrap_or_else(|| PathBuf::from("./tagd_data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_token_expire_minutes, 30);
        assert_eq!(config.auth.bcrypt_cost, 12);
        assert!(!config.auth.expose_reset_token);
        assert_eq!(config.cors.allowed_origins.len(), 4);
        assert!(!config.storage.is_cloud_configured());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            root_folder = "/srv/tagd"

            [server]
            port = 9100

            [auth]
            bcrypt_cost = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/tagd")));
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.auth.access_token_expire_minutes, 30);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let result = TomlConfig::from_toml_str("[server\nport = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SECRET_KEY", "s3cret"),
            ("USE_CLOUD_STORAGE", "TRUE"),
            ("S3_ENDPOINT_URL", "https://acct.r2.cloudflarestorage.com"),
            ("S3_ACCESS_KEY_ID", "ak"),
            ("S3_SECRET_ACCESS_KEY", "sk"),
            ("S3_BUCKET_NAME", "diary"),
            ("S3_PUBLIC_URL", "https://files.example.com/"),
            ("TAGD_PORT", "9000"),
        ]
        .into_iter()
        .collect();

        let mut config = TomlConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.auth.secret_key.as_deref(), Some("s3cret"));
        assert_eq!(config.server.port, 9000);
        assert!(config.storage.is_cloud_configured());
        assert_eq!(
            config.storage.public_url.as_deref(),
            Some("https://files.example.com")
        );
    }

    #[test]
    fn test_invalid_port_env_is_ignored() {
        let mut config = TomlConfig::default();
        config.apply_env_from(|k| (k == "TAGD_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_out_of_range_token_lifetimes_reset() {
        let mut config = TomlConfig::default();
        config.apply_env_from(|k| {
            (k == "ACCESS_TOKEN_EXPIRE_MINUTES").then(|| "9223372036854775807".to_string())
        });
        config.auth.reset_token_ttl_minutes = 0;

        config.check_token_lifetimes();
        assert_eq!(config.auth.access_token_expire_minutes, 30);
        assert_eq!(config.auth.reset_token_ttl_minutes, 60);

        config.auth.access_token_expire_minutes = 1440;
        config.check_token_lifetimes();
        assert_eq!(config.auth.access_token_expire_minutes, 1440);
    }

    #[test]
    fn test_cloud_requires_all_fields() {
        let storage = StorageSettings {
            use_cloud: true,
            endpoint_url: Some("https://example.com".to_string()),
            access_key: Some("ak".to_string()),
            secret_key: Some(" ".to_string()),
            bucket_name: Some("b".to_string()),
            public_url: None,
        };
        assert!(!storage.is_cloud_configured());
    }

    #[test]
    fn test_paths_inside_root() {
        let root = Path::new("/data/tagd");
        assert_eq!(database_path(root), PathBuf::from("/data/tagd/tag_diary.db"));
        assert_eq!(uploads_dir(root), PathBuf::from("/data/tagd/uploads"));
    }
}
