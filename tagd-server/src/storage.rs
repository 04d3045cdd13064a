//! File storage backends
//!
//! Uploaded media is written through a [`FileStore`]. The returned *location*
//! string is what the database keeps in `file_path`:
//! - [`LocalStore`]: absolute path under `<root>/uploads/<folder>/`
//! - `S3Store` (feature `s3`): `<public_url>/<key>` or `s3://<bucket>/<key>`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagd_common::config::TomlConfig;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Folder for photos and background images
pub const PHOTOS_FOLDER: &str = "photos";
/// Folder for audio recordings
pub const AUDIO_FOLDER: &str = "audio";
/// Folder for generic files
pub const FILES_FOLDER: &str = "files";

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing stored at this location
    #[error("Not found: {0}")]
    NotFound(String),

    /// Location or name outside what this store manages
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Local filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Where uploaded bytes live
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `data` as `<folder>/<filename>`, returning its location
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<String, StorageError>;

    /// Read the bytes stored at `location`
    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove `location`; `Ok(false)` when nothing was there
    async fn delete(&self, location: &str) -> Result<bool, StorageError>;

    /// Whether `location` currently holds data
    async fn exists(&self, location: &str) -> Result<bool, StorageError>;

    /// URL a browser can fetch directly, if the backend exposes one
    fn public_url(&self, location: &str, folder: &str, filename: &str) -> Option<String>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Reject names that could escape their folder
fn validate_component(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(StorageError::InvalidLocation(name.to_string()));
    }
    Ok(())
}

// ========================================
// Local filesystem
// ========================================

/// Stores files under `<root>/uploads`
#[derive(Debug, Clone)]
pub struct LocalStore {
    uploads_dir: PathBuf,
}

impl LocalStore {
    /// Relative directories are anchored to the current directory, so
    /// stored locations stay valid for [`LocalStore::resolve`].
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        let uploads_dir = uploads_dir.into();
        let uploads_dir = std::path::absolute(&uploads_dir).unwrap_or(uploads_dir);
        Self { uploads_dir }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Create the upload folders
    pub fn ensure_folders(&self) -> std::io::Result<()> {
        for folder in [PHOTOS_FOLDER, AUDIO_FOLDER, FILES_FOLDER] {
            std::fs::create_dir_all(self.uploads_dir.join(folder))?;
        }
        Ok(())
    }

    /// Map a stored location back to a path inside the uploads directory
    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(location);
        if path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }

        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.uploads_dir.join(path)
        };

        if !path.starts_with(&self.uploads_dir) {
            return Err(StorageError::InvalidLocation(location.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn put(
        &self,
        folder: &str,
        filename: &str,
        data: &[u8],
        _content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        validate_component(folder)?;
        validate_component(filename)?;

        let dir = self.uploads_dir.join(folder);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(filename);
        tokio::fs::write(&path, data).await?;
        debug!("Stored {} bytes at {}", data.len(), path.display());

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(location)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, location: &str) -> Result<bool, StorageError> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, location: &str) -> Result<bool, StorageError> {
        let path = self.resolve(location)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    fn public_url(&self, location: &str, folder: &str, filename: &str) -> Option<String> {
        // Served by the /uploads static route
        let expected = self.uploads_dir.join(folder).join(filename);
        (Path::new(location) == expected).then(|| format!("/uploads/{}/{}", folder, filename))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

// ========================================
// S3-compatible object storage
// ========================================

#[cfg(feature = "s3")]
pub use self::s3_store::S3Store;

#[cfg(feature = "s3")]
mod s3_store {
    use super::{validate_component, FileStore, StorageError};
    use async_trait::async_trait;
    use s3::creds::Credentials;
    use s3::{Bucket, Region};
    use tagd_common::config::StorageSettings;
    use tracing::debug;

    /// Objects in one bucket, keyed `<folder>/<filename>`
    pub struct S3Store {
        bucket: Box<Bucket>,
        bucket_name: String,
        public_url: Option<String>,
    }

    impl S3Store {
        pub fn new(settings: &StorageSettings) -> Result<Self, StorageError> {
            let missing = |what: &str| StorageError::Backend(format!("{} not configured", what));
            let endpoint = settings
                .endpoint_url
                .clone()
                .ok_or_else(|| missing("endpoint_url"))?;
            let bucket_name = settings
                .bucket_name
                .clone()
                .ok_or_else(|| missing("bucket_name"))?;

            let credentials = Credentials::new(
                settings.access_key.as_deref(),
                settings.secret_key.as_deref(),
                None,
                None,
                None,
            )
            .map_err(|e| StorageError::Backend(e.to_string()))?;

            let region = Region::Custom {
                region: "auto".to_string(),
                endpoint,
            };

            let bucket = Bucket::new(&bucket_name, region, credentials)
                .map_err(|e| StorageError::Backend(e.to_string()))?
                .with_path_style();

            Ok(Self {
                bucket,
                bucket_name,
                public_url: settings
                    .public_url
                    .as_ref()
                    .map(|u| u.trim_end_matches('/').to_string()),
            })
        }

        fn location_for(&self, key: &str) -> String {
            match &self.public_url {
                Some(base) => format!("{}/{}", base, key),
                None => format!("s3://{}/{}", self.bucket_name, key),
            }
        }

        /// Recover the object key from a stored location
        fn key_for(&self, location: &str) -> Result<String, StorageError> {
            if let Some(base) = &self.public_url {
                if let Some(key) = location.strip_prefix(&format!("{}/", base)) {
                    return Ok(key.to_string());
                }
            }
            let prefix = format!("s3://{}/", self.bucket_name);
            location
                .strip_prefix(&prefix)
                .map(str::to_string)
                .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))
        }
    }

    #[async_trait]
    impl FileStore for S3Store {
        async fn put(
            &self,
            folder: &str,
            filename: &str,
            data: &[u8],
            content_type: Option<&str>,
        ) -> Result<String, StorageError> {
            validate_component(folder)?;
            validate_component(filename)?;

            let key = format!("{}/{}", folder, filename);
            let response = self
                .bucket
                .put_object_with_content_type(
                    &key,
                    data,
                    content_type.unwrap_or("application/octet-stream"),
                )
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            if !(200..300).contains(&response.status_code()) {
                return Err(StorageError::Backend(format!(
                    "upload of {} returned HTTP {}",
                    key,
                    response.status_code()
                )));
            }

            debug!("Uploaded {} bytes to s3 key {}", data.len(), key);
            Ok(self.location_for(&key))
        }

        async fn read(&self, location: &str) -> Result<Vec<u8>, StorageError> {
            let key = self.key_for(location)?;
            let response = self
                .bucket
                .get_object(&key)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            match response.status_code() {
                200..=299 => Ok(response.bytes().to_vec()),
                404 => Err(StorageError::NotFound(location.to_string())),
                code => Err(StorageError::Backend(format!(
                    "download of {} returned HTTP {}",
                    key, code
                ))),
            }
        }

        async fn delete(&self, location: &str) -> Result<bool, StorageError> {
            let key = self.key_for(location)?;
            let response = self
                .bucket
                .delete_object(&key)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            match response.status_code() {
                200..=299 => Ok(true),
                404 => Ok(false),
                code => Err(StorageError::Backend(format!(
                    "delete of {} returned HTTP {}",
                    key, code
                ))),
            }
        }

        async fn exists(&self, location: &str) -> Result<bool, StorageError> {
            let key = self.key_for(location)?;
            match self.bucket.head_object(&key).await {
                Ok((_, code)) => Ok((200..300).contains(&code)),
                Err(s3::error::S3Error::HttpFailWithBody(404, _)) => Ok(false),
                Err(e) => Err(StorageError::Backend(e.to_string())),
            }
        }

        fn public_url(&self, location: &str, _folder: &str, _filename: &str) -> Option<String> {
            location.starts_with("http").then(|| location.to_string())
        }

        fn backend_name(&self) -> &'static str {
            "s3"
        }
    }
}

/// Pick the storage backend for this configuration
///
/// Cloud storage is used when it is fully configured and compiled in;
/// otherwise files go to the local uploads directory.
pub fn build_store(
    config: &TomlConfig,
    uploads_dir: &Path,
) -> Result<Arc<dyn FileStore>, StorageError> {
    if config.storage.is_cloud_configured() {
        #[cfg(feature = "s3")]
        {
            let store = S3Store::new(&config.storage)?;
            info!(
                "Using S3-compatible storage (bucket: {})",
                config.storage.bucket_name.as_deref().unwrap_or_default()
            );
            return Ok(Arc::new(store));
        }

        #[cfg(not(feature = "s3"))]
        warn!("Cloud storage is configured but this build lacks the `s3` feature; using local storage");
    } else if config.storage.use_cloud {
        warn!("Cloud storage enabled but not fully configured; using local storage");
    }

    let store = LocalStore::new(uploads_dir);
    store.ensure_folders()?;
    info!("Using local storage at {}", store.uploads_dir().display());
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path().join("uploads"));
        (temp, store)
    }

    #[tokio::test]
    async fn test_put_read_delete() {
        let (_temp, store) = store();

        let location = store
            .put(PHOTOS_FOLDER, "a.jpg", b"jpeg bytes", Some("image/jpeg"))
            .await
            .unwrap();
        assert!(location.ends_with("photos/a.jpg"));
        assert!(store.exists(&location).await.unwrap());
        assert_eq!(store.read(&location).await.unwrap(), b"jpeg bytes");

        assert!(store.delete(&location).await.unwrap());
        assert!(!store.delete(&location).await.unwrap());
        assert!(!store.exists(&location).await.unwrap());
    }

    #[tokio::test]
    async fn test_relative_uploads_dir() {
        let temp = TempDir::new_in(".").unwrap();
        let cwd = std::env::current_dir().unwrap();
        let relative = temp
            .path()
            .strip_prefix(&cwd)
            .unwrap_or(temp.path())
            .join("uploads");
        assert!(relative.is_relative());

        let store = LocalStore::new(&relative);
        assert!(store.uploads_dir().is_absolute());

        let location = store
            .put(PHOTOS_FOLDER, "a.jpg", b"jpeg bytes", None)
            .await
            .unwrap();
        assert!(Path::new(&location).is_absolute());
        assert!(store.exists(&location).await.unwrap());
        assert_eq!(store.read(&location).await.unwrap(), b"jpeg bytes");
        assert_eq!(
            store.public_url(&location, PHOTOS_FOLDER, "a.jpg").as_deref(),
            Some("/uploads/photos/a.jpg")
        );

        assert!(store.delete(&location).await.unwrap());
        assert!(!relative.join(PHOTOS_FOLDER).join("a.jpg").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_temp, store) = store();
        let location = store.uploads_dir().join("files").join("gone.pdf");

        let result = store.read(&location.to_string_lossy()).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_locations_outside_uploads() {
        let (_temp, store) = store();

        assert!(matches!(
            store.read("/etc/passwd").await,
            Err(StorageError::InvalidLocation(_))
        ));
        let sneaky = format!("{}/photos/../../secret", store.uploads_dir().display());
        assert!(matches!(
            store.read(&sneaky).await,
            Err(StorageError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_components_in_names() {
        let (_temp, store) = store();

        assert!(store.put("photos", "../x.jpg", b"x", None).await.is_err());
        assert!(store.put("../photos", "x.jpg", b"x", None).await.is_err());
        assert!(store.put("photos", "", b"x", None).await.is_err());
    }

    #[tokio::test]
    async fn test_public_url_for_local_files() {
        let (_temp, store) = store();
        let location = store.put(AUDIO_FOLDER, "r.webm", b"x", None).await.unwrap();

        assert_eq!(
            store.public_url(&location, AUDIO_FOLDER, "r.webm").as_deref(),
            Some("/uploads/audio/r.webm")
        );
        assert_eq!(store.public_url("/elsewhere/r.webm", AUDIO_FOLDER, "r.webm"), None);
    }

    #[test]
    fn test_build_store_defaults_to_local() {
        let temp = TempDir::new().unwrap();
        let uploads = temp.path().join("uploads");

        let store = build_store(&TomlConfig::default(), &uploads).unwrap();
        assert_eq!(store.backend_name(), "local");
        assert!(uploads.join(PHOTOS_FOLDER).is_dir());
        assert!(uploads.join(AUDIO_FOLDER).is_dir());
        assert!(uploads.join(FILES_FOLDER).is_dir());
    }
}
