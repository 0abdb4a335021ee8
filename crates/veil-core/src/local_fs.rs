//! Filesystem-backed storage gateway.
//!
//! Each location maps to a directory under a root, and each key to a file path
//! inside it: `{root}/{bucket}/{key}`. Keys containing `/` become nested
//! directories. Listings are lexical by path, like S3 `ListObjectsV2`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::location::{BucketName, validate_key};
use crate::storage::{ObjectMeta, StorageGateway};

const TEMP_SUFFIX: &str = ".veil-partial";

/// Storage gateway that keeps each location in a local directory.
#[derive(Debug, Clone)]
pub struct LocalFsGateway {
    root: PathBuf,
}

impl LocalFsGateway {
    /// Creates a gateway rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` exists but is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(Error::InvalidLocation {
                message: format!("storage root is not a directory: {}", root.display()),
            });
        }
        Ok(Self { root })
    }

    fn location_dir(&self, location: &BucketName) -> PathBuf {
        self.root.join(location.as_str())
    }

    fn object_path(&self, location: &BucketName, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.location_dir(location).join(key))
    }
}

#[async_trait]
impl StorageGateway for LocalFsGateway {
    async fn get(&self, location: &BucketName, key: &str) -> Result<Bytes> {
        let path = self.object_path(location, key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object not found: {location}/{key}")))
            }
            Err(err) => Err(Error::transport_with_source(
                format!("failed to read {location}/{key}"),
                err,
            )),
        }
    }

    async fn put(&self, location: &BucketName, key: &str, data: Bytes) -> Result<()> {
        let path = self.object_path(location, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename so readers never see a torn object.
        let mut partial = path.clone().into_os_string();
        partial.push(TEMP_SUFFIX);
        tokio::fs::write(&partial, &data).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(())
    }

    async fn list(&self, location: &BucketName) -> Result<Vec<ObjectMeta>> {
        let dir = self.location_dir(location);
        tokio::task::spawn_blocking(move || list_dir(&dir))
            .await
            .map_err(|e| Error::Internal {
                message: format!("listing task failed: {e}"),
            })?
    }

    async fn delete(&self, location: &BucketName, key: &str) -> Result<()> {
        let path = self.object_path(location, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::transport_with_source(
                format!("failed to delete {location}/{key}"),
                err,
            )),
        }
    }
}

fn list_dir(dir: &Path) -> Result<Vec<ObjectMeta>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry
            .map_err(|e| Error::transport(format!("failed to walk {}: {e}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::Internal {
                message: format!("walked outside location dir: {e}"),
            })?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.ends_with(TEMP_SUFFIX) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| Error::transport(format!("failed to stat {key}: {e}")))?;
        objects.push(ObjectMeta {
            key,
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        });
    }

    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}
