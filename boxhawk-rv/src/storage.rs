//! Object store adapter
//!
//! The engine only needs `put`, `delete` and `public_url`. [`LocalObjectStore`]
//! keeps blobs in a directory that the HTTP layer serves under `/media`.

use async_trait::async_trait;
use boxhawk_common::{Error, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Durable blob storage keyed by a relative path
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `path`; fails if the path is taken
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String>;

    /// Remove blobs; already-missing blobs count as removed
    async fn delete(&self, paths: &[String]) -> Result<()>;

    /// Public URL for a stored path
    fn public_url(&self, path: &str) -> String;
}

pub use boxhawk_common::storage_path::validate_storage_path;

/// Filesystem-backed object store
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            root,
            public_base_url,
        }
    }

    /// Create the blob directory if missing
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf> {
        validate_storage_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String> {
        let target = self.blob_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("create {}: {}", parent.display(), e)))?;
        }

        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::Validation(format!("blob already exists: {}", path)));
            }
            Err(e) => return Err(Error::Storage(format!("open {}: {}", path, e))),
        };

        file.write_all(&bytes)
            .await
            .map_err(|e| Error::Storage(format!("write {}: {}", path, e)))?;
        file.flush()
            .await
            .map_err(|e| Error::Storage(format!("flush {}: {}", path, e)))?;

        info!(path = %path, size = bytes.len(), "Stored blob");
        Ok(path.to_string())
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        for path in paths {
            let target = self.blob_path(path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => debug!(path = %path, "Removed blob"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path, "Blob already absent")
                }
                Err(e) => return Err(Error::Storage(format!("remove {}: {}", path, e))),
            }
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url, path.trim_start_matches('/'))
    }
}
