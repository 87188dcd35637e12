//! Blob store backed by a local directory.
//!
//! Layout: `<root>/stores/<store id>/<blob id>`, one file per blob. Writes
//! are staged under `<root>/staging/` and renamed into place, so no blob id
//! can name a staging file.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{BlobStoreError, Result};
use crate::traits::{validate_name, BlobStore};

const STORES_DIR: &str = "stores";
const STAGING_DIR: &str = "staging";

pub struct LocalDiskBlobStore {
    root: PathBuf,
    lock: Mutex<()>,
    writes: AtomicU64,
}

impl LocalDiskBlobStore {
    /// Open a store rooted at an existing, writable directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let attr = std::fs::metadata(&root).map_err(|error| BlobStoreError::RootPathInvalid {
            path: root.clone(),
            error,
        })?;

        if !attr.is_dir() {
            return Err(BlobStoreError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root path must be a directory."),
            });
        }

        if attr.permissions().readonly() {
            return Err(BlobStoreError::RootPathInvalid {
                path: root,
                error: io::Error::other("Root directory must be writable"),
            });
        }

        match root.canonicalize() {
            Ok(root) => Ok(Self {
                root,
                lock: Mutex::new(()),
                writes: AtomicU64::new(0),
            }),
            Err(error) => Err(BlobStoreError::RootPathInvalid { path: root, error }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, store: &str, blob: &str) -> Result<PathBuf> {
        validate_name(store)?;
        validate_name(blob)?;
        Ok(self.root.join(STORES_DIR).join(store).join(blob))
    }

    fn staging_path(&self) -> PathBuf {
        let n = self.writes.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(STAGING_DIR)
            .join(format!("{}-{}.partial", std::process::id(), n))
    }
}

#[async_trait]
impl BlobStore for LocalDiskBlobStore {
    async fn load(&self, store: &str, blob: &str) -> Result<Vec<u8>> {
        let file_path = self.blob_path(store, blob)?;
        let _guard = self.lock.lock().await;
        tracing::debug!("Reading {}...", file_path.display());

        match tokio::fs::read(&file_path).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound {
                    store: store.to_string(),
                    blob: blob.to_string(),
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn store(&self, store: &str, blob: &str, bytes: Vec<u8>) -> Result<()> {
        let file_path = self.blob_path(store, blob)?;
        let _guard = self.lock.lock().await;
        tracing::debug!("Writing {}...", file_path.display());

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers only ever see complete blobs.
        let staging = self.staging_path();
        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &file_path).await?;
        Ok(())
    }
}
