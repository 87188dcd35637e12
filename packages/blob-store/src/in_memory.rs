//! In-memory blob store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{BlobStoreError, Result};
use crate::traits::{validate_name, BlobStore};

/// A blob store held entirely in memory.
///
/// Useful for tests and for hosts that have no persistent storage.
///
/// # Example
///
/// ```rust
/// use workerbridge_blob_store::{BlobStore, InMemoryBlobStore};
///
/// # tokio_test_block_on(async {
/// let store = InMemoryBlobStore::new();
/// store.store("saves", "slot1", b"progress".to_vec()).await.unwrap();
/// assert_eq!(store.load("saves", "slot1").await.unwrap(), b"progress");
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs held across all store ids.
    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn load(&self, store: &str, blob: &str) -> Result<Vec<u8>> {
        validate_name(store)?;
        validate_name(blob)?;
        let blobs = self.blobs.lock().await;
        blobs
            .get(&(store.to_string(), blob.to_string()))
            .cloned()
            .ok_or_else(|| BlobStoreError::NotFound {
                store: store.to_string(),
                blob: blob.to_string(),
            })
    }

    async fn store(&self, store: &str, blob: &str, bytes: Vec<u8>) -> Result<()> {
        validate_name(store)?;
        validate_name(blob)?;
        self.blobs
            .lock()
            .await
            .insert((store.to_string(), blob.to_string()), bytes);
        Ok(())
    }
}
