//! The async blob store interface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BlobStoreError, Result};

/// Persistent, host-local blob storage keyed by `(store id, blob id)`.
///
/// Implementations serialize their own operations; callers may issue
/// requests concurrently without further locking.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn BlobStore>`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Load a blob.
    ///
    /// # Returns
    ///
    /// * `Ok(bytes)` - The stored bytes.
    /// * `Err(BlobStoreError::NotFound)` - Nothing stored under this id.
    /// * `Err(_)` - Any other failure.
    async fn load(&self, store: &str, blob: &str) -> Result<Vec<u8>>;

    /// Store a blob, replacing any previous content.
    async fn store(&self, store: &str, blob: &str, bytes: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn load(&self, store: &str, blob: &str) -> Result<Vec<u8>> {
        self.as_ref().load(store, blob).await
    }

    async fn store(&self, store: &str, blob: &str, bytes: Vec<u8>) -> Result<()> {
        self.as_ref().store(store, blob, bytes).await
    }
}

/// Check that a store or blob id is usable as a storage key.
///
/// Ids become path components in [`crate::LocalDiskBlobStore`], so anything
/// that could escape the root directory is refused everywhere for
/// consistent behavior between stores.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(BlobStoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
