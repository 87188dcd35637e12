//! Persistent blob storage for the workerbridge host.
//!
//! The worker cannot touch host storage directly. It sends `blobstore`
//! envelopes, and the host's blob proxy answers them from a [`BlobStore`]:
//! - [`InMemoryBlobStore`]: volatile, for tests and storage-less hosts
//! - [`LocalDiskBlobStore`]: one file per blob under a root directory

pub mod error;
pub mod in_memory;
pub mod local_disk;
pub mod traits;

pub use error::{BlobStoreError, Result};
pub use in_memory::InMemoryBlobStore;
pub use local_disk::LocalDiskBlobStore;
pub use traits::{validate_name, BlobStore};
