//! Error types for blob stores.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a blob store operation.
///
/// None of these are fatal to the bridge: the proxy turns them into a
/// failure response and the worker decides what to do.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// No blob under this store/blob id pair.
    #[error("blob not found: {store}/{blob}")]
    NotFound { store: String, blob: String },

    /// A store or blob id that cannot be used as a storage key.
    #[error("invalid blob name: {name:?}")]
    InvalidName { name: String },

    /// The root directory of a local store is unusable.
    #[error("invalid root path {}: {error}", path.display())]
    RootPathInvalid {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// An I/O error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for blob store operations.
pub type Result<T> = std::result::Result<T, BlobStoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn not_found_display() {
        let e = BlobStoreError::NotFound {
            store: "saves".to_string(),
            blob: "slot1".to_string(),
        };
        assert_eq!(format!("{}", e), "blob not found: saves/slot1");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: BlobStoreError = io_err.into();
        assert!(matches!(e, BlobStoreError::Io(_)));
    }

    #[test]
    fn root_path_error_has_source() {
        let e = BlobStoreError::RootPathInvalid {
            path: PathBuf::from("/nowhere"),
            error: std::io::Error::other("missing"),
        };
        assert!(format!("{}", e).contains("/nowhere"));
        assert!(StdError::source(&e).is_some());
    }
}
