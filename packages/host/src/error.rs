//! Error types for the host side of the bridge.

use thiserror::Error;
use workerbridge_envelope::ProtocolError;

use crate::config::ConfigError;

/// Errors that stop the host from processing envelopes.
///
/// Resource failures (blob misses, image decode errors) are deliberately
/// absent: they are reported to the worker, not to the host.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The worker violated the message protocol. Fatal.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// The channel to the worker was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The channel to the worker is full.
    #[error("channel full")]
    ChannelFull,

    /// Host configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The configured blob store could not be opened.
    #[error("blob store error: {0}")]
    BlobStore(#[from] workerbridge_blob_store::BlobStoreError),
}

impl ProxyError {
    /// Whether this error is a protocol violation (schema/version skew)
    /// rather than a transport or setup failure.
    pub fn is_protocol(&self) -> bool {
        matches!(self, ProxyError::Protocol(_))
    }
}

/// Result type alias for host operations.
pub type Result<T> = std::result::Result<T, ProxyError>;
