//! Host configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use workerbridge_blob_store::{BlobStore, InMemoryBlobStore, LocalDiskBlobStore};

use crate::error::Result;
use crate::frame::MAX_SURFACE_SIDE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {error}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An allow-list entry that is not of the form `object.property`.
    #[error("settable property {0:?} must look like object.property")]
    InvalidProperty(String),

    #[error("surface size {width}x{height} exceeds {max} pixels per side")]
    SurfaceTooLarge { width: u32, height: u32, max: u32 },
}

/// Configuration for the host side of the bridge.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostConfig {
    /// URL of the host document, handed to the worker at startup.
    pub document_url: String,

    /// URL the worker script was loaded from.
    pub script_url: String,

    /// Initial surface width in pixels.
    pub width: u32,

    /// Initial surface height in pixels.
    pub height: u32,

    /// Period of the host's rendering opportunities.
    pub frame_interval_ms: u64,

    /// Envelopes buffered per transport direction.
    pub channel_capacity: usize,

    /// `object.property` pairs the worker may mutate with `set-property`.
    pub settable_properties: Vec<String>,

    /// Directory for persistent blobs. In-memory storage when unset.
    pub blob_root: Option<PathBuf>,

    /// Directory relative image sources resolve against.
    pub image_root: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            document_url: "about:blank".to_string(),
            script_url: "worker.js".to_string(),
            width: 300,
            height: 150,
            frame_interval_ms: 16,
            channel_capacity: 1024,
            settable_properties: vec![
                "style.cursor".to_string(),
                "style.width".to_string(),
                "style.height".to_string(),
            ],
            blob_root: None,
            image_root: None,
        }
    }
}

impl HostConfig {
    /// Load a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, ConfigError> {
        let config: HostConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the allow-list and the initial surface size.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.settable_pairs()?;
        if self.width > MAX_SURFACE_SIDE || self.height > MAX_SURFACE_SIDE {
            return Err(ConfigError::SurfaceTooLarge {
                width: self.width,
                height: self.height,
                max: MAX_SURFACE_SIDE,
            });
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// The allow-list as `(object, property)` pairs.
    pub fn settable_pairs(&self) -> std::result::Result<BTreeSet<(String, String)>, ConfigError> {
        self.settable_properties
            .iter()
            .map(|entry| match entry.split_once('.') {
                Some((object, property)) if !object.is_empty() && !property.is_empty() => {
                    Ok((object.to_string(), property.to_string()))
                }
                _ => Err(ConfigError::InvalidProperty(entry.clone())),
            })
            .collect()
    }

    /// Open the configured blob store.
    pub fn open_blob_store(&self) -> Result<Arc<dyn BlobStore>> {
        match &self.blob_root {
            Some(root) => Ok(Arc::new(LocalDiskBlobStore::new(root)?)),
            None => Ok(Arc::new(InMemoryBlobStore::new())),
        }
    }
}
