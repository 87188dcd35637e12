use std::path::PathBuf;

use clap::Parser;
use workerbridge_host::{ConfigError, HostConfig};

/// workerbridge - headless host for a worker speaking JSON-lines envelopes
#[derive(Parser, Debug, Default)]
#[command(name = "workerbridge")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host config file (JSON, camelCase keys)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Initial surface width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Initial surface height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Milliseconds between rendering passes
    #[arg(long)]
    pub frame_interval_ms: Option<u64>,

    /// Directory for persistent blobs (in-memory when omitted)
    #[arg(long)]
    pub blob_root: Option<PathBuf>,

    /// Directory relative image sources resolve against
    #[arg(long)]
    pub image_root: Option<PathBuf>,

    /// Extra object.property the worker may set (repeatable)
    #[arg(long = "allow-property", value_name = "OBJECT.PROPERTY")]
    pub allow_property: Vec<String>,
}

impl Args {
    /// The config file (or defaults) with command-line overrides applied.
    pub fn host_config(&self) -> Result<HostConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => HostConfig::from_file(path)?,
            None => HostConfig::default(),
        };

        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(interval) = self.frame_interval_ms {
            config.frame_interval_ms = interval;
        }
        if let Some(root) = &self.blob_root {
            config.blob_root = Some(root.clone());
        }
        if let Some(root) = &self.image_root {
            config.image_root = Some(root.clone());
        }
        if !self.allow_property.is_empty() {
            config
                .settable_properties
                .extend(self.allow_property.iter().cloned());
            config.settable_pairs()?;
        }

        Ok(config)
    }
}
