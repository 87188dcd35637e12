//! Image loading for the worker.
//!
//! The worker cannot decode images itself. It sends `image/src` with an id,
//! the host decodes the source to RGBA and answers `image/onload` or
//! `image/onerror` with the same id.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use thiserror::Error;
use url::Url;
use workerbridge_envelope::HostEvent;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// A decoded image in row-major RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[async_trait]
pub trait ImageDecoder: Send + Sync {
    async fn decode(&self, src: &str) -> Result<DecodedImage, ImageError>;
}

/// Decodes local files. Accepts plain paths and `file://` URLs; relative
/// paths resolve against the base directory.
#[derive(Debug, Clone)]
pub struct FileImageDecoder {
    base_dir: PathBuf,
}

impl FileImageDecoder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, src: &str) -> Result<PathBuf, ImageError> {
        if let Ok(url) = Url::parse(src) {
            // Windows drive letters parse as one-letter schemes.
            if url.scheme().len() > 1 {
                if url.scheme() != "file" {
                    return Err(ImageError::UnsupportedSource(src.to_string()));
                }
                return url
                    .to_file_path()
                    .map_err(|()| ImageError::UnsupportedSource(src.to_string()));
            }
        }

        let path = Path::new(src);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base_dir.join(path))
        }
    }
}

impl Default for FileImageDecoder {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl ImageDecoder for FileImageDecoder {
    async fn decode(&self, src: &str) -> Result<DecodedImage, ImageError> {
        let path = self.resolve(src)?;
        tracing::debug!("Decoding {}...", path.display());

        let bytes = tokio::fs::read(&path).await?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        Ok(DecodedImage {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }
}

/// Image requests in flight. Responses leave in completion order.
pub struct ImageLoader {
    decoder: Arc<dyn ImageDecoder>,
    in_flight: FuturesUnordered<BoxFuture<'static, HostEvent>>,
}

impl ImageLoader {
    pub fn new(decoder: Arc<dyn ImageDecoder>) -> Self {
        Self {
            decoder,
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn request(&mut self, id: u64, src: String) {
        let decoder = Arc::clone(&self.decoder);
        let pending = async move {
            match decoder.decode(&src).await {
                Ok(image) => HostEvent::ImageLoaded {
                    id,
                    width: image.width,
                    height: image.height,
                    data: image.rgba,
                },
                Err(error) => {
                    tracing::warn!(id, %src, %error, "image load failed");
                    HostEvent::ImageFailed { id }
                }
            }
        }
        .boxed();
        self.in_flight.push(pending);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// `Ready(None)` means nothing is in flight.
    pub fn poll_next_loaded(&mut self, cx: &mut Context<'_>) -> Poll<Option<HostEvent>> {
        self.in_flight.poll_next_unpin(cx)
    }
}
