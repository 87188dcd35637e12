//! Everything the host's handlers operate on.

use std::sync::Arc;

use workerbridge_blob_store::BlobStore;

use crate::blob_proxy::BlobStoreProxy;
use crate::frame::FrameRenderer;
use crate::image_loader::{ImageDecoder, ImageLoader};
use crate::sink::{CustomHandler, LogSink, LoggingWindow, TracingSink, WindowHost};
use crate::tick::TickGate;
use crate::transport::Outbound;

/// Host-side state, owned by the dispatcher and handed to each handler.
pub struct HostContext<S> {
    pub(crate) outbound: Outbound,
    pub(crate) renderer: FrameRenderer<S>,
    pub(crate) blobs: BlobStoreProxy,
    pub(crate) ticks: TickGate,
    pub(crate) images: ImageLoader,
    pub(crate) sink: Box<dyn LogSink>,
    pub(crate) window: Box<dyn WindowHost>,
    pub(crate) custom: Option<Box<dyn CustomHandler>>,
    pub(crate) worker_responded: bool,
}

impl<S> HostContext<S> {
    pub fn new(
        outbound: Outbound,
        renderer: FrameRenderer<S>,
        blob_store: Arc<dyn BlobStore>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Self {
        Self {
            outbound,
            renderer,
            blobs: BlobStoreProxy::new(blob_store),
            ticks: TickGate::new(),
            images: ImageLoader::new(decoder),
            sink: Box::new(TracingSink),
            window: Box::new(LoggingWindow),
            custom: None,
            worker_responded: false,
        }
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    pub fn renderer(&self) -> &FrameRenderer<S> {
        &self.renderer
    }

    pub fn blobs(&self) -> &BlobStoreProxy {
        &self.blobs
    }

    pub fn ticks(&self) -> &TickGate {
        &self.ticks
    }

    pub fn images(&self) -> &ImageLoader {
        &self.images
    }

    /// Whether any envelope from the worker has been accepted yet.
    pub fn worker_responded(&self) -> bool {
        self.worker_responded
    }
}
