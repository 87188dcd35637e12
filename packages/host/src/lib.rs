//! Host side of workerbridge.
//!
//! The host owns the drawing surface, input devices and blob storage. The
//! worker owns the application and drives the host with envelopes:
//!
//! - `Dispatcher`: decodes each worker envelope and routes it to one handler
//! - `FrameRenderer`: capacity-1 frame buffer presented once per frame tick
//! - `BlobStoreProxy`: blob load/store with one in-order response per request
//! - `TickGate`: answers every `tick` with a `tock`
//! - `ImageLoader`: decodes images the worker asks for
//! - `EventForwarder`: sanitized host input events for the worker
//! - `HostProxy`: handshake and the envelope loop tying it together
//!
//! The surface, graphics replay, window methods and output sinks are traits,
//! so the same host runs against a real window or entirely in memory.

pub mod blob_proxy;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod frame;
pub mod host;
pub mod image_loader;
pub mod sink;
pub mod surface;
pub mod tick;
pub mod transport;

pub use blob_proxy::{BlobStoreProxy, PendingBlobRequest};
pub use config::{ConfigError, HostConfig};
pub use context::HostContext;
pub use dispatcher::Dispatcher;
pub use error::{ProxyError, Result};
pub use events::{listened_events, sanitize, Disposition, EventForwarder};
pub use frame::{FrameBuffer, FrameRenderer, RenderDisposition, MAX_SURFACE_SIDE};
pub use host::HostProxy;
pub use image_loader::{DecodedImage, FileImageDecoder, ImageDecoder, ImageError, ImageLoader};
pub use sink::{
    CapturingSink, CustomHandler, LogSink, LoggingWindow, RecordingWindow, Stream, TracingSink,
    WindowHost,
};
pub use surface::{
    discard_graphics, DiscardGraphics, GraphicsClient, GraphicsFactory, MemorySurface,
    RecordingGraphics, Surface,
};
pub use tick::TickGate;
pub use transport::{ChannelSender, ChannelTransport, Outbound, Transport};
