//! Envelope wire format for workerbridge.
//!
//! This crate defines what crosses the boundary between the host (which owns
//! the rendering surface, input devices and blob storage) and the worker
//! (which runs the application):
//! - `Value`: dynamically typed payload tree
//! - `Envelope`: the raw wire message, routed by its `category`
//! - `WorkerCommand` / `HostEvent`: closed, typed views of envelopes in each direction
//! - `EnvelopeCodec`: byte encoding for transports that need one
//!
//! # Example
//!
//! ```rust
//! use workerbridge_envelope::{Envelope, Category, WorkerCommand};
//!
//! let envelope = Envelope::new(Category::Tick).with_id(7);
//! let command = WorkerCommand::try_from(envelope).unwrap();
//! assert_eq!(command, WorkerCommand::Tick { id: 7 });
//! ```

mod codec;
mod envelope;
mod error;
mod message;
mod value;

pub use codec::{EnvelopeCodec, JsonCodec};
pub use envelope::{Category, Envelope};
pub use error::ProtocolError;
pub use message::{
    blob_op, canvas_op, image_op, BlobRequest, BoundingRect, CanvasCommand, ContextKind,
    EventSource, HostEvent, WorkerCommand, WorkerInit, BOUNDING_RECT_KEY,
};
pub use value::{json_to_value, value_to_json, Value};
