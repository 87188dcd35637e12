//! Wire codecs for envelopes.
//!
//! In-process transports move `Envelope` values directly. Anything that
//! crosses a byte boundary (pipes, sockets, the headless CLI) goes through
//! an [`EnvelopeCodec`].

use crate::{Envelope, ProtocolError};

/// Codec for converting between envelopes and bytes.
pub trait EnvelopeCodec: Send + Sync {
    /// Encode an envelope into bytes.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Decode bytes into an envelope.
    ///
    /// Bytes that do not form an envelope (including a missing `category`)
    /// are a [`ProtocolError::Malformed`].
    fn decode(&self, bytes: &[u8]) -> Result<Envelope, ProtocolError>;
}

/// JSON codec. Byte buffers travel as base64 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl EnvelopeCodec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(envelope).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

impl<T: EnvelopeCodec + ?Sized> EnvelopeCodec for Box<T> {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        self.as_ref().encode(envelope)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, ProtocolError> {
        self.as_ref().decode(bytes)
    }
}
