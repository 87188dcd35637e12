//! The host's drawing surface and graphics replay collaborators.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use workerbridge_envelope::{BoundingRect, ContextKind, ProtocolError, Value};

/// The visible drawing surface owned by the host.
pub trait Surface: Send {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Geometry reported to the worker after a resize.
    fn bounding_rect(&self) -> BoundingRect {
        let (width, height) = self.size();
        BoundingRect::from_size(f64::from(width), f64::from(height))
    }

    /// Create the drawing context the worker asked for.
    fn acquire_context(&mut self, kind: &ContextKind, attributes: &Value);

    /// Show a complete RGBA frame of `width * height * 4` bytes.
    fn present(&mut self, width: u32, height: u32, rgba: &[u8]);

    /// Mutate a property of a named host-side drawing object.
    ///
    /// Returns [`ProtocolError::UnknownObject`] when `object` does not exist.
    fn set_object_property(
        &mut self,
        object: &str,
        property: &str,
        value: Value,
    ) -> Result<(), ProtocolError>;
}

/// Replays opaque graphics commands for a non-bitmap context.
pub trait GraphicsClient: Send {
    fn on_message(&mut self, payload: Value);
}

/// Builds a graphics client when the worker acquires a non-bitmap context.
pub type GraphicsFactory = Box<dyn FnMut(&ContextKind, &Value) -> Box<dyn GraphicsClient> + Send>;

/// A graphics client that drops every command.
#[derive(Debug, Default)]
pub struct DiscardGraphics;

impl GraphicsClient for DiscardGraphics {
    fn on_message(&mut self, payload: Value) {
        tracing::trace!(?payload, "discarding graphics command");
    }
}

/// Factory producing [`DiscardGraphics`] clients.
pub fn discard_graphics() -> GraphicsFactory {
    Box::new(|kind: &ContextKind, _: &Value| -> Box<dyn GraphicsClient> {
        tracing::debug!(kind = kind.as_str(), "no graphics replay configured");
        Box::new(DiscardGraphics)
    })
}

/// A graphics client that keeps every command it receives.
///
/// Clones share the same log, so a test can keep one and hand the other
/// to the renderer.
#[derive(Debug, Clone, Default)]
pub struct RecordingGraphics {
    messages: Arc<Mutex<Vec<Value>>>,
}

impl RecordingGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// A factory handing out clones of this recorder.
    pub fn factory(&self) -> GraphicsFactory {
        let recorder = self.clone();
        Box::new(move |_: &ContextKind, _: &Value| -> Box<dyn GraphicsClient> {
            Box::new(recorder.clone())
        })
    }
}

impl GraphicsClient for RecordingGraphics {
    fn on_message(&mut self, payload: Value) {
        match self.messages.lock() {
            Ok(mut messages) => messages.push(payload),
            Err(poisoned) => poisoned.into_inner().push(payload),
        }
    }
}

/// A surface that lives entirely in memory.
///
/// Exposes a single drawing object, `style`, whose properties are recorded.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    context: Option<ContextKind>,
    frames: Vec<Vec<u8>>,
    properties: BTreeMap<(String, String), Value>,
}

impl MemorySurface {
    pub const STYLE: &'static str = "style";

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            context: None,
            frames: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Every frame presented so far, oldest first.
    pub fn presented_frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.frames.last().map(Vec::as_slice)
    }

    pub fn property(&self, object: &str, property: &str) -> Option<&Value> {
        self.properties
            .get(&(object.to_string(), property.to_string()))
    }

    pub fn context_kind(&self) -> Option<&ContextKind> {
        self.context.as_ref()
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn acquire_context(&mut self, kind: &ContextKind, _attributes: &Value) {
        self.context = Some(kind.clone());
    }

    fn present(&mut self, _width: u32, _height: u32, rgba: &[u8]) {
        self.frames.push(rgba.to_vec());
    }

    fn set_object_property(
        &mut self,
        object: &str,
        property: &str,
        value: Value,
    ) -> Result<(), ProtocolError> {
        if object != Self::STYLE {
            return Err(ProtocolError::UnknownObject(object.to_string()));
        }
        self.properties
            .insert((object.to_string(), property.to_string()), value);
        Ok(())
    }
}
