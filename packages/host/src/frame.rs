//! Frame pipeline: capacity-1 frame buffer feeding the host surface.
//!
//! The worker never waits for a frame to be drawn. A `render` stores the
//! pixels and schedules one rendering pass; renders arriving before that
//! pass overwrite the stored pixels, so only the newest frame is shown.

use std::collections::BTreeSet;

use workerbridge_envelope::{ContextKind, HostEvent, ProtocolError, Value};

use crate::error::Result;
use crate::surface::{discard_graphics, GraphicsClient, GraphicsFactory, Surface};
use crate::transport::Outbound;

/// What happened to a frame handed to [`FrameRenderer::on_render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderDisposition {
    /// A rendering pass was scheduled for this frame.
    Scheduled,
    /// A pass was already scheduled; this frame replaced the pending one.
    Coalesced,
}

/// The single pending frame.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending_pixels: Vec<u8>,
    render_scheduled: bool,
}

impl FrameBuffer {
    pub fn pending_pixels(&self) -> &[u8] {
        &self.pending_pixels
    }

    pub fn render_scheduled(&self) -> bool {
        self.render_scheduled
    }

    fn put(&mut self, pixels: Vec<u8>) -> RenderDisposition {
        self.pending_pixels = pixels;
        if self.render_scheduled {
            RenderDisposition::Coalesced
        } else {
            self.render_scheduled = true;
            RenderDisposition::Scheduled
        }
    }

    fn take(&mut self) -> Option<Vec<u8>> {
        if !self.render_scheduled {
            return None;
        }
        self.render_scheduled = false;
        Some(std::mem::take(&mut self.pending_pixels))
    }
}

pub struct FrameRenderer<S> {
    surface: S,
    frame: FrameBuffer,
    bitmap: Option<Vec<u8>>,
    context: Option<ContextKind>,
    graphics: Option<Box<dyn GraphicsClient>>,
    graphics_factory: GraphicsFactory,
    settable: BTreeSet<(String, String)>,
    passes: u64,
    coalesced: u64,
}

/// Largest surface width or height the renderer will allocate a bitmap for.
pub const MAX_SURFACE_SIDE: u32 = 16384;

const SIDE_LIMIT: &str = "an integer no larger than 16384";

/// Byte length of an RGBA bitmap, refusing sizes beyond [`MAX_SURFACE_SIDE`].
fn bitmap_len(width: u32, height: u32) -> std::result::Result<usize, ProtocolError> {
    for (field, side) in [("width", width), ("height", height)] {
        if side > MAX_SURFACE_SIDE {
            return Err(ProtocolError::InvalidField {
                category: "canvas",
                field,
                expected: SIDE_LIMIT,
            });
        }
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(ProtocolError::InvalidField {
            category: "canvas",
            field: "width",
            expected: SIDE_LIMIT,
        })
}

impl<S: Surface> FrameRenderer<S> {
    /// `settable` is the allow-list of `(object, property)` pairs for
    /// [`FrameRenderer::set_property`].
    pub fn new(surface: S, settable: BTreeSet<(String, String)>) -> Self {
        Self {
            surface,
            frame: FrameBuffer::default(),
            bitmap: None,
            context: None,
            graphics: None,
            graphics_factory: discard_graphics(),
            settable,
            passes: 0,
            coalesced: 0,
        }
    }

    pub fn set_graphics_factory(&mut self, factory: GraphicsFactory) {
        self.graphics_factory = factory;
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn render_scheduled(&self) -> bool {
        self.frame.render_scheduled()
    }

    pub fn bitmap(&self) -> Option<&[u8]> {
        self.bitmap.as_deref()
    }

    pub fn context_kind(&self) -> Option<&ContextKind> {
        self.context.as_ref()
    }

    /// Rendering passes that presented a frame.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Frames overwritten before they were presented.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    pub fn on_render(&mut self, pixels: Vec<u8>) -> RenderDisposition {
        let disposition = self.frame.put(pixels);
        if disposition == RenderDisposition::Coalesced {
            self.coalesced += 1;
            tracing::trace!("frame coalesced");
        }
        disposition
    }

    /// Present the pending frame, if a pass is scheduled.
    ///
    /// Returns whether a frame reached the surface.
    pub fn execute_rendering_pass(&mut self) -> bool {
        let Some(pixels) = self.frame.take() else {
            return false;
        };

        let Some(bitmap) = self.bitmap.as_mut() else {
            tracing::warn!("render received without a 2d context, dropping frame");
            return false;
        };

        if pixels.len() != bitmap.len() {
            tracing::warn!(
                expected = bitmap.len(),
                received = pixels.len(),
                "frame size does not match surface"
            );
        }
        let n = pixels.len().min(bitmap.len());
        bitmap[..n].copy_from_slice(&pixels[..n]);

        let (width, height) = self.surface.size();
        self.surface.present(width, height, bitmap);
        self.passes += 1;
        true
    }

    pub fn acquire_context(
        &mut self,
        kind: ContextKind,
        attributes: Value,
    ) -> std::result::Result<(), ProtocolError> {
        tracing::debug!(kind = kind.as_str(), "acquiring context");
        let len = match &kind {
            ContextKind::Bitmap => {
                let (width, height) = self.surface.size();
                Some(bitmap_len(width, height)?)
            }
            ContextKind::Graphics(_) => None,
        };
        self.surface.acquire_context(&kind, &attributes);

        match len {
            Some(len) => {
                self.bitmap = Some(vec![0; len]);
                self.graphics = None;
            }
            None => {
                self.graphics = Some((self.graphics_factory)(&kind, &attributes));
                self.bitmap = None;
            }
        }
        self.context = Some(kind);
        Ok(())
    }

    /// Resize the surface and tell the worker its new geometry.
    ///
    /// Sizes beyond [`MAX_SURFACE_SIDE`] are rejected before the surface
    /// changes.
    pub fn resize(&mut self, width: u32, height: u32, outbound: &Outbound) -> Result<()> {
        let len = bitmap_len(width, height)?;
        self.surface.resize(width, height);
        if self.bitmap.is_some() {
            self.bitmap = Some(vec![0; len]);
        }
        outbound.post(HostEvent::Geometry(self.surface.bounding_rect()))
    }

    pub fn set_property(
        &mut self,
        object: String,
        property: String,
        value: Value,
    ) -> std::result::Result<(), ProtocolError> {
        let key = (object, property);
        if !self.settable.contains(&key) {
            let (object, property) = key;
            return Err(ProtocolError::PropertyNotAllowed { object, property });
        }
        self.surface.set_object_property(&key.0, &key.1, value)
    }

    pub fn graphics(&mut self, payload: Value) -> std::result::Result<(), ProtocolError> {
        let client = self
            .graphics
            .as_mut()
            .ok_or(ProtocolError::MissingGraphicsContext)?;
        client.on_message(payload);
        Ok(())
    }
}
