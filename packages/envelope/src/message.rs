//! Typed views of envelopes.
//!
//! `WorkerCommand` is everything the worker may ask of the host and
//! `HostEvent` is everything the host may tell the worker. Both are closed
//! enums, so the dispatcher's `match` is checked for exhaustiveness at
//! compile time; the only place an unknown tag can appear is the conversion
//! from a raw [`Envelope`], which rejects it before any handler runs.

use std::collections::BTreeMap;

use crate::{Category, Envelope, ProtocolError, Value};

/// Canvas operation tags.
pub mod canvas_op {
    pub const ACQUIRE_CONTEXT: &str = "acquire-context";
    pub const RESIZE: &str = "resize";
    pub const RENDER: &str = "render";
    pub const SET_PROPERTY: &str = "set-property";
}

/// Blob store operation tags.
pub mod blob_op {
    pub const LOAD: &str = "load";
    pub const STORE: &str = "store";
    pub const RESPONSE: &str = "response";
}

/// Image operation tags.
pub mod image_op {
    pub const SRC: &str = "src";
    pub const ONLOAD: &str = "onload";
    pub const ONERROR: &str = "onerror";
}

/// Payload key carrying the surface geometry in host→worker `canvas` envelopes.
pub const BOUNDING_RECT_KEY: &str = "boundingClientRect";

/// Kind of drawing context the worker asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    /// The simple bitmap context (`2d`); frames arrive as pixel buffers.
    Bitmap,
    /// Anything else (`webgl`, `webgl2`, ...); commands are replayed through
    /// a graphics handle.
    Graphics(String),
}

impl ContextKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "2d" => ContextKind::Bitmap,
            other => ContextKind::Graphics(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContextKind::Bitmap => "2d",
            ContextKind::Graphics(kind) => kind,
        }
    }
}

/// Which host object an input event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    Document,
    Window,
    Canvas,
}

impl EventSource {
    pub fn category(&self) -> Category {
        match self {
            EventSource::Document => Category::Document,
            EventSource::Window => Category::Window,
            EventSource::Canvas => Category::Canvas,
        }
    }
}

/// Bounding geometry of the rendering surface, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl BoundingRect {
    /// A rect anchored at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            right: width,
            bottom: height,
            ..Self::default()
        }
    }

    pub fn to_value(&self) -> Value {
        Value::map()
            .with("x", self.x)
            .with("y", self.y)
            .with("width", self.width)
            .with("height", self.height)
            .with("top", self.top)
            .with("right", self.right)
            .with("bottom", self.bottom)
            .with("left", self.left)
    }

    /// Missing or non-numeric fields read as zero.
    pub fn from_value(value: &Value) -> Self {
        let field = |name: &str| value.get(name).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            x: field("x"),
            y: field("y"),
            width: field("width"),
            height: field("height"),
            top: field("top"),
            right: field("right"),
            bottom: field("bottom"),
            left: field("left"),
        }
    }
}

/// State the worker needs before anything else: sent once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerInit {
    pub width: u32,
    pub height: u32,
    pub bounding_rect: BoundingRect,
    pub document_url: String,
    pub script_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCommand {
    AcquireContext {
        kind: ContextKind,
        attributes: Value,
    },
    Resize {
        width: u32,
        height: u32,
    },
    Render {
        pixels: Vec<u8>,
    },
    SetProperty {
        object: String,
        property: String,
        value: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlobRequest {
    Load {
        store: String,
        blob: String,
    },
    Store {
        store: String,
        blob: String,
        bytes: Vec<u8>,
    },
}

/// A worker→host command.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    Stdout(String),
    Stderr(String),
    Window { method: String },
    Canvas(CanvasCommand),
    Graphics(Value),
    Tick { id: u64 },
    Image { id: u64, src: String },
    Blob(BlobRequest),
    Custom(Value),
    Deferred,
}

/// A host→worker event.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    WorkerInit(WorkerInit),
    /// Surface geometry after a resize.
    Geometry(BoundingRect),
    /// A sanitized input/window/document event.
    Input { source: EventSource, event: Value },
    Tock { id: u64 },
    ImageLoaded {
        id: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
    },
    ImageFailed { id: u64 },
    /// Result of a blob load; `None` when the blob could not be read.
    BlobLoaded { blob: Option<Vec<u8>> },
    /// Result of a blob store.
    BlobStored { error: bool },
    Custom { data: Value, pre_main: bool },
    Deferred,
}

/// Field access over a map payload, producing protocol errors that name
/// the category and field.
struct Fields {
    category: &'static str,
    map: BTreeMap<String, Value>,
}

impl Fields {
    fn new(category: Category, payload: Value) -> Result<Self, ProtocolError> {
        let category = category.as_str();
        let map = match payload {
            Value::Map(map) => map,
            Value::Null => BTreeMap::new(),
            _ => return Err(ProtocolError::invalid(category, "payload", "a map")),
        };
        Ok(Self { category, map })
    }

    fn take(&mut self, field: &'static str) -> Result<Value, ProtocolError> {
        self.map
            .remove(field)
            .ok_or_else(|| ProtocolError::missing(self.category, field))
    }

    fn take_or_null(&mut self, field: &str) -> Value {
        self.map.remove(field).unwrap_or_default()
    }

    fn contains(&self, field: &str) -> bool {
        self.map.contains_key(field)
    }

    fn string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        match self.take(field)? {
            Value::String(s) => Ok(s),
            _ => Err(ProtocolError::invalid(self.category, field, "a string")),
        }
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, ProtocolError> {
        self.take(field)?
            .as_i64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ProtocolError::invalid(self.category, field, "a non-negative integer"))
    }

    fn bytes(&mut self, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
        self.take(field)?
            .into_bytes()
            .ok_or_else(|| ProtocolError::invalid(self.category, field, "a byte buffer"))
    }
}

fn require_id(category: Category, id: Option<u64>) -> Result<u64, ProtocolError> {
    id.ok_or_else(|| ProtocolError::missing(category.as_str(), "id"))
}

fn unknown_operation(category: Category, operation: Option<String>) -> ProtocolError {
    ProtocolError::UnknownOperation {
        category: category.as_str(),
        operation,
    }
}

fn wrong_direction(category: Category) -> ProtocolError {
    ProtocolError::WrongDirection {
        category: category.as_str(),
    }
}

fn text_payload(category: Category, payload: Value) -> Result<String, ProtocolError> {
    match payload {
        Value::String(s) => Ok(s),
        _ => Err(ProtocolError::invalid(
            category.as_str(),
            "payload",
            "a string",
        )),
    }
}

impl TryFrom<Envelope> for WorkerCommand {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let category = envelope.category()?;
        let Envelope {
            operation,
            id,
            payload,
            ..
        } = envelope;

        let operationless = matches!(
            category,
            Category::Stdout
                | Category::Stderr
                | Category::Graphics
                | Category::Tick
                | Category::Custom
                | Category::Deferred
        );
        if operationless && operation.is_some() {
            return Err(unknown_operation(category, operation));
        }

        match category {
            Category::Stdout => Ok(WorkerCommand::Stdout(text_payload(category, payload)?)),
            Category::Stderr => Ok(WorkerCommand::Stderr(text_payload(category, payload)?)),
            Category::Window => match operation {
                Some(method) if !method.is_empty() => Ok(WorkerCommand::Window { method }),
                other => Err(unknown_operation(category, other)),
            },
            Category::Canvas => {
                let mut fields = Fields::new(category, payload)?;
                let command = match operation.as_deref() {
                    Some(canvas_op::ACQUIRE_CONTEXT) => CanvasCommand::AcquireContext {
                        kind: ContextKind::parse(&fields.string("kind")?),
                        attributes: fields.take_or_null("attributes"),
                    },
                    Some(canvas_op::RESIZE) => CanvasCommand::Resize {
                        width: fields.u32("width")?,
                        height: fields.u32("height")?,
                    },
                    Some(canvas_op::RENDER) => CanvasCommand::Render {
                        pixels: fields.bytes("pixels")?,
                    },
                    Some(canvas_op::SET_PROPERTY) => CanvasCommand::SetProperty {
                        object: fields.string("object")?,
                        property: fields.string("property")?,
                        value: fields.take_or_null("value"),
                    },
                    _ => return Err(unknown_operation(category, operation)),
                };
                Ok(WorkerCommand::Canvas(command))
            }
            Category::Graphics => Ok(WorkerCommand::Graphics(payload)),
            Category::Tick => Ok(WorkerCommand::Tick {
                id: require_id(category, id)?,
            }),
            Category::Image => {
                if operation.as_deref() != Some(image_op::SRC) {
                    return Err(unknown_operation(category, operation));
                }
                let id = require_id(category, id)?;
                let mut fields = Fields::new(category, payload)?;
                Ok(WorkerCommand::Image {
                    id,
                    src: fields.string("src")?,
                })
            }
            Category::BlobStore => {
                let mut fields = Fields::new(category, payload)?;
                let request = match operation.as_deref() {
                    Some(blob_op::LOAD) => BlobRequest::Load {
                        store: fields.string("store")?,
                        blob: fields.string("blob")?,
                    },
                    Some(blob_op::STORE) => BlobRequest::Store {
                        store: fields.string("store")?,
                        blob: fields.string("blob")?,
                        bytes: fields.bytes("bytes")?,
                    },
                    _ => return Err(unknown_operation(category, operation)),
                };
                Ok(WorkerCommand::Blob(request))
            }
            Category::Custom => Ok(WorkerCommand::Custom(payload)),
            Category::Deferred => Ok(WorkerCommand::Deferred),
            Category::Document | Category::Tock | Category::WorkerInit => {
                Err(wrong_direction(category))
            }
        }
    }
}

impl From<WorkerCommand> for Envelope {
    fn from(command: WorkerCommand) -> Self {
        match command {
            WorkerCommand::Stdout(text) => Envelope::new(Category::Stdout).with_payload(text),
            WorkerCommand::Stderr(text) => Envelope::new(Category::Stderr).with_payload(text),
            WorkerCommand::Window { method } => {
                Envelope::new(Category::Window).with_operation(method)
            }
            WorkerCommand::Canvas(command) => {
                let envelope = Envelope::new(Category::Canvas);
                match command {
                    CanvasCommand::AcquireContext { kind, attributes } => envelope
                        .with_operation(canvas_op::ACQUIRE_CONTEXT)
                        .with_payload(
                            Value::map()
                                .with("kind", kind.as_str())
                                .with("attributes", attributes),
                        ),
                    CanvasCommand::Resize { width, height } => envelope
                        .with_operation(canvas_op::RESIZE)
                        .with_payload(Value::map().with("width", width).with("height", height)),
                    CanvasCommand::Render { pixels } => envelope
                        .with_operation(canvas_op::RENDER)
                        .with_payload(Value::map().with("pixels", pixels)),
                    CanvasCommand::SetProperty {
                        object,
                        property,
                        value,
                    } => envelope
                        .with_operation(canvas_op::SET_PROPERTY)
                        .with_payload(
                            Value::map()
                                .with("object", object)
                                .with("property", property)
                                .with("value", value),
                        ),
                }
            }
            WorkerCommand::Graphics(payload) => {
                Envelope::new(Category::Graphics).with_payload(payload)
            }
            WorkerCommand::Tick { id } => Envelope::new(Category::Tick).with_id(id),
            WorkerCommand::Image { id, src } => Envelope::new(Category::Image)
                .with_operation(image_op::SRC)
                .with_id(id)
                .with_payload(Value::map().with("src", src)),
            WorkerCommand::Blob(BlobRequest::Load { store, blob }) => {
                Envelope::new(Category::BlobStore)
                    .with_operation(blob_op::LOAD)
                    .with_payload(Value::map().with("store", store).with("blob", blob))
            }
            WorkerCommand::Blob(BlobRequest::Store { store, blob, bytes }) => {
                Envelope::new(Category::BlobStore)
                    .with_operation(blob_op::STORE)
                    .with_payload(
                        Value::map()
                            .with("store", store)
                            .with("blob", blob)
                            .with("bytes", bytes),
                    )
            }
            WorkerCommand::Custom(payload) => Envelope::new(Category::Custom).with_payload(payload),
            WorkerCommand::Deferred => Envelope::new(Category::Deferred),
        }
    }
}

impl From<HostEvent> for Envelope {
    fn from(event: HostEvent) -> Self {
        match event {
            HostEvent::WorkerInit(init) => Envelope::new(Category::WorkerInit)
                .with_pre_main(true)
                .with_payload(
                    Value::map()
                        .with("width", init.width)
                        .with("height", init.height)
                        .with(BOUNDING_RECT_KEY, init.bounding_rect.to_value())
                        .with("URL", init.document_url)
                        .with("currentScriptUrl", init.script_url),
                ),
            HostEvent::Geometry(rect) => Envelope::new(Category::Canvas)
                .with_payload(Value::map().with(BOUNDING_RECT_KEY, rect.to_value())),
            HostEvent::Input { source, event } => {
                Envelope::new(source.category()).with_payload(event)
            }
            HostEvent::Tock { id } => Envelope::new(Category::Tock).with_id(id),
            HostEvent::ImageLoaded {
                id,
                width,
                height,
                data,
            } => Envelope::new(Category::Image)
                .with_operation(image_op::ONLOAD)
                .with_id(id)
                .with_pre_main(true)
                .with_payload(
                    Value::map()
                        .with("width", width)
                        .with("height", height)
                        .with("data", data),
                ),
            HostEvent::ImageFailed { id } => Envelope::new(Category::Image)
                .with_operation(image_op::ONERROR)
                .with_id(id)
                .with_pre_main(true),
            HostEvent::BlobLoaded { blob } => Envelope::new(Category::BlobStore)
                .with_operation(blob_op::RESPONSE)
                .with_payload(Value::map().with("blob", blob)),
            HostEvent::BlobStored { error } => Envelope::new(Category::BlobStore)
                .with_operation(blob_op::RESPONSE)
                .with_payload(Value::map().with("error", error)),
            HostEvent::Custom { data, pre_main } => Envelope::new(Category::Custom)
                .with_pre_main(pre_main)
                .with_payload(data),
            HostEvent::Deferred => Envelope::new(Category::Deferred),
        }
    }
}

impl TryFrom<Envelope> for HostEvent {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let category = envelope.category()?;
        let Envelope {
            operation,
            id,
            payload,
            pre_main,
            ..
        } = envelope;

        match category {
            Category::WorkerInit => {
                let mut fields = Fields::new(category, payload)?;
                Ok(HostEvent::WorkerInit(WorkerInit {
                    width: fields.u32("width")?,
                    height: fields.u32("height")?,
                    bounding_rect: BoundingRect::from_value(&fields.take(BOUNDING_RECT_KEY)?),
                    document_url: fields.string("URL")?,
                    script_url: fields.string("currentScriptUrl")?,
                }))
            }
            Category::Canvas => {
                let geometry = payload.get(BOUNDING_RECT_KEY).map(BoundingRect::from_value);
                match geometry {
                    Some(rect) => Ok(HostEvent::Geometry(rect)),
                    None => Ok(HostEvent::Input {
                        source: EventSource::Canvas,
                        event: payload,
                    }),
                }
            }
            Category::Document => Ok(HostEvent::Input {
                source: EventSource::Document,
                event: payload,
            }),
            Category::Window => Ok(HostEvent::Input {
                source: EventSource::Window,
                event: payload,
            }),
            Category::Tock => Ok(HostEvent::Tock {
                id: require_id(category, id)?,
            }),
            Category::Image => {
                let id = require_id(category, id)?;
                match operation.as_deref() {
                    Some(image_op::ONLOAD) => {
                        let mut fields = Fields::new(category, payload)?;
                        Ok(HostEvent::ImageLoaded {
                            id,
                            width: fields.u32("width")?,
                            height: fields.u32("height")?,
                            data: fields.bytes("data")?,
                        })
                    }
                    Some(image_op::ONERROR) => Ok(HostEvent::ImageFailed { id }),
                    _ => Err(unknown_operation(category, operation)),
                }
            }
            Category::BlobStore => {
                if operation.as_deref() != Some(blob_op::RESPONSE) {
                    return Err(unknown_operation(category, operation));
                }
                let mut fields = Fields::new(category, payload)?;
                if fields.contains("error") {
                    let error = fields
                        .take("error")?
                        .as_bool()
                        .ok_or_else(|| ProtocolError::invalid("blobstore", "error", "a boolean"))?;
                    Ok(HostEvent::BlobStored { error })
                } else {
                    let blob = fields.take_or_null("blob");
                    let blob = if blob.is_null() {
                        None
                    } else {
                        Some(blob.into_bytes().ok_or_else(|| {
                            ProtocolError::invalid("blobstore", "blob", "a byte buffer")
                        })?)
                    };
                    Ok(HostEvent::BlobLoaded { blob })
                }
            }
            Category::Custom => Ok(HostEvent::Custom {
                data: payload,
                pre_main,
            }),
            Category::Deferred => Ok(HostEvent::Deferred),
            Category::Stdout | Category::Stderr | Category::Graphics | Category::Tick => {
                Err(wrong_direction(category))
            }
        }
    }
}
