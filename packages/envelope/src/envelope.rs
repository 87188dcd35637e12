//! The raw envelope: the unit of cross-boundary communication.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, Value};

/// Subsystem tag carried by every envelope.
///
/// Routing is driven entirely by the category; parsing a category string
/// that is not listed here is a [`ProtocolError::UnknownCategory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Stdout,
    Stderr,
    Window,
    Document,
    Canvas,
    Graphics,
    Tick,
    Tock,
    Image,
    BlobStore,
    Custom,
    Deferred,
    WorkerInit,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::Stdout,
        Category::Stderr,
        Category::Window,
        Category::Document,
        Category::Canvas,
        Category::Graphics,
        Category::Tick,
        Category::Tock,
        Category::Image,
        Category::BlobStore,
        Category::Custom,
        Category::Deferred,
        Category::WorkerInit,
    ];

    /// The tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stdout => "stdout",
            Category::Stderr => "stderr",
            Category::Window => "window",
            Category::Document => "document",
            Category::Canvas => "canvas",
            Category::Graphics => "graphics",
            Category::Tick => "tick",
            Category::Tock => "tock",
            Category::Image => "image",
            Category::BlobStore => "blobstore",
            Category::Custom => "custom",
            Category::Deferred => "deferred",
            Category::WorkerInit => "worker-init",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownCategory(s.to_string()))
    }
}

/// A single structured message crossing the host/worker boundary.
///
/// This is the untyped wire form. Inbound envelopes are turned into
/// [`crate::WorkerCommand`] before anything acts on them; outbound ones are
/// built from [`crate::HostEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Subsystem tag.
    pub category: String,

    /// Category-dependent secondary tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,

    /// Request identifier (tick/tock ids, image requests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    /// Category-specific data.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,

    /// The worker may handle this before its main entry point runs.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pre_main: bool,
}

impl Envelope {
    /// Create an envelope with no operation, id or payload.
    pub fn new(category: Category) -> Self {
        Self {
            category: category.as_str().to_string(),
            operation: None,
            id: None,
            payload: Value::Null,
            pre_main: false,
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_pre_main(mut self, pre_main: bool) -> Self {
        self.pre_main = pre_main;
        self
    }

    /// Parse the category tag.
    pub fn category(&self) -> Result<Category, ProtocolError> {
        self.category.parse()
    }

    /// The operation tag, if any.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }
}
