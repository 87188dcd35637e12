//! Forwarding host input events to the worker.

use std::collections::BTreeMap;

use workerbridge_envelope::{EventSource, HostEvent, Value};

use crate::error::Result;
use crate::transport::Outbound;

const DOCUMENT_EVENTS: &[&str] = &["keydown", "keyup", "keypress", "blur", "visibilitychange"];
const WINDOW_EVENTS: &[&str] = &["unload"];
const CANVAS_EVENTS: &[&str] = &[
    "mousedown",
    "mouseup",
    "mousemove",
    "DOMMouseScroll",
    "mousewheel",
    "mouseout",
];

const KEY_BACKSPACE: i64 = 8;
const KEY_TAB: i64 = 9;

/// Event names a registration collaborator should listen for on `source`.
pub fn listened_events(source: EventSource) -> &'static [&'static str] {
    match source {
        EventSource::Document => DOCUMENT_EVENTS,
        EventSource::Window => WINDOW_EVENTS,
        EventSource::Canvas => CANVAS_EVENTS,
    }
}

/// Copy the fields of an event that can cross to the worker.
///
/// Only number and string fields survive, and only when their name is not
/// all-uppercase (those are constants such as `DOM_KEY_LOCATION_LEFT`).
pub fn sanitize(event: &Value) -> Value {
    let Value::Map(fields) = event else {
        return Value::map();
    };

    let kept: BTreeMap<String, Value> = fields
        .iter()
        .filter(|(name, _)| **name != name.to_uppercase())
        .filter(|(_, value)| value.is_number_or_string())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Value::Map(kept)
}

/// Whether the host should suppress the event's default action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    pub prevent_default: bool,
}

impl Disposition {
    fn for_event(source: EventSource, event: &Value) -> Self {
        let prevent_default = match source {
            EventSource::Window => false,
            EventSource::Canvas => true,
            EventSource::Document => {
                let is_keydown = event.get("type").and_then(Value::as_str) == Some("keydown");
                let key = event.get("keyCode").and_then(Value::as_i64);
                // keypress only fires when keydown keeps its default.
                !is_keydown || matches!(key, Some(KEY_BACKSPACE) | Some(KEY_TAB))
            }
        };
        Self { prevent_default }
    }
}

#[derive(Debug, Clone)]
pub struct EventForwarder {
    outbound: Outbound,
}

impl EventForwarder {
    pub fn new(outbound: Outbound) -> Self {
        Self { outbound }
    }

    /// Send a sanitized copy of `event` to the worker.
    pub fn forward(&self, source: EventSource, event: &Value) -> Result<Disposition> {
        self.outbound.post(HostEvent::Input {
            source,
            event: sanitize(event),
        })?;
        Ok(Disposition::for_event(source, event))
    }

    /// Send an application message to the worker.
    pub fn post_custom(&self, data: Value, pre_main: bool) -> Result<()> {
        self.outbound.post(HostEvent::Custom { data, pre_main })
    }
}
