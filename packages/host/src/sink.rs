//! Pass-through collaborators: worker output, window methods, custom messages.

use std::sync::{Arc, Mutex};

use workerbridge_envelope::Value;

/// Which worker output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Receives the worker's stdout and stderr text verbatim.
pub trait LogSink: Send {
    fn write(&mut self, stream: Stream, text: &str);
}

/// Writes worker output as tracing events on `worker::stdout` and
/// `worker::stderr`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write(&mut self, stream: Stream, text: &str) {
        match stream {
            Stream::Stdout => tracing::info!(target: "worker::stdout", "{}", text),
            Stream::Stderr => tracing::warn!(target: "worker::stderr", "{}", text),
        }
    }
}

/// Keeps worker output in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct CapturingSink {
    lines: Arc<Mutex<Vec<(Stream, String)>>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Stream, String)> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for CapturingSink {
    fn write(&mut self, stream: Stream, text: &str) {
        let line = (stream, text.to_string());
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}

/// Host window methods the worker may invoke by name.
pub trait WindowHost: Send {
    fn call(&mut self, method: &str);
}

/// Logs window calls without acting on them.
#[derive(Debug, Default)]
pub struct LoggingWindow;

impl WindowHost for LoggingWindow {
    fn call(&mut self, method: &str) {
        tracing::info!(method, "worker invoked window method");
    }
}

/// Remembers every window method the worker invoked. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingWindow {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl WindowHost for RecordingWindow {
    fn call(&mut self, method: &str) {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(method.to_string()),
            Err(poisoned) => poisoned.into_inner().push(method.to_string()),
        }
    }
}

/// Application handler for `custom` messages from the worker.
pub trait CustomHandler: Send {
    fn on_custom_message(&mut self, data: Value);
}

impl<F> CustomHandler for F
where
    F: FnMut(Value) + Send,
{
    fn on_custom_message(&mut self, data: Value) {
        self(data)
    }
}
