//! Transports between host and worker.
//!
//! A transport delivers envelopes in FIFO order per direction and shares no
//! memory between the two sides: every envelope is moved into the channel
//! and the sender never touches it again.

use std::sync::Arc;

use tokio::sync::mpsc;
use workerbridge_envelope::{Envelope, HostEvent};

use crate::error::{ProxyError, Result};

/// Sending half of a transport.
///
/// Sends never block. A transport that cannot accept an envelope reports
/// [`ProxyError::ChannelFull`] or [`ProxyError::ChannelClosed`].
pub trait Transport: Send + Sync {
    fn send(&self, envelope: Envelope) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.as_ref().send(envelope)
    }
}

/// Cloneable sending half of a [`ChannelTransport`].
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelSender {
    /// Send, waiting for capacity instead of failing when full.
    ///
    /// For producers outside the host loop, such as a reader feeding
    /// envelopes from a pipe.
    pub async fn send_wait(&self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| ProxyError::ChannelClosed)
    }
}

impl Transport for ChannelSender {
    fn send(&self, envelope: Envelope) -> Result<()> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ProxyError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => ProxyError::ChannelClosed,
        })
    }
}

/// One end of an in-process, bidirectional envelope channel.
///
/// # Example
///
/// ```ignore
/// let (host_end, mut worker_end) = ChannelTransport::bidirectional(64);
///
/// host_end.send(Envelope::new(Category::Deferred))?;
/// let received = worker_end.try_recv(); // Some(deferred envelope)
/// ```
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

impl ChannelTransport {
    /// Create a connected pair. Each end's sends arrive at the other's receiver.
    pub fn bidirectional(capacity: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(capacity.max(1));
        let (tx2, rx2) = mpsc::channel(capacity.max(1));

        let end1 = Self { tx: tx1, rx: rx2 };
        let end2 = Self { tx: tx2, rx: rx1 };

        (end1, end2)
    }

    /// A cloneable handle for sending from this end.
    pub fn sender(&self) -> ChannelSender {
        ChannelSender {
            tx: self.tx.clone(),
        }
    }

    /// Send to the other end without waiting.
    pub fn send(&self, envelope: Envelope) -> Result<()> {
        self.sender().send(envelope)
    }

    /// Receive the next envelope, waiting until one arrives.
    ///
    /// Returns `None` once the other end is gone and the channel is drained.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Everything currently queued for this end, in arrival order.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Split into sending and receiving halves.
    pub fn into_parts(self) -> (ChannelSender, mpsc::Receiver<Envelope>) {
        (ChannelSender { tx: self.tx }, self.rx)
    }
}

/// Host-side outbound handle shared by every handler.
#[derive(Clone)]
pub struct Outbound {
    transport: Arc<dyn Transport>,
}

impl Outbound {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Send an event to the worker.
    pub fn post(&self, event: HostEvent) -> Result<()> {
        let envelope = Envelope::from(event);
        tracing::trace!(
            category = %envelope.category,
            operation = ?envelope.operation,
            "host -> worker"
        );
        self.transport.send(envelope)
    }
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbound").finish_non_exhaustive()
    }
}
