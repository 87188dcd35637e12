//! The host session: handshake, then the envelope loop.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use workerbridge_envelope::{Envelope, EventSource, HostEvent, Value, WorkerInit};

use crate::config::HostConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::events::{Disposition, EventForwarder};
use crate::surface::Surface;
use crate::transport::{ChannelTransport, Outbound};

/// Host side of one worker session.
///
/// # Example
///
/// ```ignore
/// let (host_end, worker_end) = ChannelTransport::bidirectional(config.channel_capacity);
/// let mut host = HostProxy::new(config, MemorySurface::new(300, 150), host_end)?;
/// host.dispatcher_mut().set_custom_handler(|data| println!("{:?}", data));
///
/// spawn_worker(worker_end);
/// host.run().await?;
/// ```
pub struct HostProxy<S> {
    config: HostConfig,
    dispatcher: Dispatcher<S>,
    events: EventForwarder,
    inbound: mpsc::Receiver<Envelope>,
    started: bool,
}

impl<S: Surface> HostProxy<S> {
    pub fn new(config: HostConfig, surface: S, transport: ChannelTransport) -> Result<Self> {
        let (sender, inbound) = transport.into_parts();
        let outbound = Outbound::new(sender);
        let dispatcher = Dispatcher::new(&config, surface, outbound.clone())?;

        Ok(Self {
            config,
            dispatcher,
            events: EventForwarder::new(outbound),
            inbound,
            started: false,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<S> {
        &mut self.dispatcher
    }

    pub fn surface(&self) -> &S {
        self.dispatcher.surface()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Send `worker-init`. Does nothing if already sent.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        let surface = self.dispatcher.surface();
        let (width, height) = surface.size();
        let init = WorkerInit {
            width,
            height,
            bounding_rect: surface.bounding_rect(),
            document_url: self.config.document_url.clone(),
            script_url: self.config.script_url.clone(),
        };

        self.dispatcher.outbound().post(HostEvent::WorkerInit(init))?;
        self.started = true;
        tracing::info!(
            width,
            height,
            script = %self.config.script_url,
            "worker-init sent, waiting for worker"
        );
        Ok(())
    }

    /// Forward a host input event to the worker.
    pub fn forward_event(&self, source: EventSource, event: &Value) -> Result<Disposition> {
        self.events.forward(source, event)
    }

    /// Send an application message to the worker.
    pub fn post_custom(&self, data: Value, pre_main: bool) -> Result<()> {
        self.events.post_custom(data, pre_main)
    }

    /// Process envelopes until the worker's side of the transport closes.
    ///
    /// Sends `worker-init` first if [`HostProxy::start`] was not called.
    /// A protocol violation ends the loop with an error. When the worker
    /// hangs up, the pending frame is presented and outstanding blob and
    /// image responses are sent before returning.
    pub async fn run(&mut self) -> Result<()> {
        self.start()?;

        let period = self.config.frame_interval();
        let mut frames = tokio::time::interval_at(Instant::now() + period, period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                inbound = self.inbound.recv() => match inbound {
                    Some(envelope) => self.dispatcher.handle(envelope)?,
                    None => break,
                },
                _ = frames.tick(), if self.dispatcher.render_scheduled() => {
                    self.dispatcher.execute_rendering_pass();
                }
                Some(event) = self.dispatcher.next_completion(), if self.dispatcher.has_pending() => {
                    self.dispatcher.outbound().post(event)?;
                }
            }
        }

        tracing::debug!("worker closed its channel");
        self.dispatcher.execute_rendering_pass();
        self.dispatcher.drain_completions().await
    }

    /// Like [`HostProxy::run`], but gives up after `limit`.
    ///
    /// Returns `Ok(false)` on timeout.
    pub async fn run_for(&mut self, limit: Duration) -> Result<bool> {
        match tokio::time::timeout(limit, self.run()).await {
            Ok(result) => result.map(|()| true),
            Err(_) => Ok(false),
        }
    }
}
