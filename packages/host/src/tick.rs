//! Tick/tock pacing.
//!
//! The worker sends `tick(id)` once per simulation step and waits for the
//! matching `tock(id)` before sending the next one.

use workerbridge_envelope::HostEvent;

use crate::error::Result;
use crate::transport::Outbound;

#[derive(Debug, Default)]
pub struct TickGate {
    current: Option<u64>,
    echoed: u64,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the most recent tick.
    pub fn current_tick_id(&self) -> Option<u64> {
        self.current
    }

    /// Tocks sent so far.
    pub fn echoed(&self) -> u64 {
        self.echoed
    }

    /// Record the tick and answer it immediately.
    pub fn on_tick(&mut self, id: u64, outbound: &Outbound) -> Result<()> {
        self.current = Some(id);
        outbound.post(HostEvent::Tock { id })?;
        self.echoed += 1;
        Ok(())
    }
}
