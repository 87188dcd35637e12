//! Headless workerbridge host.
//!
//! Reads worker→host envelopes as JSON lines, runs them through a
//! [`workerbridge_host::HostProxy`] drawing into a
//! [`workerbridge_host::MemorySurface`], and writes every host→worker
//! envelope back out as a JSON line.

mod args;
mod error;
mod session;

pub use args::Args;
pub use error::CliError;
pub use session::{run_session, SessionSummary};
