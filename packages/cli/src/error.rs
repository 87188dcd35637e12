use thiserror::Error;
use workerbridge_envelope::ProtocolError;
use workerbridge_host::{ConfigError, ProxyError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An input line that is not an envelope.
    #[error("line {line}: {error}")]
    Decode {
        line: usize,
        #[source]
        error: ProtocolError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Whether the worker broke the protocol, as opposed to a local failure.
    pub fn is_protocol(&self) -> bool {
        match self {
            CliError::Decode { .. } => true,
            CliError::Proxy(e) => e.is_protocol(),
            _ => false,
        }
    }

    /// Process exit code: 2 for protocol violations, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_protocol() {
            2
        } else {
            1
        }
    }
}
