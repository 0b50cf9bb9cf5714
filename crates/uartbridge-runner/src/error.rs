//! Runner error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The serial port could not be opened or cloned.
    #[error("serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// The serial read loop ended without a shutdown request.
    #[error("serial port {port} stopped delivering data")]
    SerialLost { port: String },

    /// The async runtime or a worker thread could not be started.
    #[error("failed to start: {0}")]
    Startup(#[from] std::io::Error),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// The metrics exporter could not be installed.
    #[error("metrics exporter: {0}")]
    Metrics(String),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
