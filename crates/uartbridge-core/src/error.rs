//! Error types for the bridge core.

use thiserror::Error;
use uartbridge_protocol::ProtocolError;

/// Errors raised by the serial side of the bridge.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The serial port failed to read or write.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial event source has shut down; no more events will arrive.
    #[error("serial channel closed")]
    Closed,

    /// The received data did not fit the read buffer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors raised by the messaging side of the bridge.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Publish attempted while the session is not connected.
    #[error("not connected to broker")]
    NotConnected,

    /// The transport rejected the request.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for serial operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for messaging operations.
pub type SessionResult<T> = Result<T, SessionError>;
