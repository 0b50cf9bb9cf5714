//! Error types for the UART command protocol.

use thiserror::Error;

/// Errors that can occur when working with the command protocol.
///
/// Malformed tokens are not errors; they are dropped by the extractor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A read was requested that does not fit in the serial buffer.
    #[error("buffer overflow: max {max} bytes, got {actual}")]
    BufferOverflow { max: usize, actual: usize },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
