//! Bounded receive buffer for one serial read cycle.

use bytes::BytesMut;

use crate::constants::{FRAME_DELIMITER, SERIAL_BUFFER_SIZE};
use crate::error::ProtocolError;
use crate::extract::{commands, InboundCommand};
use crate::tokenizer::{tokenize, Terminated, Tokens};

/// Receive buffer owned by the serial read loop.
///
/// Each cycle starts from a zero-filled region of the requested size, and the
/// valid length is tracked alongside the data, so bytes from an earlier cycle
/// are never visible to the tokenizer.
#[derive(Debug)]
pub struct SerialBuffer {
    /// Valid bytes of the current cycle.
    data: BytesMut,
    /// Maximum number of bytes per cycle.
    capacity: usize,
}

impl Default for SerialBuffer {
    fn default() -> Self {
        Self::new(SERIAL_BUFFER_SIZE)
    }
}

impl SerialBuffer {
    /// Create a buffer holding at most `capacity` bytes per cycle.
    pub fn new(capacity: usize) -> Self {
        SerialBuffer {
            data: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of bytes per cycle.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid bytes in the current cycle.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the current cycle holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Discard the current cycle.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Start a new cycle and fill it with up to `want` bytes.
    ///
    /// `read` receives a zero-filled slice of `want` bytes and returns how
    /// many of them it wrote. A request larger than the capacity is rejected
    /// before `read` is called. On any error the buffer is left empty.
    pub fn fill_with<F, E>(&mut self, want: usize, read: F) -> Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, E>,
        E: From<ProtocolError>,
    {
        self.data.clear();
        if want > self.capacity {
            return Err(ProtocolError::BufferOverflow {
                max: self.capacity,
                actual: want,
            }
            .into());
        }

        self.data.resize(want, 0);
        match read(&mut self.data[..]) {
            Ok(n) => {
                self.data.truncate(n.min(want));
                Ok(self.data.len())
            }
            Err(e) => {
                self.data.clear();
                Err(e)
            }
        }
    }

    /// Valid bytes of the current cycle.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Tokens of the current cycle.
    pub fn tokens(&self) -> Tokens<'_> {
        tokenize(&self.data, FRAME_DELIMITER.as_bytes())
    }

    /// Delimiter-terminated tokens of the current cycle.
    pub fn frames(&self) -> Terminated<'_> {
        self.tokens().terminated()
    }

    /// Complete commands decoded from the current cycle.
    pub fn commands(&self) -> impl Iterator<Item = InboundCommand> + '_ {
        commands(&self.data)
    }

    /// The current cycle as text (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(buffer: &mut SerialBuffer, bytes: &[u8]) -> Result<usize, ProtocolError> {
        buffer.fill_with(bytes.len(), |dst| {
            dst.copy_from_slice(bytes);
            Ok(bytes.len())
        })
    }

    #[test]
    fn test_fill_and_decode() {
        let mut buffer = SerialBuffer::new(64);
        assert_eq!(fill(&mut buffer, b"CMD+TEM=21>>>CMD+TEM=22>>>"), Ok(26));
        let decoded: Vec<_> = buffer.commands().collect();
        assert_eq!(
            decoded,
            vec![InboundCommand::Temperature(21), InboundCommand::Temperature(22)]
        );
        assert_eq!(buffer.tokens().count(), 2);
    }

    #[test]
    fn test_shorter_cycle_does_not_see_stale_bytes() {
        let mut buffer = SerialBuffer::new(64);
        fill(&mut buffer, b"CMD+TEM=12345>>>").unwrap();
        fill(&mut buffer, b"CMD+TEM=9>>>").unwrap();

        assert_eq!(buffer.as_bytes(), b"CMD+TEM=9>>>");
        let decoded: Vec<_> = buffer.commands().collect();
        assert_eq!(decoded, vec![InboundCommand::Temperature(9)]);
    }

    #[test]
    fn test_split_frame_yields_no_command() {
        let mut buffer = SerialBuffer::new(64);
        fill(&mut buffer, b"CMD+TEM=21>>>CMD+TEM=2").unwrap();

        assert_eq!(buffer.tokens().count(), 2);
        assert_eq!(buffer.frames().count(), 1);
        assert_eq!(buffer.frames().remainder(), None);
        let decoded: Vec<_> = buffer.commands().collect();
        assert_eq!(decoded, vec![InboundCommand::Temperature(21)]);
    }

    #[test]
    fn test_short_read_truncates() {
        let mut buffer = SerialBuffer::new(64);
        let n = buffer
            .fill_with(16, |dst| {
                assert!(dst.iter().all(|&b| b == 0));
                dst[..4].copy_from_slice(b"abcd");
                Ok::<_, ProtocolError>(4)
            })
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buffer.as_bytes(), b"abcd");
    }

    #[test]
    fn test_reader_claiming_too_much_is_clamped() {
        let mut buffer = SerialBuffer::new(8);
        let n = buffer.fill_with(4, |_| Ok::<_, ProtocolError>(100)).unwrap();
        assert_eq!(n, 4);
    }

    #[test]
    fn test_oversized_request_is_rejected() {
        let mut buffer = SerialBuffer::new(8);
        fill(&mut buffer, b"abc").unwrap();

        let mut called = false;
        let result = buffer.fill_with(9, |_| {
            called = true;
            Ok::<_, ProtocolError>(9)
        });
        assert_eq!(result, Err(ProtocolError::BufferOverflow { max: 8, actual: 9 }));
        assert!(!called);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_failed_read_leaves_buffer_empty() {
        let mut buffer = SerialBuffer::new(8);
        fill(&mut buffer, b"abc").unwrap();
        let result: Result<usize, ProtocolError> = buffer.fill_with(4, |_| {
            Err(ProtocolError::BufferOverflow { max: 0, actual: 0 })
        });
        assert!(result.is_err());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_default_capacity() {
        let buffer = SerialBuffer::default();
        assert_eq!(buffer.capacity(), SERIAL_BUFFER_SIZE);
        assert!(buffer.is_empty());
    }
}
