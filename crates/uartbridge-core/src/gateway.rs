//! Serial side of the bridge.
//!
//! [`SerialGateway`] writes encoded command frames to the port and may be
//! shared by any number of message handlers. [`SerialReceiver`] owns the read
//! side: it waits for driver events, fills the per-cycle buffer and turns
//! temperature frames into [`SensorReading`]s.

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use uartbridge_metrics::{metric_defs, MetricLabels};
use uartbridge_protocol::{CommandFrame, SerialBuffer};

use crate::error::GatewayError;
use crate::queue::SerialEvent;
use crate::reading::SensorReading;

/// Write half of a serial port.
pub trait SerialSink: Send {
    /// Write every byte of `bytes`, or fail.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), GatewayError>;
}

/// Read half of a serial port, as seen through the driver's event queue.
pub trait SerialSource: Send {
    /// Block until the driver reports the next event.
    ///
    /// Returns [`GatewayError::Closed`] once no further events can arrive.
    fn next_event(&mut self) -> Result<SerialEvent, GatewayError>;

    /// Read up to `buf.len()` received bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, GatewayError>;

    /// Discard all received bytes and pending events.
    fn flush_input(&mut self);
}

impl<T: SerialSink + ?Sized> SerialSink for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), GatewayError> {
        (**self).write_all(bytes)
    }
}

impl<T: SerialSource + ?Sized> SerialSource for Box<T> {
    fn next_event(&mut self) -> Result<SerialEvent, GatewayError> {
        (**self).next_event()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, GatewayError> {
        (**self).read(buf)
    }

    fn flush_input(&mut self) {
        (**self).flush_input()
    }
}

/// Transmit side of the serial link.
///
/// Frames are written whole under a lock, so concurrent senders never
/// interleave bytes on the wire.
pub struct SerialGateway {
    sink: Mutex<Box<dyn SerialSink>>,
    labels: MetricLabels,
}

impl std::fmt::Debug for SerialGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialGateway")
            .field("device", &self.labels.device)
            .finish_non_exhaustive()
    }
}

impl SerialGateway {
    /// Wrap a serial sink.
    pub fn new(sink: Box<dyn SerialSink>, labels: MetricLabels) -> Self {
        SerialGateway {
            sink: Mutex::new(sink),
            labels,
        }
    }

    /// Encode and write one command frame.
    pub fn send(&self, frame: &CommandFrame) -> Result<(), GatewayError> {
        let bytes = frame.encode();
        let labels = self.labels.with(&[("command", frame.kind().to_string())]);

        let result = self.sink.lock().write_all(&bytes);
        match &result {
            Ok(()) => {
                debug!(
                    "Gateway[{}]: sent {} ({} bytes)",
                    self.labels.device,
                    frame.to_command_string(),
                    bytes.len()
                );
                metrics::counter!(metric_defs::SERIAL_TX_FRAMES.name, &labels).increment(1);
            }
            Err(e) => {
                warn!(
                    "Gateway[{}]: failed to send {} frame: {}",
                    self.labels.device,
                    frame.kind(),
                    e
                );
                metrics::counter!(metric_defs::SERIAL_TX_ERRORS.name, &labels).increment(1);
            }
        }
        result
    }
}

/// Receive side of the serial link.
///
/// Each call to [`read_cycle`](Self::read_cycle) handles exactly one driver
/// event. Only frames closed by a delimiter within the cycle are decoded; a
/// partial frame is dropped, never carried over to the next cycle.
#[derive(Debug)]
pub struct SerialReceiver<S> {
    source: S,
    buffer: SerialBuffer,
    device_id: String,
    labels: MetricLabels,
}

impl<S: SerialSource> SerialReceiver<S> {
    /// Create a receiver reading at most `buffer_size` bytes per cycle.
    pub fn new(source: S, buffer_size: usize, device_id: impl Into<String>) -> Self {
        let device_id = device_id.into();
        SerialReceiver {
            source,
            buffer: SerialBuffer::new(buffer_size),
            labels: MetricLabels::new(device_id.clone()),
            device_id,
        }
    }

    /// Device id attached to every reading.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consume the receiver, returning the source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Wait for one driver event and return the readings it produced.
    ///
    /// Overflow conditions flush the input and yield no readings; line
    /// errors are logged and yield no readings. Only a closed source is an
    /// error.
    pub fn read_cycle(&mut self) -> Result<Vec<SensorReading>, GatewayError> {
        let event = self.source.next_event()?;
        match event {
            SerialEvent::Data { len } => self.read_data(len),
            SerialEvent::FifoOverflow | SerialEvent::BufferFull => {
                info!("Gateway[{}]: {}, flushing input", self.labels.device, event.kind());
                self.recover(event.kind());
                Ok(Vec::new())
            }
            SerialEvent::ParityError | SerialEvent::FrameError | SerialEvent::Break => {
                info!("Gateway[{}]: line error: {}", self.labels.device, event.kind());
                let labels = self.labels.with(&[("kind", event.kind().to_string())]);
                metrics::counter!(metric_defs::SERIAL_LINE_ERRORS.name, &labels).increment(1);
                Ok(Vec::new())
            }
        }
    }

    fn read_data(&mut self, len: usize) -> Result<Vec<SensorReading>, GatewayError> {
        if len > self.buffer.capacity() {
            info!(
                "Gateway[{}]: {} bytes exceed the {} byte buffer, flushing input",
                self.labels.device,
                len,
                self.buffer.capacity()
            );
            self.buffer.clear();
            self.recover("oversized");
            return Ok(Vec::new());
        }

        let source = &mut self.source;
        let n = self.buffer.fill_with(len, |dst| source.read(dst))?;
        if n == 0 {
            return Ok(Vec::new());
        }
        trace!("Gateway[{}]: rx {:?}", self.labels.device, self.buffer.buffer_as_str());

        let labels = self.labels.to_labels();
        metrics::counter!(metric_defs::SERIAL_RX_BYTES.name, &labels).increment(n as u64);

        let mut readings = Vec::new();
        let mut discarded = 0u64;
        let mut frames = self.buffer.frames();
        for token in frames.by_ref() {
            if token.is_empty() {
                continue;
            }
            match uartbridge_protocol::extract(token)
                .and_then(|command| SensorReading::from_command(command, &self.device_id))
            {
                Some(reading) => readings.push(reading),
                None => discarded += 1,
            }
        }
        if let Some(tail) = frames.remainder() {
            trace!(
                "Gateway[{}]: dropping unterminated fragment {:?}",
                self.labels.device,
                String::from_utf8_lossy(tail)
            );
            discarded += 1;
        }

        if discarded > 0 {
            metrics::counter!(metric_defs::TOKENS_DISCARDED.name, &labels).increment(discarded);
        }
        if !readings.is_empty() {
            metrics::counter!(metric_defs::READINGS_EXTRACTED.name, &labels)
                .increment(readings.len() as u64);
        }
        Ok(readings)
    }

    fn recover(&mut self, kind: &'static str) {
        self.source.flush_input();
        let labels = self.labels.with(&[("kind", kind.to_string())]);
        metrics::counter!(metric_defs::SERIAL_RX_OVERFLOWS.name, &labels).increment(1);
    }
}
