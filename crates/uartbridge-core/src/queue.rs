//! In-process serial receive queue.
//!
//! This mirrors how a UART driver hands data to a reader task: received
//! bytes go into a bounded byte ring and a notification goes into a bounded
//! event queue. The reader blocks on the event queue, then reads the bytes
//! the notification announced. When either bound is hit, the overflow is
//! reported as an event and the reader is expected to flush and resync.
//!
//! The producer side ([`SerialFeeder`]) is driven by whatever owns the
//! physical port; the consumer side ([`QueuedSerialSource`]) implements
//! [`SerialSource`] for the bridge's read loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use crate::error::GatewayError;
use crate::gateway::SerialSource;

/// Default number of pending notifications.
pub const DEFAULT_QUEUE_DEPTH: usize = 100;

/// Default byte ring capacity.
pub const DEFAULT_RING_CAPACITY: usize = 512;

/// A receive-side notification from the serial driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEvent {
    /// `len` bytes are waiting in the ring.
    Data { len: usize },
    /// Data arrived faster than notifications could be queued.
    FifoOverflow,
    /// The byte ring is full.
    BufferFull,
    /// A byte was received with a parity error.
    ParityError,
    /// A byte was received with a framing error.
    FrameError,
    /// A break condition was detected on the line.
    Break,
}

impl SerialEvent {
    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SerialEvent::Data { .. } => "data",
            SerialEvent::FifoOverflow => "fifo_overflow",
            SerialEvent::BufferFull => "buffer_full",
            SerialEvent::ParityError => "parity",
            SerialEvent::FrameError => "frame",
            SerialEvent::Break => "break",
        }
    }
}

/// State shared by both ends of the queue.
#[derive(Debug)]
struct Shared {
    ring: Mutex<BytesMut>,
    ring_capacity: usize,
    /// Set when a notification was dropped because the queue was full.
    overflowed: AtomicBool,
}

/// Create a connected feeder/source pair.
pub fn serial_channel(queue_depth: usize, ring_capacity: usize) -> (SerialFeeder, QueuedSerialSource) {
    let (events_tx, events_rx) = crossbeam_channel::bounded(queue_depth.max(1));
    let shared = Arc::new(Shared {
        ring: Mutex::new(BytesMut::with_capacity(ring_capacity)),
        ring_capacity,
        overflowed: AtomicBool::new(false),
    });

    let feeder = SerialFeeder {
        events: events_tx,
        shared: shared.clone(),
    };
    let source = QueuedSerialSource {
        events: events_rx,
        shared,
    };
    (feeder, source)
}

/// Producer side of the receive queue.
///
/// Cloneable; the source reports [`GatewayError::Closed`] once every feeder
/// has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct SerialFeeder {
    events: Sender<SerialEvent>,
    shared: Arc<Shared>,
}

impl SerialFeeder {
    /// Push received bytes and announce them.
    ///
    /// Bytes that do not fit in the ring are not stored; a
    /// [`SerialEvent::BufferFull`] is queued instead.
    pub fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let event = {
            let mut ring = self.shared.ring.lock();
            if ring.len() + data.len() > self.shared.ring_capacity {
                SerialEvent::BufferFull
            } else {
                ring.extend_from_slice(data);
                SerialEvent::Data { len: data.len() }
            }
        };
        self.report(event);
    }

    /// Queue a notification without data.
    pub fn report(&self, event: SerialEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.shared.overflowed.store(true, Ordering::Release);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Reader is gone; nothing left to notify.
            }
        }
    }

    /// Number of bytes waiting in the ring.
    pub fn buffered_len(&self) -> usize {
        self.shared.ring.lock().len()
    }
}

/// Consumer side of the receive queue.
#[derive(Debug)]
pub struct QueuedSerialSource {
    events: Receiver<SerialEvent>,
    shared: Arc<Shared>,
}

impl QueuedSerialSource {
    /// Number of notifications waiting.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Number of bytes waiting in the ring.
    pub fn buffered_len(&self) -> usize {
        self.shared.ring.lock().len()
    }
}

impl SerialSource for QueuedSerialSource {
    fn next_event(&mut self) -> Result<SerialEvent, GatewayError> {
        if self.shared.overflowed.swap(false, Ordering::AcqRel) {
            return Ok(SerialEvent::FifoOverflow);
        }
        self.events.recv().map_err(|_| GatewayError::Closed)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, GatewayError> {
        let mut ring = self.shared.ring.lock();
        let n = buf.len().min(ring.len());
        buf[..n].copy_from_slice(&ring[..n]);
        ring.advance(n);
        Ok(n)
    }

    fn flush_input(&mut self) {
        self.shared.ring.lock().clear();
        while self.events.try_recv().is_ok() {}
        self.shared.overflowed.store(false, Ordering::Release);
    }
}
