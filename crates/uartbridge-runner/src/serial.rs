//! Physical serial port.
//!
//! The port is opened once and split: a clone goes to the [`PortSink`] used
//! by the gateway, the opened handle itself to a reader thread that pushes received
//! bytes into the serial queue.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use serialport::SerialPort;
use tracing::{debug, error, info};
use uartbridge_core::{GatewayError, SerialFeeder, SerialSink};

use crate::config::SerialConfig;
use crate::error::RunnerError;

/// Read timeout; bounds how long the reader takes to notice a shutdown.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Open the configured port as 8N1.
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn SerialPort>, RunnerError> {
    info!("Opening serial port {} at {} baud", config.port, config.baud_rate);
    serialport::new(&config.port, config.baud_rate)
        .timeout(READ_TIMEOUT)
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(serialport::StopBits::One)
        .parity(serialport::Parity::None)
        .flow_control(serialport::FlowControl::None)
        .open()
        .map_err(|source| RunnerError::Serial {
            port: config.port.clone(),
            source,
        })
}

/// Write half of an open port.
pub struct PortSink {
    port: Box<dyn SerialPort>,
}

impl PortSink {
    /// Clone the port handle for writing.
    pub fn from_port(port: &dyn SerialPort) -> Result<Self, RunnerError> {
        let port = port.try_clone().map_err(|source| RunnerError::Serial {
            port: port.name().unwrap_or_default(),
            source,
        })?;
        Ok(PortSink { port })
    }
}

impl SerialSink for PortSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), GatewayError> {
        Write::write_all(&mut self.port, bytes)?;
        Write::flush(&mut self.port)?;
        Ok(())
    }
}

/// Pump bytes from `reader` into `feeder` until `running` is cleared or the
/// reader fails.
///
/// Timeouts are not errors; any other read error ends the pump.
pub fn pump<R: Read + ?Sized>(reader: &mut R, feeder: &SerialFeeder, chunk_size: usize, running: &AtomicBool) {
    let mut buf = vec![0u8; chunk_size.max(1)];
    while running.load(Ordering::Acquire) {
        match reader.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => feeder.push(&buf[..n]),
            Err(ref e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
            Err(e) => {
                error!("Serial read failed: {}", e);
                return;
            }
        }
    }
    debug!("Serial reader stopped");
}

/// Spawn the reader thread.
///
/// The feeder is dropped when the thread exits, which closes the serial
/// queue and ends the bridge's read loop.
pub fn spawn_reader(
    mut port: Box<dyn SerialPort>,
    feeder: SerialFeeder,
    chunk_size: usize,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, RunnerError> {
    let handle = thread::Builder::new()
        .name("serial-reader".to_string())
        .spawn(move || pump(&mut *port, &feeder, chunk_size, &running))?;
    Ok(handle)
}

/// Why the bridge stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl-C was received.
    Interrupted,
    /// The serial read loop finished on its own, e.g. the port went away.
    SerialEnded,
}

/// Block until either a shutdown is requested or the serial read loop ends.
///
/// `serial_done` fires, or disconnects, when the read-loop thread exits.
pub fn wait_for_stop(shutdown: &Receiver<()>, serial_done: &Receiver<()>) -> StopReason {
    select! {
        recv(shutdown) -> _ => StopReason::Interrupted,
        recv(serial_done) -> _ => StopReason::SerialEnded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use uartbridge_core::{serial_channel, SerialEvent, SerialSource};

    /// Yields scripted results, then clears `running`.
    struct ScriptedReader {
        script: VecDeque<std::io::Result<Vec<u8>>>,
        running: Arc<AtomicBool>,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.script.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    self.running.store(false, Ordering::Release);
                    Err(std::io::Error::new(ErrorKind::TimedOut, "timed out"))
                }
            }
        }
    }

    #[test]
    fn test_pump_forwards_chunks_and_skips_timeouts() {
        let running = Arc::new(AtomicBool::new(true));
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![
                Ok(b"CMD+TEM=".to_vec()),
                Err(std::io::Error::new(ErrorKind::TimedOut, "timed out")),
                Ok(b"21>>>".to_vec()),
            ]),
            running: running.clone(),
        };
        let (feeder, mut source) = serial_channel(8, 64);

        pump(&mut reader, &feeder, 64, &running);

        assert_eq!(source.next_event().unwrap(), SerialEvent::Data { len: 8 });
        assert_eq!(source.next_event().unwrap(), SerialEvent::Data { len: 5 });
        assert_eq!(source.buffered_len(), 13);
    }

    #[test]
    fn test_pump_stops_on_hard_error() {
        let running = Arc::new(AtomicBool::new(true));
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![
                Err(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged")),
                Ok(b"never".to_vec()),
            ]),
            running: running.clone(),
        };
        let (feeder, source) = serial_channel(8, 64);

        pump(&mut reader, &feeder, 64, &running);

        assert!(running.load(Ordering::Acquire));
        assert_eq!(source.pending_events(), 0);
    }

    #[test]
    fn test_wait_for_stop_on_interrupt() {
        let (shutdown_tx, shutdown) = crossbeam_channel::bounded(1);
        let (_done_tx, serial_done) = crossbeam_channel::bounded::<()>(1);
        shutdown_tx.send(()).unwrap();
        assert_eq!(wait_for_stop(&shutdown, &serial_done), StopReason::Interrupted);
    }

    #[test]
    fn test_wait_for_stop_when_read_loop_exits() {
        let running = Arc::new(AtomicBool::new(true));
        let mut reader = ScriptedReader {
            script: VecDeque::from(vec![Err(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged"))]),
            running: running.clone(),
        };
        let (feeder, source) = serial_channel(8, 64);
        let (_shutdown_tx, shutdown) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, serial_done) = crossbeam_channel::bounded::<()>(1);

        // Read loop stand-in: drains the source until the feeder is gone.
        let read_loop = thread::spawn(move || {
            let _done = done_tx;
            let mut source = source;
            while source.next_event().is_ok() {}
        });

        pump(&mut reader, &feeder, 64, &running);
        drop(feeder);

        assert_eq!(wait_for_stop(&shutdown, &serial_done), StopReason::SerialEnded);
        read_loop.join().unwrap();
    }
}
