//! The root bridge object.

use std::sync::Arc;

use tracing::{info, warn};
use uartbridge_metrics::MetricLabels;

use crate::error::GatewayError;
use crate::gateway::{SerialGateway, SerialReceiver, SerialSink, SerialSource};
use crate::router::MessageRouter;
use crate::session::{MessagingSession, MqttTransport, SessionEvent, SessionState};

/// Owns the serial gateway and the messaging session for the life of the
/// process.
///
/// The bridge is constructed once at startup and shared by reference with
/// the two execution contexts: the broker event loop calls
/// [`handle_session_event`](Self::handle_session_event), the serial read
/// thread calls [`run_serial_loop`](Self::run_serial_loop). The only state
/// both touch is the session's publish handle.
#[derive(Debug)]
pub struct Bridge {
    device_id: String,
    gateway: Arc<SerialGateway>,
    session: Arc<MessagingSession>,
    router: MessageRouter,
}

impl Bridge {
    /// Assemble a bridge from a serial sink and a broker transport.
    pub fn new(
        device_id: impl Into<String>,
        sink: Box<dyn SerialSink>,
        transport: Box<dyn MqttTransport>,
    ) -> Self {
        let device_id = device_id.into();
        let labels = MetricLabels::new(device_id.clone());

        let gateway = Arc::new(SerialGateway::new(sink, labels.clone()));
        let session = Arc::new(MessagingSession::new(transport, labels.clone()));
        let router = MessageRouter::new(gateway.clone(), session.clone(), labels);

        Bridge {
            device_id,
            gateway,
            session,
            router,
        }
    }

    /// Device id attached to published readings.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// The serial transmit side.
    pub fn gateway(&self) -> &Arc<SerialGateway> {
        &self.gateway
    }

    /// The broker session.
    pub fn session(&self) -> &Arc<MessagingSession> {
        &self.session
    }

    /// The message router.
    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Current broker connection state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Feed one transport event into the session.
    pub fn handle_session_event(&self, event: SessionEvent) {
        self.session.handle_event(event, &self.router);
    }

    /// Create a serial receiver attributing readings to this bridge's device.
    pub fn receiver<S: SerialSource>(&self, source: S, buffer_size: usize) -> SerialReceiver<S> {
        SerialReceiver::new(source, buffer_size, self.device_id.clone())
    }

    /// Run one serial read cycle and publish every reading it produced.
    ///
    /// Returns how many readings were published. A failed publish is logged
    /// and the reading dropped; later readings in the same cycle are still
    /// attempted.
    pub fn process_cycle<S: SerialSource>(&self, receiver: &mut SerialReceiver<S>) -> Result<usize, GatewayError> {
        let readings = receiver.read_cycle()?;
        let mut published = 0;
        for reading in &readings {
            match self.router.on_sensor_reading(reading) {
                Ok(()) => published += 1,
                Err(e) => warn!(
                    "Bridge[{}]: dropping reading {}: {}",
                    self.device_id, reading.temperature, e
                ),
            }
        }
        Ok(published)
    }

    /// Run the serial read loop until the source closes.
    ///
    /// Returns the source so the caller can inspect or reuse it.
    pub fn run_serial_loop<S: SerialSource>(&self, mut receiver: SerialReceiver<S>) -> Result<S, GatewayError> {
        info!("Bridge[{}]: serial read loop started", self.device_id);
        loop {
            match self.process_cycle(&mut receiver) {
                Ok(_) => {}
                Err(GatewayError::Closed) => {
                    info!("Bridge[{}]: serial source closed", self.device_id);
                    return Ok(receiver.into_source());
                }
                Err(e) => {
                    warn!("Bridge[{}]: serial read failed: {}", self.device_id, e);
                    return Err(e);
                }
            }
        }
    }
}
