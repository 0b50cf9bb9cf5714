//! Routing between broker topics and the serial link.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uartbridge_metrics::{metric_defs, MetricLabels};
use uartbridge_protocol::CommandFrame;

use crate::error::{GatewayError, SessionError};
use crate::gateway::SerialGateway;
use crate::reading::SensorReading;
use crate::session::{InboundHandler, MessagingSession};
use crate::topic::{QoS, Topic};

/// Dispatches inbound messages to the serial gateway and sensor readings to
/// the messaging session.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    gateway: Arc<SerialGateway>,
    session: Arc<MessagingSession>,
    labels: MetricLabels,
}

impl MessageRouter {
    /// Create a router over a gateway and a session.
    pub fn new(gateway: Arc<SerialGateway>, session: Arc<MessagingSession>, labels: MetricLabels) -> Self {
        MessageRouter {
            gateway,
            session,
            labels,
        }
    }

    /// The frame an inbound message translates to, if any.
    ///
    /// Only the LED and display topics produce frames; every other topic,
    /// including the sensor topic the bridge itself publishes, yields `None`.
    pub fn command_for(topic: &str, payload: &[u8]) -> Option<CommandFrame> {
        match Topic::from_name(topic)? {
            Topic::LedCommand => Some(CommandFrame::led_from_payload(payload)),
            Topic::DisplayCommand => Some(CommandFrame::display_from_payload(payload)),
            Topic::SensorReading => None,
        }
    }

    /// Translate an inbound message and write it to the serial port.
    ///
    /// Returns the frame that was written, or `None` if the topic is ignored.
    pub fn on_inbound_message(&self, topic: &str, payload: &[u8]) -> Result<Option<CommandFrame>, GatewayError> {
        let Some(frame) = Self::command_for(topic, payload) else {
            debug!("Router[{}]: ignoring message on {}", self.labels.device, topic);
            let labels = self.labels.to_labels();
            metrics::counter!(metric_defs::MESSAGES_IGNORED.name, &labels).increment(1);
            return Ok(None);
        };

        self.gateway.send(&frame)?;
        Ok(Some(frame))
    }

    /// Publish a sensor reading on the sensor topic.
    pub fn on_sensor_reading(&self, reading: &SensorReading) -> Result<(), SessionError> {
        let started = Instant::now();
        let payload = reading.to_payload();
        let labels = self.labels.to_labels();

        match self.session.publish(Topic::SensorReading, payload.as_bytes(), QoS::AtLeastOnce, false) {
            Ok(()) => {
                debug!("Router[{}]: published {:?}", self.labels.device, payload);
                metrics::counter!(metric_defs::READINGS_PUBLISHED.name, &labels).increment(1);
                metrics::gauge!(metric_defs::LAST_TEMPERATURE.name, &labels).set(reading.temperature as f64);
                metrics::histogram!(metric_defs::PUBLISH_LATENCY.name, &labels)
                    .record(started.elapsed().as_micros() as f64);
                Ok(())
            }
            Err(e) => {
                metrics::counter!(metric_defs::PUBLISH_ERRORS.name, &labels).increment(1);
                Err(e)
            }
        }
    }
}

impl InboundHandler for MessageRouter {
    fn handle_message(&self, topic: &str, payload: &[u8]) {
        if let Err(e) = self.on_inbound_message(topic, payload) {
            warn!("Router[{}]: message on {} not delivered: {}", self.labels.device, topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_topic() {
        assert_eq!(
            MessageRouter::command_for("peripherals/led0", b"ON"),
            Some(CommandFrame::Led { on: true })
        );
        assert_eq!(
            MessageRouter::command_for("peripherals/led0", b"on"),
            Some(CommandFrame::Led { on: false })
        );
    }

    #[test]
    fn test_display_topic() {
        assert_eq!(
            MessageRouter::command_for("peripherals/lcd_display", b"Hello"),
            Some(CommandFrame::Display {
                text: "Hello".to_string()
            })
        );
    }

    #[test]
    fn test_other_topics_are_ignored() {
        assert_eq!(MessageRouter::command_for("sensors/temp", b"21 dev1"), None);
        assert_eq!(MessageRouter::command_for("peripherals/led1", b"ON"), None);
        assert_eq!(MessageRouter::command_for("", b""), None);
    }
}
