//! Messaging session state machine.
//!
//! The session does not own a network connection itself. A transport
//! (the MQTT client in production, a recorder in tests) is driven from the
//! outside and reports what happened as [`SessionEvent`]s; the session
//! tracks connection state, issues subscriptions on every transition into
//! [`SessionState::Connected`] and forwards inbound data to a handler.

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use uartbridge_metrics::{metric_defs, MetricLabels};

use crate::error::SessionError;
use crate::topic::{QoS, Topic};

/// Outbound half of a broker connection.
///
/// Implementations must be callable from several threads at once; the
/// session never holds its own lock while calling into the transport.
pub trait MqttTransport: Send + Sync {
    /// Request a subscription.
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError>;

    /// Hand a message to the transport for delivery.
    fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), SessionError>;
}

/// Receiver of inbound messages.
pub trait InboundHandler {
    /// Called once per inbound message, in delivery order.
    fn handle_message(&self, topic: &str, payload: &[u8]);
}

/// Connection state as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No connection has been established yet.
    BeforeConnect,
    /// Connected; subscriptions have been issued.
    Connected,
    /// The connection was lost and has not yet been re-established.
    Disconnected,
}

/// Something the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport is about to connect.
    BeforeConnect,
    /// The broker accepted the connection.
    Connected,
    /// The connection was lost.
    Disconnected,
    /// An inbound message.
    Data { topic: String, payload: Vec<u8> },
    /// A subscription was acknowledged.
    Subscribed,
    /// A publish was acknowledged.
    Published,
    /// An unsubscribe was acknowledged.
    Unsubscribed,
    /// The transport reported an error.
    Error(String),
}

/// Broker session shared by the event context and the serial read loop.
pub struct MessagingSession {
    transport: Box<dyn MqttTransport>,
    state: Mutex<SessionState>,
    labels: MetricLabels,
}

impl std::fmt::Debug for MessagingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSession")
            .field("state", &*self.state.lock())
            .field("device", &self.labels.device)
            .finish_non_exhaustive()
    }
}

impl MessagingSession {
    /// Create a session in [`SessionState::BeforeConnect`].
    pub fn new(transport: Box<dyn MqttTransport>, labels: MetricLabels) -> Self {
        MessagingSession {
            transport,
            state: Mutex::new(SessionState::BeforeConnect),
            labels,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Apply one transport event.
    pub fn handle_event(&self, event: SessionEvent, handler: &dyn InboundHandler) {
        match event {
            SessionEvent::BeforeConnect => {
                debug!("Session[{}]: connecting", self.labels.device);
            }
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::Disconnected => self.on_disconnected(),
            SessionEvent::Data { topic, payload } => self.on_data(&topic, &payload, handler),
            SessionEvent::Subscribed => {
                debug!("Session[{}]: subscription acknowledged", self.labels.device);
            }
            SessionEvent::Published => {
                trace!("Session[{}]: publish acknowledged", self.labels.device);
            }
            SessionEvent::Unsubscribed => {
                debug!("Session[{}]: unsubscribe acknowledged", self.labels.device);
            }
            SessionEvent::Error(message) => {
                warn!("Session[{}]: transport error: {}", self.labels.device, message);
            }
        }
    }

    /// Publish a message on one of the known topics.
    ///
    /// Fails with [`SessionError::NotConnected`] unless connected. Failures
    /// are returned, never retried.
    pub fn publish(&self, topic: Topic, payload: &[u8], qos: QoS, retain: bool) -> Result<(), SessionError> {
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        self.transport.publish(topic.name(), qos, retain, payload)
    }

    fn on_connected(&self) {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Connected {
                debug!("Session[{}]: already connected", self.labels.device);
                return;
            }
            *state = SessionState::Connected;
        }

        info!("Session[{}]: connected", self.labels.device);
        let labels = self.labels.to_labels();
        metrics::counter!(metric_defs::SESSION_CONNECTS.name, &labels).increment(1);
        metrics::gauge!(metric_defs::SESSION_CONNECTED.name, &labels).set(1.0);

        for topic in Topic::SUBSCRIPTIONS {
            match self.transport.subscribe(topic.name(), topic.qos()) {
                Ok(()) => debug!("Session[{}]: subscribed to {}", self.labels.device, topic),
                Err(e) => warn!(
                    "Session[{}]: subscribe to {} failed: {}",
                    self.labels.device, topic, e
                ),
            }
        }
    }

    fn on_disconnected(&self) {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Connected {
                return;
            }
            *state = SessionState::Disconnected;
        }

        info!("Session[{}]: disconnected", self.labels.device);
        let labels = self.labels.to_labels();
        metrics::counter!(metric_defs::SESSION_DISCONNECTS.name, &labels).increment(1);
        metrics::gauge!(metric_defs::SESSION_CONNECTED.name, &labels).set(0.0);
    }

    fn on_data(&self, topic: &str, payload: &[u8], handler: &dyn InboundHandler) {
        if self.state() == SessionState::BeforeConnect {
            debug!(
                "Session[{}]: dropping message on {} received before connecting",
                self.labels.device, topic
            );
            let labels = self.labels.to_labels();
            metrics::counter!(metric_defs::MESSAGES_IGNORED.name, &labels).increment(1);
            return;
        }

        trace!("Session[{}]: message on {} ({} bytes)", self.labels.device, topic, payload.len());
        let labels = self.labels.with(&[("topic", topic.to_string())]);
        metrics::counter!(metric_defs::MESSAGES_RECEIVED.name, &labels).increment(1);
        handler.handle_message(topic, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Subscribe(String, QoS),
        Publish(String, QoS, bool, Vec<u8>),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl MqttTransport for Recorder {
        fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError> {
            self.calls.lock().push(Call::Subscribe(topic.to_string(), qos));
            Ok(())
        }

        fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), SessionError> {
            self.calls
                .lock()
                .push(Call::Publish(topic.to_string(), qos, retain, payload.to_vec()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Inbox {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl InboundHandler for Inbox {
        fn handle_message(&self, topic: &str, payload: &[u8]) {
            self.messages.lock().push((topic.to_string(), payload.to_vec()));
        }
    }

    fn session() -> (MessagingSession, Arc<Mutex<Vec<Call>>>) {
        let recorder = Recorder::default();
        let calls = recorder.calls.clone();
        (MessagingSession::new(Box::new(recorder), MetricLabels::new("dev1")), calls)
    }

    fn subscriptions(calls: &[Call]) -> Vec<String> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::Subscribe(topic, _) => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_starts_before_connect() {
        let (session, calls) = session();
        assert_eq!(session.state(), SessionState::BeforeConnect);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_connect_subscribes_led_then_display() {
        let (session, calls) = session();
        session.handle_event(SessionEvent::Connected, &Inbox::default());

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(
            *calls.lock(),
            vec![
                Call::Subscribe("peripherals/led0".into(), QoS::AtLeastOnce),
                Call::Subscribe("peripherals/lcd_display".into(), QoS::AtLeastOnce),
            ]
        );
    }

    #[test]
    fn test_duplicate_connected_does_not_resubscribe() {
        let (session, calls) = session();
        let inbox = Inbox::default();
        session.handle_event(SessionEvent::Connected, &inbox);
        session.handle_event(SessionEvent::Connected, &inbox);
        assert_eq!(subscriptions(&calls.lock()).len(), 2);
    }

    #[test]
    fn test_reconnect_resubscribes_once() {
        let (session, calls) = session();
        let inbox = Inbox::default();
        session.handle_event(SessionEvent::Connected, &inbox);
        session.handle_event(SessionEvent::Disconnected, &inbox);
        assert_eq!(session.state(), SessionState::Disconnected);
        session.handle_event(SessionEvent::Connected, &inbox);

        assert_eq!(
            subscriptions(&calls.lock()),
            vec![
                "peripherals/led0",
                "peripherals/lcd_display",
                "peripherals/led0",
                "peripherals/lcd_display",
            ]
        );
    }

    #[test]
    fn test_disconnect_before_connect_is_ignored() {
        let (session, _) = session();
        session.handle_event(SessionEvent::Disconnected, &Inbox::default());
        assert_eq!(session.state(), SessionState::BeforeConnect);
    }

    #[test]
    fn test_data_before_connect_is_dropped() {
        let (session, _) = session();
        let inbox = Inbox::default();
        session.handle_event(
            SessionEvent::Data {
                topic: "peripherals/led0".into(),
                payload: b"ON".to_vec(),
            },
            &inbox,
        );
        assert!(inbox.messages.lock().is_empty());
    }

    #[test]
    fn test_data_is_forwarded_in_order() {
        let (session, _) = session();
        let inbox = Inbox::default();
        session.handle_event(SessionEvent::Connected, &inbox);
        for payload in [b"ON".as_slice(), b"OFF".as_slice()] {
            session.handle_event(
                SessionEvent::Data {
                    topic: "peripherals/led0".into(),
                    payload: payload.to_vec(),
                },
                &inbox,
            );
        }

        let messages = inbox.messages.lock();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].1, b"ON".to_vec());
        assert_eq!(messages[1].1, b"OFF".to_vec());
    }

    #[test]
    fn test_publish_requires_connection() {
        let (session, calls) = session();
        let inbox = Inbox::default();
        let publish = |s: &MessagingSession| s.publish(Topic::SensorReading, b"21 dev1", QoS::AtLeastOnce, false);

        assert_eq!(publish(&session), Err(SessionError::NotConnected));

        session.handle_event(SessionEvent::Connected, &inbox);
        assert_eq!(publish(&session), Ok(()));

        session.handle_event(SessionEvent::Disconnected, &inbox);
        assert_eq!(publish(&session), Err(SessionError::NotConnected));

        let published = calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Publish(..)))
            .count();
        assert_eq!(published, 1);
    }
}
