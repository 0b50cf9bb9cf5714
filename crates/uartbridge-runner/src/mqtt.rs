//! Broker transport built on `rumqttc`.
//!
//! The `rumqttc` event loop runs as a Tokio task. Every event it yields is
//! mapped to a [`SessionEvent`] and handed to a callback; outbound requests go
//! through the cloneable [`AsyncClient`] without blocking.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet};
use tokio::sync::watch;
use tracing::{debug, warn};
use uartbridge_core::{MqttTransport, QoS, SessionError, SessionEvent};

use crate::config::BridgeConfig;

/// Capacity of the client request channel.
const REQUEST_CAPACITY: usize = 64;

/// [`MqttTransport`] backed by a `rumqttc` client.
#[derive(Debug, Clone)]
pub struct RumqttTransport {
    client: AsyncClient,
}

impl RumqttTransport {
    /// Wrap a client.
    pub fn new(client: AsyncClient) -> Self {
        RumqttTransport { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }
}

impl MqttTransport for RumqttTransport {
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), SessionError> {
        self.client
            .try_subscribe(topic, to_mqtt_qos(qos))
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    fn publish(&self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), SessionError> {
        self.client
            .try_publish(topic, to_mqtt_qos(qos), retain, payload.to_vec())
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}

/// Convert to the `rumqttc` QoS.
pub fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// Client options for a configuration and client id.
pub fn mqtt_options(config: &BridgeConfig, client_id: impl Into<String>) -> MqttOptions {
    let broker = &config.broker;
    let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    options.set_keep_alive(broker.keep_alive());
    options.set_clean_session(true);
    if let Some(username) = &broker.username {
        options.set_credentials(username.clone(), broker.password.clone().unwrap_or_default());
    }
    options
}

/// Create a client and its event loop.
pub fn connect(options: MqttOptions) -> (AsyncClient, EventLoop) {
    AsyncClient::new(options, REQUEST_CAPACITY)
}

/// Map a `rumqttc` event to a session event.
///
/// Outgoing packets and keep-alive traffic have no session meaning and map
/// to `None`.
pub fn session_event(event: &Event) -> Option<SessionEvent> {
    let Event::Incoming(packet) = event else {
        return None;
    };

    match packet {
        Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Success => Some(SessionEvent::Connected),
        Packet::ConnAck(ack) => Some(SessionEvent::Error(format!("connection refused: {:?}", ack.code))),
        Packet::Publish(publish) => Some(SessionEvent::Data {
            topic: publish.topic.clone(),
            payload: publish.payload.to_vec(),
        }),
        Packet::SubAck(_) => Some(SessionEvent::Subscribed),
        Packet::PubAck(_) | Packet::PubComp(_) => Some(SessionEvent::Published),
        Packet::UnsubAck(_) => Some(SessionEvent::Unsubscribed),
        Packet::Disconnect => Some(SessionEvent::Disconnected),
        _ => None,
    }
}

/// Poll the event loop until `shutdown` fires.
///
/// A connection error is reported as [`SessionEvent::Error`] followed by
/// [`SessionEvent::Disconnected`]; the next poll after `reconnect_delay`
/// reconnects.
pub async fn drive_event_loop<F>(
    mut eventloop: EventLoop,
    reconnect_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_event: F,
) where
    F: FnMut(SessionEvent),
{
    on_event(SessionEvent::BeforeConnect);
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            polled = eventloop.poll() => match polled {
                Ok(event) => {
                    if let Some(event) = session_event(&event) {
                        on_event(event);
                    }
                }
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    on_event(SessionEvent::Error(e.to_string()));
                    on_event(SessionEvent::Disconnected);
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                    on_event(SessionEvent::BeforeConnect);
                }
            },
        }
    }
    debug!("MQTT event loop stopped");
}
