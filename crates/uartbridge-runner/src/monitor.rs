//! Telemetry monitor: the consuming side of `sensors/temp`.
//!
//! Subscribes to the sensor topic, parses each `"<temperature> <device>"`
//! payload and emits it as a JSON record, one per line.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uartbridge_core::{MqttTransport, QoS, SensorReading, SessionEvent, Topic};

/// What a telemetry record measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    Temperature,
}

/// One received reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub value: i32,
    pub device: String,
    pub kind: TelemetryKind,
    pub received_at: DateTime<Utc>,
}

impl TelemetryRecord {
    /// Build a record from a sensor topic payload.
    pub fn from_payload(payload: &[u8], received_at: DateTime<Utc>) -> Option<Self> {
        let text = std::str::from_utf8(payload).ok()?;
        let reading = SensorReading::from_payload(text)?;
        Some(TelemetryRecord {
            value: reading.temperature,
            device: reading.device_id,
            kind: TelemetryKind::Temperature,
            received_at,
        })
    }
}

/// Turns session events into telemetry lines.
pub struct TelemetryMonitor<T, W> {
    transport: T,
    out: W,
    received: u64,
}

impl<T: MqttTransport, W: Write> TelemetryMonitor<T, W> {
    /// Create a monitor writing records to `out`.
    pub fn new(transport: T, out: W) -> Self {
        TelemetryMonitor {
            transport,
            out,
            received: 0,
        }
    }

    /// Number of records written.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Apply one session event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                info!("Monitor: connected, subscribing to {}", Topic::SensorReading);
                if let Err(e) = self.transport.subscribe(Topic::SensorReading.name(), QoS::AtMostOnce) {
                    warn!("Monitor: subscribe failed: {}", e);
                }
            }
            SessionEvent::Disconnected => info!("Monitor: disconnected"),
            SessionEvent::Data { topic, payload } => self.on_message(&topic, &payload, Utc::now()),
            other => debug!("Monitor: {:?}", other),
        }
    }

    fn on_message(&mut self, topic: &str, payload: &[u8], received_at: DateTime<Utc>) {
        if Topic::from_name(topic) != Some(Topic::SensorReading) {
            return;
        }
        let Some(record) = TelemetryRecord::from_payload(payload, received_at) else {
            warn!(
                "Monitor: skipping malformed payload {:?}",
                String::from_utf8_lossy(payload)
            );
            return;
        };

        let written = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(self.out, "{}", line));
        match written {
            Ok(()) => self.received += 1,
            Err(e) => warn!("Monitor: failed to write record: {}", e),
        }
    }
}
