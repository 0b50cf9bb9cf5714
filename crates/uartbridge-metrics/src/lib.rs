//! Metrics infrastructure for the UART/MQTT bridge.
//!
//! This crate declares every metric the bridge records as a structured
//! [`Metric`] constant, and provides label helpers. It re-exports the
//! `metrics` crate so callers record through the same facade.
//!
//! # Example
//!
//! ```rust,ignore
//! use uartbridge_metrics::{describe_metrics, metric_defs, MetricLabels};
//!
//! // Initialize metrics descriptions at startup
//! describe_metrics();
//!
//! let labels = MetricLabels::new("esp01");
//! metrics::counter!(metric_defs::READINGS_PUBLISHED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// # Example
///
/// ```rust
/// use uartbridge_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES_SENT: Metric = Metric::counter("uartbridge.serial.tx_frames")
///     .with_description("Command frames written to the serial port")
///     .with_unit(Unit::Count)
///     .with_labels(&["device", "command"]);
///
/// assert_eq!(FRAMES_SENT.name, "uartbridge.serial.tx_frames");
/// assert_eq!(FRAMES_SENT.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "uartbridge.serial.rx_bytes").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// A counter with no description, unit or labels yet.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// A gauge with no description, unit or labels yet.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// A histogram with no description, unit or labels yet.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        let (name, description) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, description),
            (MetricKind::Counter, None) => describe_counter!(name, description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, description),
            (MetricKind::Gauge, None) => describe_gauge!(name, description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, description),
            (MetricKind::Histogram, None) => describe_histogram!(name, description),
        }
    }
}

/// All metric definitions for the bridge.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every metric.
    pub const STANDARD_LABELS: &[&str] = &["device"];

    // ========================================================================
    // Serial Link Metrics
    // ========================================================================

    /// Bytes read from the serial port.
    pub const SERIAL_RX_BYTES: Metric = Metric::counter("uartbridge.serial.rx_bytes")
        .with_description("Bytes read from the serial port")
        .with_unit(Unit::Bytes)
        .with_labels(&["device"]);

    /// Command frames written to the serial port.
    ///
    /// Labels: device, command (led, display)
    pub const SERIAL_TX_FRAMES: Metric = Metric::counter("uartbridge.serial.tx_frames")
        .with_description("Command frames written to the serial port")
        .with_unit(Unit::Count)
        .with_labels(&["device", "command"]);

    /// Command frames that could not be written.
    pub const SERIAL_TX_ERRORS: Metric = Metric::counter("uartbridge.serial.tx_errors")
        .with_description("Command frames that could not be written")
        .with_unit(Unit::Count)
        .with_labels(&["device", "command"]);

    /// Receive overflows recovered by flushing the input.
    ///
    /// Labels: device, kind (fifo_overflow, buffer_full, oversized)
    pub const SERIAL_RX_OVERFLOWS: Metric = Metric::counter("uartbridge.serial.rx_overflows")
        .with_description("Receive overflows recovered by flushing the input")
        .with_unit(Unit::Count)
        .with_labels(&["device", "kind"]);

    /// Line errors reported by the serial driver.
    ///
    /// Labels: device, kind (parity, frame, break)
    pub const SERIAL_LINE_ERRORS: Metric = Metric::counter("uartbridge.serial.line_errors")
        .with_description("Line errors reported by the serial driver")
        .with_unit(Unit::Count)
        .with_labels(&["device", "kind"]);

    /// Non-empty tokens that carried no recognized command.
    pub const TOKENS_DISCARDED: Metric = Metric::counter("uartbridge.serial.tokens_discarded")
        .with_description("Non-empty tokens that carried no recognized command")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    // ========================================================================
    // Reading Metrics
    // ========================================================================

    /// Sensor readings extracted from the serial stream.
    pub const READINGS_EXTRACTED: Metric = Metric::counter("uartbridge.readings.extracted")
        .with_description("Sensor readings extracted from the serial stream")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Sensor readings handed to the broker.
    pub const READINGS_PUBLISHED: Metric = Metric::counter("uartbridge.readings.published")
        .with_description("Sensor readings handed to the broker")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Sensor readings lost because the publish failed.
    pub const PUBLISH_ERRORS: Metric = Metric::counter("uartbridge.readings.publish_errors")
        .with_description("Sensor readings lost because the publish failed")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Most recent temperature reading.
    pub const LAST_TEMPERATURE: Metric = Metric::gauge("uartbridge.readings.temperature")
        .with_description("Most recent temperature reading")
        .with_labels(&["device"]);

    // ========================================================================
    // Messaging Session Metrics
    // ========================================================================

    /// Inbound messages delivered by the broker.
    ///
    /// Labels: device, topic
    pub const MESSAGES_RECEIVED: Metric = Metric::counter("uartbridge.session.messages_received")
        .with_description("Inbound messages delivered by the broker")
        .with_unit(Unit::Count)
        .with_labels(&["device", "topic"]);

    /// Inbound messages dropped (unknown topic, or before the first connection).
    pub const MESSAGES_IGNORED: Metric = Metric::counter("uartbridge.session.messages_ignored")
        .with_description("Inbound messages dropped without translation")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Transitions into the connected state.
    pub const SESSION_CONNECTS: Metric = Metric::counter("uartbridge.session.connects")
        .with_description("Transitions into the connected state")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// Transitions out of the connected state.
    pub const SESSION_DISCONNECTS: Metric = Metric::counter("uartbridge.session.disconnects")
        .with_description("Transitions out of the connected state")
        .with_unit(Unit::Count)
        .with_labels(&["device"]);

    /// 1 while the session is connected, 0 otherwise.
    pub const SESSION_CONNECTED: Metric = Metric::gauge("uartbridge.session.connected")
        .with_description("1 while the session is connected, 0 otherwise")
        .with_labels(&["device"]);

    /// Duration of the publish call that hands a reading to the broker client.
    pub const PUBLISH_LATENCY: Metric = Metric::histogram("uartbridge.readings.publish_latency_us")
        .with_description("Duration of the publish call that hands a reading to the broker client")
        .with_unit(Unit::Microseconds)
        .with_labels(&["device"]);

    /// All metrics, for registration and documentation.
    pub const ALL: &[&Metric] = &[
        // Serial
        &SERIAL_RX_BYTES,
        &SERIAL_TX_FRAMES,
        &SERIAL_TX_ERRORS,
        &SERIAL_RX_OVERFLOWS,
        &SERIAL_LINE_ERRORS,
        &TOKENS_DISCARDED,
        // Readings
        &READINGS_EXTRACTED,
        &READINGS_PUBLISHED,
        &PUBLISH_ERRORS,
        &LAST_TEMPERATURE,
        &PUBLISH_LATENCY,
        // Session
        &MESSAGES_RECEIVED,
        &MESSAGES_IGNORED,
        &SESSION_CONNECTS,
        &SESSION_DISCONNECTS,
        &SESSION_CONNECTED,
    ];
}

/// Labels identifying the bridge instance a metric belongs to.
///
/// # Example
///
/// ```rust
/// use uartbridge_metrics::MetricLabels;
///
/// let labels = MetricLabels::new("esp01");
/// let extended = labels.with(&[("command", "led".to_string())]);
///
/// assert!(extended.iter().any(|(k, v)| *k == "device" && v == "esp01"));
/// assert!(extended.iter().any(|(k, v)| *k == "command" && v == "led"));
/// ```
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Device identifier embedded in published payloads.
    pub device: String,
}

impl MetricLabels {
    /// Creates labels for the given device.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("device", self.device.clone())]
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used by the bridge.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
}
