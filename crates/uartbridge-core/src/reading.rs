//! Sensor readings and their published payload format.

use serde::{Deserialize, Serialize};
use uartbridge_protocol::InboundCommand;

/// A temperature reading attributed to a device.
///
/// Readings live for one processing cycle; one that is not published is lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature as reported by the controller.
    pub temperature: i32,
    /// Identifier of the reporting device.
    pub device_id: String,
}

impl SensorReading {
    /// Create a reading.
    pub fn new(temperature: i32, device_id: impl Into<String>) -> Self {
        SensorReading {
            temperature,
            device_id: device_id.into(),
        }
    }

    /// Build a reading from an extracted command, if it carries one.
    pub fn from_command(command: InboundCommand, device_id: &str) -> Option<Self> {
        match command {
            InboundCommand::Temperature(temperature) => Some(SensorReading::new(temperature, device_id)),
        }
    }

    /// The published payload: `"<temperature> <device id>"`.
    pub fn to_payload(&self) -> String {
        format!("{} {}", self.temperature, self.device_id)
    }

    /// Parse a published payload.
    ///
    /// Splits on the first space; the temperature must be a plain integer and
    /// the device id non-empty.
    pub fn from_payload(payload: &str) -> Option<Self> {
        let (temperature, device_id) = payload.trim().split_once(' ')?;
        let temperature = temperature.parse().ok()?;
        if device_id.is_empty() {
            return None;
        }
        Some(SensorReading::new(temperature, device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format() {
        assert_eq!(SensorReading::new(-5, "dev1").to_payload(), "-5 dev1");
        assert_eq!(SensorReading::new(21, "esp01").to_payload(), "21 esp01");
    }

    #[test]
    fn test_from_payload() {
        assert_eq!(
            SensorReading::from_payload("-5 dev1"),
            Some(SensorReading::new(-5, "dev1"))
        );
        assert_eq!(
            SensorReading::from_payload("21 8bd76e47-6b20-4107-ba43-34088f085343\n"),
            Some(SensorReading::new(21, "8bd76e47-6b20-4107-ba43-34088f085343"))
        );
    }

    #[test]
    fn test_from_payload_rejects_malformed() {
        assert_eq!(SensorReading::from_payload(""), None);
        assert_eq!(SensorReading::from_payload("21"), None);
        assert_eq!(SensorReading::from_payload("21 "), None);
        assert_eq!(SensorReading::from_payload("warm dev1"), None);
        assert_eq!(SensorReading::from_payload("21.5 dev1"), None);
    }

    #[test]
    fn test_from_command() {
        let reading = SensorReading::from_command(InboundCommand::Temperature(30), "dev1");
        assert_eq!(reading, Some(SensorReading::new(30, "dev1")));
    }
}
