//! Bridge configuration.
//!
//! Loaded from a YAML file; every field except `device_id` has a default.
//!
//! ```yaml
//! device_id: esp01
//! broker:
//!   host: localhost
//!   port: 1885
//! serial:
//!   port: /dev/ttyUSB0
//!   baud_rate: 9600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uartbridge_core::{DEFAULT_QUEUE_DEPTH, DEFAULT_RING_CAPACITY};
use uartbridge_protocol::SERIAL_BUFFER_SIZE;

/// Default broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1885;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A field holds a value the bridge cannot run with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Identifier appended to every published reading.
    pub device_id: String,
    /// Broker connection.
    pub broker: BrokerConfig,
    /// Serial port.
    pub serial: SerialConfig,
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Client id; defaults to `uartbridge-<device_id>`.
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    /// Pause between reconnection attempts.
    pub reconnect_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            host: "localhost".to_string(),
            port: DEFAULT_BROKER_PORT,
            username: None,
            password: None,
            client_id: None,
            keep_alive_secs: 30,
            reconnect_delay_ms: 1000,
        }
    }
}

impl BrokerConfig {
    /// Keep-alive interval.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Pause between reconnection attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Maximum bytes handled per read cycle.
    pub buffer_size: usize,
    /// Pending receive notifications before the queue overflows.
    pub queue_depth: usize,
    /// Received bytes held before the ring overflows.
    pub ring_capacity: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: default_serial_port().to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            buffer_size: SERIAL_BUFFER_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }
}

fn default_serial_port() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else {
        "/dev/ttyUSB0"
    }
}

impl BridgeConfig {
    /// Load a configuration file.
    ///
    /// The result is not validated; call [`validate`](Self::validate) after
    /// applying any overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(BridgeConfig::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Client id used when connecting to the broker.
    pub fn client_id(&self) -> String {
        self.broker
            .client_id
            .clone()
            .unwrap_or_else(|| format!("uartbridge-{}", self.device_id))
    }

    /// A copy safe to print: the broker password is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.broker.password.is_some() {
            config.broker.password = Some("********".to_string());
        }
        config
    }

    /// Check that the bridge can run with these settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::Invalid("device_id must be set".to_string()));
        }
        if self.device_id.chars().any(char::is_whitespace) {
            // The published payload splits on the first space.
            return Err(ConfigError::Invalid(format!(
                "device_id {:?} must not contain whitespace",
                self.device_id
            )));
        }
        self.validate_broker()?;
        self.validate_serial()
    }

    /// Check only the broker settings.
    pub fn validate_broker(&self) -> Result<(), ConfigError> {
        if self.broker.host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker.host must be set".to_string()));
        }
        if self.broker.port == 0 {
            return Err(ConfigError::Invalid("broker.port must be non-zero".to_string()));
        }
        if self.broker.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid(
                "broker.keep_alive_secs must be at least 5".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_serial(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial.port must be set".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be non-zero".to_string()));
        }
        for (name, value) in [
            ("serial.buffer_size", self.serial.buffer_size),
            ("serial.queue_depth", self.serial.queue_depth),
            ("serial.ring_capacity", self.serial.ring_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = BridgeConfig::default();
        assert_eq!(config.broker.port, 1885);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.buffer_size, 256);
        assert_eq!(config.serial.queue_depth, 100);
        assert_eq!(config.serial.ring_capacity, 512);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = BridgeConfig::from_yaml_str(
            "device_id: esp01\nbroker:\n  host: broker.local\nserial:\n  port: /dev/ttyACM0\n",
        )
        .unwrap();

        assert_eq!(config.device_id, "esp01");
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1885);
        assert_eq!(config.serial.port, "/dev/ttyACM0");
        assert_eq!(config.serial.baud_rate, 9600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(BridgeConfig::from_yaml_str("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = BridgeConfig::default();
        config.device_id = "esp01".to_string();
        config.broker.username = Some("bridge".to_string());

        let text = config.to_yaml().unwrap();
        assert_eq!(BridgeConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_malformed_yaml() {
        let result = BridgeConfig::from_yaml_str("broker: [1, 2");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_client_id() {
        let mut config = BridgeConfig::default();
        config.device_id = "esp01".to_string();
        assert_eq!(config.client_id(), "uartbridge-esp01");

        config.broker.client_id = Some("custom".to_string());
        assert_eq!(config.client_id(), "custom");
    }

    #[test]
    fn test_validate_device_id() {
        let mut config = BridgeConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.device_id = "esp 01".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.device_id = "8bd76e47-6b20-4107-ba43-34088f085343".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_sizes_and_host() {
        let mut config = BridgeConfig::default();
        config.device_id = "esp01".to_string();

        let mut zero_buffer = config.clone();
        zero_buffer.serial.buffer_size = 0;
        assert!(zero_buffer.validate().is_err());

        let mut zero_queue = config.clone();
        zero_queue.serial.queue_depth = 0;
        assert!(zero_queue.validate().is_err());

        let mut no_host = config.clone();
        no_host.broker.host = "  ".to_string();
        assert!(no_host.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = BridgeConfig::from_file(Path::new("/nonexistent/uartbridge.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validate_broker_ignores_device_and_serial() {
        let mut config = BridgeConfig::default();
        config.serial.port.clear();
        assert!(config.validate_broker().is_ok());

        config.broker.keep_alive_secs = 1;
        assert!(config.validate_broker().is_err());
    }

    #[test]
    fn test_redacted_masks_password() {
        let mut config = BridgeConfig::default();
        assert_eq!(config.redacted().broker.password, None);

        config.broker.password = Some("secret".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.broker.password.as_deref(), Some("********"));
        assert_eq!(config.broker.password.as_deref(), Some("secret"));
    }
}
