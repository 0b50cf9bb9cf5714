//! Runner for the MQTT to UART bridge.
//!
//! Wires the transport-agnostic core to real I/O: a `serialport` handle on
//! one side and a `rumqttc` client on the other. The `uartbridge` binary
//! exposes three commands:
//!
//! - `run`: bridge the serial port and the broker until Ctrl-C, exiting
//!   with an error if the serial port stops delivering data
//! - `monitor`: print every `sensors/temp` reading as a JSON line
//! - `check-config`: validate and print the effective configuration

pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod mqtt;
pub mod serial;

pub use config::{BridgeConfig, BrokerConfig, ConfigError, SerialConfig};
pub use error::{RunnerError, RunnerResult};
