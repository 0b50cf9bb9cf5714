//! MQTT to UART bridge core.
//!
//! Translates between broker topics and the peripheral controller's serial
//! command language:
//!
//! - `peripherals/led0` and `peripherals/lcd_display` messages become
//!   `CMD+LED=` and `CMD+MSG=` frames on the serial port
//! - `CMD+TEM=` frames read from the serial port become
//!   `"<temperature> <device id>"` messages on `sensors/temp`
//!
//! The crate is transport-agnostic. The serial port is reached through the
//! [`SerialSink`] and [`SerialSource`] traits and the broker through
//! [`MqttTransport`]; the runner crate supplies the real implementations.
//!
//! # Example
//!
//! ```rust
//! use uartbridge_core::{Bridge, GatewayError, MqttTransport, QoS, SerialSink, SessionError, SessionEvent};
//!
//! struct NullPort;
//! impl SerialSink for NullPort {
//!     fn write_all(&mut self, _bytes: &[u8]) -> Result<(), GatewayError> {
//!         Ok(())
//!     }
//! }
//!
//! struct NullBroker;
//! impl MqttTransport for NullBroker {
//!     fn subscribe(&self, _topic: &str, _qos: QoS) -> Result<(), SessionError> {
//!         Ok(())
//!     }
//!     fn publish(&self, _topic: &str, _qos: QoS, _retain: bool, _payload: &[u8]) -> Result<(), SessionError> {
//!         Ok(())
//!     }
//! }
//!
//! let bridge = Bridge::new("esp01", Box::new(NullPort), Box::new(NullBroker));
//! bridge.handle_session_event(SessionEvent::Connected);
//! assert!(bridge.session().is_connected());
//! ```

mod bridge;
mod error;
mod gateway;
mod queue;
mod reading;
mod router;
mod session;
mod topic;

pub use bridge::*;
pub use error::*;
pub use gateway::*;
pub use queue::*;
pub use reading::*;
pub use router::*;
pub use session::*;
pub use topic::*;
