//! Literal strings of the command language.

/// Terminates every command unit on the wire.
pub const FRAME_DELIMITER: &str = ">>>";

/// Prefix of an inbound temperature reading (`CMD+TEM=<int>`).
pub const TEMPERATURE_PREFIX: &str = "CMD+TEM=";

/// Prefix of an outbound LED command (`CMD+LED=<0|1>>>>`).
pub const LED_PREFIX: &str = "CMD+LED=";

/// Prefix of an outbound display command (`CMD+MSG=<text>>>>`).
pub const DISPLAY_PREFIX: &str = "CMD+MSG=";

/// The only LED payload that switches the LED on. Exact, case-sensitive.
pub const LED_ON_PAYLOAD: &str = "ON";

/// Default size of the serial read buffer.
pub const SERIAL_BUFFER_SIZE: usize = 256;
