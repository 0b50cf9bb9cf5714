//! Extraction of typed commands from inbound tokens.
//!
//! Each recognized command shape is an entry in a prefix table. Adding a new
//! shape means adding a variant to [`InboundCommand`] and a row to the table;
//! the tokenizer is not involved.

use crate::constants::{FRAME_DELIMITER, TEMPERATURE_PREFIX};
use crate::tokenizer::{find_subslice, tokenize};

/// A command received from the peripheral controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundCommand {
    /// Temperature reading (`CMD+TEM=<int>`).
    Temperature(i32),
}

impl InboundCommand {
    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundCommand::Temperature(_) => "temperature",
        }
    }
}

/// One row of the prefix table.
struct Shape {
    prefix: &'static str,
    parse: fn(&[u8]) -> Option<InboundCommand>,
}

const SHAPES: &[Shape] = &[Shape {
    prefix: TEMPERATURE_PREFIX,
    parse: parse_temperature,
}];

fn parse_temperature(value: &[u8]) -> Option<InboundCommand> {
    parse_leading_int(value).map(InboundCommand::Temperature)
}

/// Extract a command from a single token.
///
/// The prefix is searched for inside this token only. Returns `None` when
/// the token carries no known prefix or its value does not parse; this is
/// never an error.
pub fn extract(token: &[u8]) -> Option<InboundCommand> {
    let command = SHAPES.iter().find_map(|shape| {
        let start = find_subslice(token, shape.prefix.as_bytes())?;
        (shape.parse)(&token[start + shape.prefix.len()..])
    });

    if command.is_none() && !token.is_empty() {
        log::trace!(
            "discarding token '{}'",
            String::from_utf8_lossy(token).escape_debug()
        );
    }

    command
}

/// Decode every complete command in a raw serial chunk.
///
/// A trailing fragment with no delimiter after it is not decoded.
pub fn commands(buf: &[u8]) -> impl Iterator<Item = InboundCommand> + '_ {
    tokenize(buf, FRAME_DELIMITER.as_bytes())
        .terminated()
        .filter_map(extract)
}

/// Parse a signed decimal integer at the start of `bytes`.
///
/// Accepts optional leading ASCII whitespace and an optional sign, requires at
/// least one digit and stops at the first non-digit. Values that do not fit
/// in an `i32` are rejected.
pub fn parse_leading_int(bytes: &[u8]) -> Option<i32> {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let bytes = &bytes[start..];

    let sign_len = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let digits = bytes[sign_len..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }

    // Only ASCII sign and digits remain, so this can not fail.
    let number = std::str::from_utf8(&bytes[..sign_len + digits]).ok()?;
    number.parse().ok()
}
