//! Peripheral UART Command Protocol
//!
//! This crate provides types and utilities for talking to the peripheral
//! controller over its UART. The controller speaks a small text command
//! language where every command unit is terminated by the literal `>>>`.
//!
//! # Protocol Overview
//!
//! - **Inbound** (controller → bridge): `CMD+TEM=<int>` temperature readings,
//!   possibly several per read, separated by `>>>`
//! - **Outbound** (bridge → controller): `CMD+LED=<0|1>>>>` and
//!   `CMD+MSG=<text>>>>`
//!
//! The serial link is noisy and chunked, so parsing is permissive: tokens
//! without a recognized command prefix, or with a malformed value, are
//! silently discarded rather than reported.
//!
//! # Example
//!
//! ```rust
//! use uartbridge_protocol::{commands, CommandFrame, InboundCommand};
//!
//! // Decode readings from a raw serial chunk
//! let decoded: Vec<_> = commands(b"CMD+TEM=21>>>CMD+TEM=22>>>").collect();
//! assert_eq!(decoded, vec![InboundCommand::Temperature(21), InboundCommand::Temperature(22)]);
//!
//! // Build an outbound frame
//! let frame = CommandFrame::led_from_payload(b"ON");
//! assert_eq!(frame.encode(), b"CMD+LED=1>>>");
//! ```

mod buffer;
mod constants;
mod error;
mod extract;
mod frame;
mod tokenizer;

pub use buffer::*;
pub use constants::*;
pub use error::*;
pub use extract::*;
pub use frame::*;
pub use tokenizer::*;
