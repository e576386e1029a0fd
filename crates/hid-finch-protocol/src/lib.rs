//! HID protocol implementation for the BirdBrain Finch robot.
//!
//! The Finch speaks a fixed-size 9-byte report protocol in both directions
//! over USB HID. Byte 0 of a command is the (always zero) report ID, byte 1
//! is a single ASCII opcode, bytes 2..=7 are opcode-specific payload, and
//! byte 8 optionally carries a one-byte transaction tag which the firmware
//! echoes back at byte 7 of the matching response.
//!
//! This crate is I/O-free: it provides opcodes, report encoders and
//! decoders, raw-to-engineering-unit conversions and the orientation
//! classifiers. Everything that touches a device handle lives in
//! `finch-session`.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]

pub mod command;
pub mod convert;
pub mod ids;
pub mod response;

pub use command::*;
pub use convert::*;
pub use ids::*;
pub use response::*;

use thiserror::Error;

/// Errors returned by Finch protocol encoders and decoders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("LED channel {channel} out of range: {value} (valid 0..=255)")]
    ChannelOutOfRange { channel: &'static str, value: i16 },

    #[error("{wheel} wheel speed out of range: {value} (valid -255..=255)")]
    SpeedOutOfRange { wheel: &'static str, value: i16 },

    #[error("Invalid report size: expected {expected}, got {actual}")]
    InvalidReportSize { expected: usize, actual: usize },
}

/// Convenience result alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// BirdBrain Technologies USB Vendor ID (`0x2354`).
pub const VENDOR_ID: u16 = 0x2354;
/// Product ID for the Finch robot.
pub const PRODUCT_ID: u16 = 0x1111;

/// Report size in bytes, identical in both directions.
pub const REPORT_SIZE: usize = 9;

/// Byte offset of the transaction tag in a command report.
pub const COMMAND_TAG_OFFSET: usize = 8;
/// Byte offset of the echoed transaction tag in a response report.
pub const RESPONSE_TAG_OFFSET: usize = 7;

/// Tap event bit in byte 4 of an acceleration response.
pub const TAP_BIT: u8 = 0x20;
/// Shake event bit in byte 4 of an acceleration response.
pub const SHAKE_BIT: u8 = 0x80;
