//! Response report decoding.
//!
//! Responses are 9 raw bytes with an opcode-dependent layout. The first
//! few bytes carry the sensor payload; byte 7 echoes the transaction tag
//! of the command that produced the response.

use crate::{
    AccelerationSample, LightSample, ObstacleSample, ProtocolError, ProtocolResult, REPORT_SIZE,
    RESPONSE_TAG_OFFSET, SHAKE_BIT, TAP_BIT, raw_to_celsius, raw_to_g,
};

/// A raw 9-byte inbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseReport {
    bytes: [u8; REPORT_SIZE],
}

impl ResponseReport {
    pub fn new(bytes: [u8; REPORT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Decode from a transport buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidReportSize`] when the buffer is not
    /// exactly [`REPORT_SIZE`] bytes.
    pub fn from_bytes(data: &[u8]) -> ProtocolResult<Self> {
        let bytes: [u8; REPORT_SIZE] =
            data.try_into()
                .map_err(|_| ProtocolError::InvalidReportSize {
                    expected: REPORT_SIZE,
                    actual: data.len(),
                })?;
        Ok(Self { bytes })
    }

    /// The echoed transaction tag (byte 7).
    pub fn tag(&self) -> u8 {
        self.bytes[RESPONSE_TAG_OFFSET]
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.bytes
    }

    /// Temperature in °C from a `T` response.
    pub fn temperature_c(&self) -> f64 {
        raw_to_celsius(self.bytes[0])
    }

    /// Acceleration triple in G from an `A` response (bytes 1..=3).
    pub fn acceleration(&self) -> AccelerationSample {
        AccelerationSample {
            x: raw_to_g(self.bytes[1]),
            y: raw_to_g(self.bytes[2]),
            z: raw_to_g(self.bytes[3]),
        }
    }

    /// Tap event bit from an `A` response.
    pub fn tapped(&self) -> bool {
        self.bytes[4] & TAP_BIT != 0
    }

    /// Shake event bit from an `A` response.
    pub fn shaken(&self) -> bool {
        self.bytes[4] & SHAKE_BIT != 0
    }

    /// Light sensor pair from an `L` response (bytes 0, 1).
    pub fn light_sensors(&self) -> LightSample {
        LightSample {
            left: self.bytes[0],
            right: self.bytes[1],
        }
    }

    /// Obstacle sensor pair from an `I` response (bytes 0, 1; 0/1 states).
    pub fn obstacle_sensors(&self) -> ObstacleSample {
        ObstacleSample {
            left: self.bytes[0] != 0,
            right: self.bytes[1] != 0,
        }
    }

    /// Firmware ping count from a `z` response.
    pub fn ping_count(&self) -> u8 {
        self.bytes[0]
    }
}
