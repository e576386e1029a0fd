//! Command report encoding for the Finch.
//!
//! Every command is exactly [`REPORT_SIZE`] bytes: report ID (always 0),
//! opcode, payload, optional transaction tag in the last byte. Constructors
//! validate their numeric inputs before producing a report, so an
//! out-of-range value never reaches the wire.

use crate::{COMMAND_TAG_OFFSET, Opcode, ProtocolError, ProtocolResult, REPORT_SIZE};

/// A fully framed 9-byte outbound report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandReport {
    bytes: [u8; REPORT_SIZE],
    opcode: Opcode,
}

impl CommandReport {
    fn with_payload(opcode: Opcode, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= REPORT_SIZE - 3);
        let mut bytes = [0u8; REPORT_SIZE];
        bytes[1] = opcode.as_byte();
        bytes[2..2 + payload.len()].copy_from_slice(payload);
        Self { bytes, opcode }
    }

    /// `O` — set the beak LED color. Each channel must be within 0..=255.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChannelOutOfRange`] for the first channel
    /// outside the valid range; no report is produced.
    pub fn set_led(red: i16, green: i16, blue: i16) -> ProtocolResult<Self> {
        for (channel, value) in [("red", red), ("green", green), ("blue", blue)] {
            if !(0..=255).contains(&value) {
                return Err(ProtocolError::ChannelOutOfRange { channel, value });
            }
        }
        Ok(Self::with_payload(
            Opcode::SetLed,
            &[red as u8, green as u8, blue as u8],
        ))
    }

    /// `M` — set wheel speeds. Each speed must be within -255..=255.
    ///
    /// A negative speed is encoded as a direction bit of 1 plus the
    /// magnitude byte; forward motion uses a direction bit of 0.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::SpeedOutOfRange`] for the first wheel
    /// outside the valid range; no report is produced.
    pub fn set_motors(left: i16, right: i16) -> ProtocolResult<Self> {
        for (wheel, value) in [("left", left), ("right", right)] {
            if !(-255..=255).contains(&value) {
                return Err(ProtocolError::SpeedOutOfRange { wheel, value });
            }
        }
        let (left_dir, left_mag) = direction_and_magnitude(left);
        let (right_dir, right_mag) = direction_and_magnitude(right);
        Ok(Self::with_payload(
            Opcode::SetMotors,
            &[left_dir, left_mag, right_dir, right_mag],
        ))
    }

    /// `B` — start the buzzer at `freq_hz`.
    ///
    /// The firmware expects two `0xFF` marker bytes ahead of the big-endian
    /// frequency pair.
    pub fn buzzer_on(freq_hz: u16) -> Self {
        Self::with_payload(
            Opcode::Buzzer,
            &[0xFF, 0xFF, (freq_hz >> 8) as u8, (freq_hz & 0xFF) as u8],
        )
    }

    /// `B` with an all-zero payload — stop the buzzer.
    pub fn buzzer_off() -> Self {
        Self::with_payload(Opcode::Buzzer, &[])
    }

    /// `R` — reset the robot to idle mode.
    pub fn reset() -> Self {
        Self::with_payload(Opcode::Reset, &[])
    }

    /// A payload-free read command for one of the sensor opcodes.
    pub fn query(opcode: Opcode) -> Self {
        Self::with_payload(opcode, &[])
    }

    /// Stamp the transaction tag into the last byte.
    #[must_use]
    pub fn with_tag(mut self, tag: u8) -> Self {
        self.bytes[COMMAND_TAG_OFFSET] = tag;
        self
    }

    /// The transaction tag currently framed in the last byte.
    pub fn tag(&self) -> u8 {
        self.bytes[COMMAND_TAG_OFFSET]
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn as_bytes(&self) -> &[u8; REPORT_SIZE] {
        &self.bytes
    }
}

fn direction_and_magnitude(speed: i16) -> (u8, u8) {
    if speed < 0 {
        (1, (-speed) as u8)
    } else {
        (0, speed as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_led_layout() {
        let report = CommandReport::set_led(255, 128, 0).expect("valid channels");
        assert_eq!(report.as_bytes(), &[0, b'O', 255, 128, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_set_led_rejects_out_of_range() {
        assert!(matches!(
            CommandReport::set_led(256, 0, 0),
            Err(ProtocolError::ChannelOutOfRange { channel: "red", .. })
        ));
        assert!(matches!(
            CommandReport::set_led(0, -1, 0),
            Err(ProtocolError::ChannelOutOfRange {
                channel: "green",
                ..
            })
        ));
        assert!(CommandReport::set_led(0, 0, 1000).is_err());
    }

    #[test]
    fn test_set_motors_forward_layout() {
        let report = CommandReport::set_motors(200, 100).expect("valid speeds");
        assert_eq!(report.as_bytes(), &[0, b'M', 0, 200, 0, 100, 0, 0, 0]);
    }

    #[test]
    fn test_set_motors_reverse_sets_direction_bit() {
        let report = CommandReport::set_motors(-255, -1).expect("valid speeds");
        assert_eq!(report.as_bytes(), &[0, b'M', 1, 255, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_set_motors_rejects_out_of_range() {
        assert!(matches!(
            CommandReport::set_motors(256, 0),
            Err(ProtocolError::SpeedOutOfRange { wheel: "left", .. })
        ));
        assert!(matches!(
            CommandReport::set_motors(0, -256),
            Err(ProtocolError::SpeedOutOfRange { wheel: "right", .. })
        ));
    }

    #[test]
    fn test_buzzer_on_layout() {
        let report = CommandReport::buzzer_on(440);
        assert_eq!(
            report.as_bytes(),
            &[0, b'B', 0xFF, 0xFF, 0x01, 0xB8, 0, 0, 0]
        );
    }

    #[test]
    fn test_buzzer_off_is_all_zero_payload() {
        let report = CommandReport::buzzer_off();
        assert_eq!(report.as_bytes(), &[0, b'B', 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_tag_occupies_last_byte() {
        let report = CommandReport::query(Opcode::Temperature).with_tag(0xAB);
        assert_eq!(report.tag(), 0xAB);
        assert_eq!(report.as_bytes()[8], 0xAB);
        assert_eq!(report.as_bytes()[1], b'T');
    }

    #[test]
    fn test_report_id_byte_is_zero() {
        for report in [
            CommandReport::buzzer_on(1000),
            CommandReport::reset(),
            CommandReport::query(Opcode::PingCounter),
        ] {
            assert_eq!(report.as_bytes()[0], 0);
        }
    }
}
