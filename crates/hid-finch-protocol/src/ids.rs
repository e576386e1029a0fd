//! Command opcodes for the Finch 9-byte report protocol.

/// Single-character opcode carried in byte 1 of every command report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `O` — set the beak LED color (R, G, B payload).
    SetLed,
    /// `M` — set motor speeds (direction bit + magnitude per wheel).
    SetMotors,
    /// `B` — buzzer control (frequency to start, all-zero payload to stop).
    Buzzer,
    /// `T` — read the thermometer.
    Temperature,
    /// `A` — read the acceleration triple plus tap/shake event bits.
    Accelerometer,
    /// `L` — read the left/right light sensor pair.
    LightSensors,
    /// `I` — read the left/right obstacle sensor pair.
    ObstacleSensors,
    /// `z` — read the firmware ping counter. Used by the keep-alive path.
    PingCounter,
    /// `R` — reset the robot to idle mode.
    Reset,
}

impl Opcode {
    /// Wire byte for this opcode.
    pub const fn as_byte(self) -> u8 {
        match self {
            Opcode::SetLed => b'O',
            Opcode::SetMotors => b'M',
            Opcode::Buzzer => b'B',
            Opcode::Temperature => b'T',
            Opcode::Accelerometer => b'A',
            Opcode::LightSensors => b'L',
            Opcode::ObstacleSensors => b'I',
            Opcode::PingCounter => b'z',
            Opcode::Reset => b'R',
        }
    }

    /// Whether a command with this opcode expects a response report.
    pub const fn expects_response(self) -> bool {
        matches!(
            self,
            Opcode::Temperature
                | Opcode::Accelerometer
                | Opcode::LightSensors
                | Opcode::ObstacleSensors
                | Opcode::PingCounter
        )
    }

    /// Whether this opcode skips transaction-tag correlation.
    ///
    /// The ping counter has no caller waiting on a specific response, so
    /// its commands carry no tag and any response frame is accepted.
    pub const fn is_tag_exempt(self) -> bool {
        matches!(self, Opcode::PingCounter)
    }
}
