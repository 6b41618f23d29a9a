/// Errors raised while encoding or decoding BHT1000 frames.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The response text is too short or contains non hexadecimal characters.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame is well formed but is not a status response.
    #[error("Invalid status frame (command: {command:#04x}, id0: {id0:#04x}, id1: {id1:#04x})")]
    InvalidFrame { command: u8, id0: u8, id1: u8 },

    /// The calibration offset cannot be encoded into a single byte.
    #[error("Calibration offset {0} is out of range")]
    CalibrationOutOfRange(i16),

    /// The setpoint cannot be encoded in half degrees into a single byte.
    #[error("Setpoint {0} °C is out of range")]
    SetpointOutOfRange(f32),
}
