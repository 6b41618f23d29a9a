//! Frame codec for the BHT1000 thermostat protocol.
//!
//! Every message exchanged with the thermostat is an 8 byte [`Frame`]:
//!
//! ```text
//! command | id0 | id1 | data0 | data1 | data2 | data3 | checksum
//! ```
//!
//! Outgoing frames are written as raw bytes. The device answers with a status
//! frame which is handled as hexadecimal text (two characters per byte), see
//! [`Frame::decode`] and [`Status`].
//!
//! This module does no I/O.

pub use crate::Error;
use chrono::{Datelike, Timelike};
use std::fmt;

/// Fixed protocol identifiers carried by every frame.
pub const ID0: u8 = 0x01;
pub const ID1: u8 = 0x01;

/// The summed fields are XOR-ed with this value to form the checksum.
pub const CHECKSUM_XOR: u8 = 0xA5;

/// Number of bytes in a frame.
pub const FRAME_LEN: usize = 8;
/// Number of hexadecimal characters needed to decode a frame.
pub const FRAME_HEX_LEN: usize = 2 * FRAME_LEN;

pub const READ_STATUS_COMMAND: u8 = 0xA0;
pub const SET_ALL_DATA_COMMAND: u8 = 0xA1;
pub const LOCK_COMMAND: u8 = 0xA4;
pub const SET_TIME_COMMAND: u8 = 0xA8;
pub const STATUS_COMMAND: u8 = 0x50;

pub const FLAG_LOCK: u8 = 0x04;
pub const FLAG_MANUAL_MODE: u8 = 0x08;
pub const FLAG_POWER: u8 = 0x10;

pub const CALIBRATION_MIN: i16 = -256;
pub const CALIBRATION_MAX: i16 = 255;

pub const SETPOINT_MIN: f32 = 0.0;
pub const SETPOINT_MAX: f32 = 127.5;

/// Operating mode of the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// The setpoint is held until changed.
    Manual,
    /// The device follows its built-in weekly program.
    Weekly,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => write!(f, "manual"),
            Mode::Weekly => write!(f, "weekly"),
        }
    }
}

/// Power state of the thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Power {
    On,
    Off,
}

impl Power {
    pub fn is_on(&self) -> bool {
        *self == Power::On
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on {
            Power::On
        } else {
            Power::Off
        }
    }
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Power::On => write!(f, "on"),
            Power::Off => write!(f, "off"),
        }
    }
}

/// The complete set of user settings written by a "set all data" command.
///
/// The device has no command to change a single setting, so every change
/// resends all of them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    pub mode: Mode,
    pub power: Power,
    /// Child lock of the device buttons.
    pub locked: bool,
    /// Temperature sensor calibration offset.
    pub calibration: i16,
    /// Target temperature in °C, half degree resolution.
    pub setpoint: f32,
}

impl Settings {
    pub fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    pub fn with_power(self, power: Power) -> Self {
        Self { power, ..self }
    }

    pub fn with_setpoint(self, setpoint: f32) -> Self {
        Self { setpoint, ..self }
    }

    fn encode_flags(&self) -> u8 {
        let mut flags = 0x00;
        if self.locked {
            flags |= FLAG_LOCK;
        }
        if self.mode == Mode::Manual {
            flags |= FLAG_MANUAL_MODE;
        }
        if self.power.is_on() {
            flags |= FLAG_POWER;
        }
        flags
    }
}

/// Encodes a calibration offset, negative values are shifted by 256.
pub fn calibration_encode(calibration: i16) -> Result<u8, Error> {
    if !(CALIBRATION_MIN..=CALIBRATION_MAX).contains(&calibration) {
        return Err(Error::CalibrationOutOfRange(calibration));
    }
    let value = if calibration < 0 {
        calibration + 256
    } else {
        calibration
    };
    Ok(value as u8)
}

/// Decodes a calibration offset as reported by the device.
///
/// The raw value is always shifted down by 256, positive raw values included,
/// so the result round-trips through [`calibration_encode`].
pub fn calibration_decode(value: u8) -> i16 {
    value as i16 - 256
}

/// Encodes a temperature in half degrees, the fraction below 0.5 °C is truncated.
pub fn half_degree_encode(value: f32) -> Result<u8, Error> {
    if !(SETPOINT_MIN..=SETPOINT_MAX).contains(&value) {
        return Err(Error::SetpointOutOfRange(value));
    }
    Ok((value * 2.0) as u8)
}

pub fn half_degree_decode(value: u8) -> f32 {
    value as f32 / 2.0
}

/// A raw protocol frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub id0: u8,
    pub id1: u8,
    pub data0: u8,
    pub data1: u8,
    pub data2: u8,
    pub data3: u8,
    pub checksum: u8,
}

impl Frame {
    /// Creates an outgoing frame with the fixed identifiers and a valid checksum.
    pub fn new(command: u8, data0: u8, data1: u8, data2: u8, data3: u8) -> Self {
        let checksum = Self::checksum_of(&[command, ID0, ID1, data0, data1, data2, data3]);
        Self {
            command,
            id0: ID0,
            id1: ID1,
            data0,
            data1,
            data2,
            data3,
            checksum,
        }
    }

    /// Sums the fields modulo 256 and XORs the result with [`CHECKSUM_XOR`].
    pub fn checksum_of(fields: &[u8]) -> u8 {
        fields.iter().fold(0u8, |sum, field| sum.wrapping_add(*field)) ^ CHECKSUM_XOR
    }

    /// Queries the current state of the device.
    pub fn read_status() -> Self {
        Self::new(READ_STATUS_COMMAND, 0x00, 0x00, 0x00, 0x00)
    }

    /// Writes all user settings at once.
    pub fn set_all_data(settings: &Settings) -> Result<Self, Error> {
        Ok(Self::new(
            SET_ALL_DATA_COMMAND,
            settings.encode_flags(),
            calibration_encode(settings.calibration)?,
            half_degree_encode(settings.setpoint)?,
            0x00,
        ))
    }

    /// Activates the child lock.
    pub fn lock() -> Self {
        Self::new(LOCK_COMMAND, 1, 1, 1, 1)
    }

    /// Releases the child lock.
    pub fn unlock() -> Self {
        Self::new(LOCK_COMMAND, 0, 1, 1, 1)
    }

    /// Sets the device clock. The weekday is sent as 1 (Monday) to 7 (Sunday).
    pub fn set_time<T: Datelike + Timelike>(time: &T) -> Self {
        Self::new(
            SET_TIME_COMMAND,
            time.second() as u8,
            time.minute() as u8,
            time.hour() as u8,
            time.weekday().number_from_monday() as u8,
        )
    }

    /// The checksum computed from the frame fields.
    pub fn expected_checksum(&self) -> u8 {
        Self::checksum_of(&[
            self.command,
            self.id0,
            self.id1,
            self.data0,
            self.data1,
            self.data2,
            self.data3,
        ])
    }

    /// The raw bytes as written on the wire.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        [
            self.command,
            self.id0,
            self.id1,
            self.data0,
            self.data1,
            self.data2,
            self.data3,
            self.checksum,
        ]
    }

    /// Decodes a frame from hexadecimal text.
    ///
    /// Only the first [`FRAME_HEX_LEN`] characters are used, anything after
    /// them is ignored. The checksum is taken as is and not verified.
    pub fn decode(text: &str) -> Result<Self, Error> {
        if text.len() < FRAME_HEX_LEN {
            return Err(Error::MalformedFrame(format!(
                "expected at least {FRAME_HEX_LEN} hex characters, got {}",
                text.len()
            )));
        }
        let prefix = text.get(..FRAME_HEX_LEN).ok_or_else(|| {
            Error::MalformedFrame(format!("non hex characters in {text:?}"))
        })?;
        let mut raw = [0u8; FRAME_LEN];
        hex::decode_to_slice(prefix, &mut raw)
            .map_err(|err| Error::MalformedFrame(format!("{err} in {prefix:?}")))?;
        Ok(Self::from(raw))
    }

    /// A frame is a status response if it carries the status command and the
    /// fixed identifiers.
    pub fn is_status(&self) -> bool {
        self.command == STATUS_COMMAND && self.id0 == ID0 && self.id1 == ID1
    }
}

impl From<[u8; FRAME_LEN]> for Frame {
    fn from(raw: [u8; FRAME_LEN]) -> Self {
        Self {
            command: raw[0],
            id0: raw[1],
            id1: raw[2],
            data0: raw[3],
            data1: raw[4],
            data2: raw[5],
            data3: raw[6],
            checksum: raw[7],
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.encode()))
    }
}

/// A validated status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(Frame);

impl Status {
    /// Decodes and validates a status response from hexadecimal text.
    pub fn decode(text: &str) -> Result<Self, Error> {
        Self::try_from(Frame::decode(text)?)
    }

    pub fn is_locked(&self) -> bool {
        self.0.data0 & FLAG_LOCK != 0
    }

    pub fn mode(&self) -> Mode {
        if self.0.data0 & FLAG_MANUAL_MODE != 0 {
            Mode::Manual
        } else {
            Mode::Weekly
        }
    }

    pub fn power(&self) -> Power {
        Power::from(self.0.data0 & FLAG_POWER != 0)
    }

    pub fn calibration(&self) -> i16 {
        calibration_decode(self.0.data1)
    }

    /// Target temperature in °C.
    pub fn setpoint(&self) -> f32 {
        half_degree_decode(self.0.data2)
    }

    /// Measured room temperature in °C.
    pub fn temperature(&self) -> f32 {
        half_degree_decode(self.0.data3)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            mode: self.mode(),
            power: self.power(),
            locked: self.is_locked(),
            calibration: self.calibration(),
            setpoint: self.setpoint(),
        }
    }
}

impl TryFrom<Frame> for Status {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        if frame.is_status() {
            Ok(Self(frame))
        } else {
            Err(Error::InvalidFrame {
                command: frame.command,
                id0: frame.id0,
                id1: frame.id1,
            })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1} °C (setpoint: {:.1} °C, power: {}, mode: {}, locked: {}, calibration: {})",
            self.temperature(),
            self.setpoint(),
            self.power(),
            self.mode(),
            self.is_locked(),
            self.calibration()
        )
    }
}
