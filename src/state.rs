//! Last known device state and the derived heating state.
//!
//! The thermostat reports its settings and the room temperature, but not
//! whether its relay is currently heating. [`HeatingState`] derives that from
//! consecutive status reads using the hysteresis configured on the device.

use crate::protocol as proto;
use std::fmt;

/// Whether the thermostat is currently heating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HeatingState {
    /// No status has been read yet, or the readings never left the dead band.
    #[default]
    Unknown,
    Idle,
    Heating,
}

impl HeatingState {
    /// Computes the state following a status read.
    ///
    /// `self` is the state before the read, the other values come from the new
    /// status. Inside the dead band `setpoint ± hysteresis / 2` the state is kept,
    /// so a first reading inside the band leaves the state `Unknown`.
    pub fn next(
        self,
        power: proto::Power,
        temperature: f32,
        setpoint: f32,
        hysteresis: f32,
    ) -> Self {
        let was_idle = matches!(self, HeatingState::Idle | HeatingState::Unknown);
        if !power.is_on() {
            HeatingState::Idle
        } else if was_idle && temperature < setpoint - hysteresis / 2.0 {
            HeatingState::Heating
        } else if !was_idle && temperature > setpoint + hysteresis / 2.0 {
            HeatingState::Idle
        } else {
            self
        }
    }

    /// `None` while the state is unknown.
    pub fn idle(&self) -> Option<bool> {
        match self {
            HeatingState::Unknown => None,
            HeatingState::Idle => Some(true),
            HeatingState::Heating => Some(false),
        }
    }
}

impl fmt::Display for HeatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatingState::Unknown => write!(f, "unknown"),
            HeatingState::Idle => write!(f, "idle"),
            HeatingState::Heating => write!(f, "heating"),
        }
    }
}

/// The cached state of one thermostat.
///
/// All device values are `None` until the first successful exchange. The
/// snapshot is only ever replaced as a whole by [`Snapshot::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    status: Option<proto::Status>,
    heating: HeatingState,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a new status response and returns the resulting snapshot.
    pub fn update(&self, status: proto::Status, hysteresis: f32) -> Self {
        let heating = self.heating.next(
            status.power(),
            status.temperature(),
            status.setpoint(),
            hysteresis,
        );
        Self {
            status: Some(status),
            heating,
        }
    }

    /// The settings needed to build a "set all data" command.
    ///
    /// `None` until a status has been read, no command may be built from
    /// partially unknown settings.
    pub fn settings(&self) -> Option<proto::Settings> {
        self.status.as_ref().map(proto::Status::settings)
    }

    /// Room temperature in °C.
    pub fn current_temperature(&self) -> Option<f32> {
        self.status.map(|status| status.temperature())
    }

    /// Target temperature in °C.
    pub fn setpoint(&self) -> Option<f32> {
        self.status.map(|status| status.setpoint())
    }

    pub fn power(&self) -> Option<proto::Power> {
        self.status.map(|status| status.power())
    }

    pub fn mode(&self) -> Option<proto::Mode> {
        self.status.map(|status| status.mode())
    }

    pub fn locked(&self) -> Option<bool> {
        self.status.map(|status| status.is_locked())
    }

    pub fn calibration(&self) -> Option<i16> {
        self.status.map(|status| status.calibration())
    }

    pub fn heating_state(&self) -> HeatingState {
        self.heating
    }

    /// Whether the thermostat is not heating, `None` while unknown.
    pub fn idle(&self) -> Option<bool> {
        self.heating.idle()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            Some(status) => write!(f, "{status}, {}", self.heating),
            None => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Frame, Power, Status, FLAG_MANUAL_MODE, FLAG_POWER};

    fn status(power: Power, temperature: f32, setpoint: f32) -> Status {
        let mut flags = FLAG_MANUAL_MODE;
        if power.is_on() {
            flags |= FLAG_POWER;
        }
        let frame = Frame::new(
            0x50,
            flags,
            0xFB,
            (setpoint * 2.0) as u8,
            (temperature * 2.0) as u8,
        );
        Status::try_from(frame).unwrap()
    }

    #[test]
    fn hysteresis_transitions() {
        let state = HeatingState::Unknown.next(Power::On, 19.0, 21.0, 1.0);
        assert_eq!(state, HeatingState::Heating);
        // Still heating inside the band.
        let state = state.next(Power::On, 21.4, 21.0, 1.0);
        assert_eq!(state, HeatingState::Heating);
        let state = state.next(Power::On, 21.6, 21.0, 1.0);
        assert_eq!(state, HeatingState::Idle);
        let state = state.next(Power::On, 21.2, 21.0, 1.0);
        assert_eq!(state, HeatingState::Idle);
        let state = state.next(Power::On, 20.6, 21.0, 1.0);
        assert_eq!(state, HeatingState::Idle);
        let state = state.next(Power::On, 20.4, 21.0, 1.0);
        assert_eq!(state, HeatingState::Heating);
    }

    #[test]
    fn power_off_is_idle() {
        for state in [
            HeatingState::Unknown,
            HeatingState::Idle,
            HeatingState::Heating,
        ] {
            assert_eq!(state.next(Power::Off, 5.0, 21.0, 1.0), HeatingState::Idle);
            assert_eq!(state.next(Power::Off, 30.0, 21.0, 1.0), HeatingState::Idle);
        }
    }

    #[test]
    fn unknown_inside_band_stays_unknown() {
        assert_eq!(
            HeatingState::Unknown.next(Power::On, 21.0, 21.0, 1.0),
            HeatingState::Unknown
        );
        // Unknown counts as idle, leaving the band upwards does not flip it.
        assert_eq!(
            HeatingState::Unknown.next(Power::On, 23.0, 21.0, 1.0),
            HeatingState::Unknown
        );
    }

    #[test]
    fn zero_hysteresis() {
        assert_eq!(
            HeatingState::Idle.next(Power::On, 20.5, 21.0, 0.0),
            HeatingState::Heating
        );
        assert_eq!(
            HeatingState::Heating.next(Power::On, 21.0, 21.0, 0.0),
            HeatingState::Heating
        );
        assert_eq!(
            HeatingState::Heating.next(Power::On, 21.5, 21.0, 0.0),
            HeatingState::Idle
        );
    }

    #[test]
    fn snapshot_update() {
        let snapshot = Snapshot::new();
        assert_eq!(snapshot.settings(), None);
        assert_eq!(snapshot.current_temperature(), None);
        assert_eq!(snapshot.idle(), None);

        let snapshot = snapshot.update(status(Power::On, 19.0, 21.0), 1.0);
        assert_eq!(snapshot.current_temperature(), Some(19.0));
        assert_eq!(snapshot.setpoint(), Some(21.0));
        assert_eq!(snapshot.power(), Some(Power::On));
        assert_eq!(snapshot.calibration(), Some(-5));
        assert_eq!(snapshot.locked(), Some(false));
        assert_eq!(snapshot.heating_state(), HeatingState::Heating);
        assert_eq!(snapshot.idle(), Some(false));
        assert!(snapshot.settings().is_some());

        // The new setpoint is used together with the previous heating state.
        let snapshot = snapshot.update(status(Power::On, 19.0, 18.0), 1.0);
        assert_eq!(snapshot.heating_state(), HeatingState::Idle);

        let snapshot = snapshot.update(status(Power::Off, 10.0, 18.0), 1.0);
        assert_eq!(snapshot.idle(), Some(true));
        assert_eq!(snapshot.power(), Some(Power::Off));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn heating_state_serde() {
        assert_eq!(
            serde_yaml::to_string(&HeatingState::Heating).unwrap().trim(),
            "heating"
        );
    }
}
