//! Asynchronous, stateful controller for the BHT1000 thermostat.
//!
//! This module provides the high-level API (`SafeClient` struct). It keeps the
//! last known [`Snapshot`] of the device, refuses commands that would have to
//! be built from unknown settings and derives the heating state after every
//! successful exchange.
//!
//! All operations are `async`, return `true` on success and `false` on any
//! failure. Errors are logged and never propagated, a failed operation leaves
//! the snapshot untouched. There are no retries.
//!
//! ## Example
//!
//! ```no_run
//! use bht1000_lib::tokio_async_safe_client::SafeClient;
//! use bht1000_lib::tokio_common::DEFAULT_PORT;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = SafeClient::new("192.168.1.50", DEFAULT_PORT, 1.0);
//!     if client.read_status().await && client.set_temperature(21.5).await {
//!         println!("Thermostat: {}", client.snapshot().await);
//!     }
//! }
//! ```

use crate::{
    protocol as proto,
    state::{HeatingState, Snapshot},
    tokio_async::BHT1000,
    tokio_common::{Error, ExchangeTimeouts, Result},
};
use chrono::{Datelike, Timelike};
use log::{debug, trace, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Asynchronous controller for one BHT1000 thermostat.
///
/// Clones share the same snapshot, so the client can be handed to several
/// tasks. Each operation opens its own connection; the snapshot lock is only
/// held while the snapshot is replaced, never during network I/O.
#[derive(Debug, Clone)]
pub struct SafeClient {
    host: String,
    port: u16,
    hysteresis: f32,
    timeouts: ExchangeTimeouts,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl SafeClient {
    /// Creates a new `SafeClient` for the thermostat at `host:port`.
    ///
    /// * `hysteresis` - The dead band width in °C configured on the device. It
    ///   cannot be queried but is needed to tell whether the device is heating.
    pub fn new(host: impl Into<String>, port: u16, hysteresis: f32) -> Self {
        Self {
            host: host.into(),
            port,
            hysteresis,
            timeouts: ExchangeTimeouts::default(),
            snapshot: Arc::new(Mutex::new(Snapshot::new())),
        }
    }

    /// Replaces the connect and read time limits.
    pub fn with_timeouts(self, timeouts: ExchangeTimeouts) -> Self {
        Self { timeouts, ..self }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn hysteresis(&self) -> f32 {
        self.hysteresis
    }

    pub fn timeouts(&self) -> &ExchangeTimeouts {
        &self.timeouts
    }

    /// Checks whether the thermostat accepts connections.
    ///
    /// Meant for validating a configuration, not for polling.
    pub async fn check_reachable(&self) -> bool {
        debug!("check reachable ({}:{})", self.host, self.port);
        self.succeeded(
            "check reachable",
            BHT1000::check_reachable(&self.host, self.port, self.timeouts.connect).await,
        )
    }

    /// Reads the current status and replaces the snapshot.
    pub async fn read_status(&self) -> bool {
        debug!("read status ({}:{})", self.host, self.port);
        self.succeeded(
            "read status",
            self.send_command(&proto::Frame::read_status()).await,
        )
    }

    pub async fn turn_on(&self) -> bool {
        debug!("turn on ({}:{})", self.host, self.port);
        self.set_all_data("turn on", |settings| settings.with_power(proto::Power::On))
            .await
    }

    pub async fn turn_off(&self) -> bool {
        debug!("turn off ({}:{})", self.host, self.port);
        self.set_all_data("turn off", |settings| settings.with_power(proto::Power::Off))
            .await
    }

    /// Sets the target temperature in °C.
    pub async fn set_temperature(&self, setpoint: f32) -> bool {
        debug!("set temperature to {setpoint} ({}:{})", self.host, self.port);
        self.set_all_data("set temperature", |settings| settings.with_setpoint(setpoint))
            .await
    }

    pub async fn set_manual_mode(&self) -> bool {
        debug!("set manual mode ({}:{})", self.host, self.port);
        self.set_all_data("set manual mode", |settings| {
            settings.with_mode(proto::Mode::Manual)
        })
        .await
    }

    pub async fn set_weekly_mode(&self) -> bool {
        debug!("set weekly mode ({}:{})", self.host, self.port);
        self.set_all_data("set weekly mode", |settings| {
            settings.with_mode(proto::Mode::Weekly)
        })
        .await
    }

    /// Activates the child lock.
    ///
    /// The lock command does not depend on the device settings, but like all
    /// commands it is only sent once the status is known.
    pub async fn lock(&self) -> bool {
        debug!("lock ({}:{})", self.host, self.port);
        self.send_guarded("lock", proto::Frame::lock()).await
    }

    /// Releases the child lock.
    pub async fn unlock(&self) -> bool {
        debug!("unlock ({}:{})", self.host, self.port);
        self.send_guarded("unlock", proto::Frame::unlock()).await
    }

    /// Sets the device clock to the given local time.
    pub async fn set_time<T: Datelike + Timelike>(&self, time: &T) -> bool {
        debug!("set time ({}:{})", self.host, self.port);
        self.send_guarded("set time", proto::Frame::set_time(time)).await
    }

    /// A copy of the last known device state.
    pub async fn snapshot(&self) -> Snapshot {
        *self.snapshot.lock().await
    }

    /// Room temperature in °C.
    pub async fn current_temperature(&self) -> Option<f32> {
        self.snapshot.lock().await.current_temperature()
    }

    /// Target temperature in °C.
    pub async fn setpoint(&self) -> Option<f32> {
        self.snapshot.lock().await.setpoint()
    }

    pub async fn power(&self) -> Option<proto::Power> {
        self.snapshot.lock().await.power()
    }

    pub async fn mode(&self) -> Option<proto::Mode> {
        self.snapshot.lock().await.mode()
    }

    pub async fn locked(&self) -> Option<bool> {
        self.snapshot.lock().await.locked()
    }

    pub async fn calibration(&self) -> Option<i16> {
        self.snapshot.lock().await.calibration()
    }

    pub async fn heating_state(&self) -> HeatingState {
        self.snapshot.lock().await.heating_state()
    }

    /// Whether the thermostat is not heating.
    ///
    /// This is derived from the readings, the device cannot report it.
    pub async fn idle(&self) -> Option<bool> {
        self.snapshot.lock().await.idle()
    }

    /// Collapses a result into the boolean returned by the public API.
    fn succeeded(&self, operation: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) => {
                warn!("{operation} ({}:{}) failed: {err}", self.host, self.port);
                false
            }
        }
    }

    /// The known settings, or `PreconditionNotMet` before the first status read.
    async fn settings(&self) -> Result<proto::Settings> {
        self.snapshot
            .lock()
            .await
            .settings()
            .ok_or(Error::PreconditionNotMet)
    }

    async fn set_all_data<F>(&self, operation: &str, change: F) -> bool
    where
        F: FnOnce(proto::Settings) -> proto::Settings,
    {
        self.succeeded(operation, self.try_set_all_data(change).await)
    }

    async fn try_set_all_data<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(proto::Settings) -> proto::Settings,
    {
        let settings = change(self.settings().await?);
        let frame = proto::Frame::set_all_data(&settings)?;
        self.send_command(&frame).await
    }

    async fn send_guarded(&self, operation: &str, frame: proto::Frame) -> bool {
        self.succeeded(operation, self.try_send_guarded(&frame).await)
    }

    async fn try_send_guarded(&self, frame: &proto::Frame) -> Result<()> {
        self.settings().await?;
        self.send_command(frame).await
    }

    /// Exchanges one frame and replaces the snapshot with the response.
    async fn send_command(&self, frame: &proto::Frame) -> Result<()> {
        let status = BHT1000::exchange(&self.host, self.port, frame, &self.timeouts).await?;
        let mut snapshot = self.snapshot.lock().await;
        let updated = snapshot.update(status, self.hysteresis);
        if updated.heating_state() != snapshot.heating_state() {
            trace!(
                "heating state {} -> {} ({}:{})",
                snapshot.heating_state(),
                updated.heating_state(),
                self.host,
                self.port
            );
        }
        *snapshot = updated;
        Ok(())
    }
}
