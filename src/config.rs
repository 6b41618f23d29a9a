use anyhow::{bail, Context, Result};
use bht1000_lib::tokio_common;
use log::debug;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// One thermostat polled by the daemon.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThermostatConfig {
    /// Name used in the output.
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Dead band width in °C as configured on the device.
    #[serde(default = "default_hysteresis")]
    pub hysteresis: f32,
    /// Set the device clock after the first successful read.
    #[serde(default)]
    pub sync_time: bool,
}

fn default_port() -> u16 {
    tokio_common::DEFAULT_PORT
}

fn default_hysteresis() -> f32 {
    tokio_common::DEFAULT_HYSTERESIS
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    pub thermostats: Vec<ThermostatConfig>,
}

impl Config {
    pub const DEFAULT_CONFIG_FILE: &'static str = "bhtctl.yml";

    pub fn load(path: &str) -> Result<Config> {
        debug!("Loading config file from {path:?}");
        let file = File::open(Path::new(path))
            .with_context(|| format!("Cannot open config file {path:?}"))?;
        let config: Config = serde_yaml::from_reader(file)
            .with_context(|| format!("Cannot parse config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.thermostats.is_empty() {
            bail!("No thermostats configured");
        }
        for thermostat in &self.thermostats {
            if !(thermostat.hysteresis.is_finite() && thermostat.hysteresis >= 0.0) {
                bail!(
                    "Invalid hysteresis {} for thermostat {:?}",
                    thermostat.hysteresis,
                    thermostat.name
                );
            }
        }
        if self.poll_interval.is_zero() {
            bail!("The poll interval must not be zero");
        }
        Ok(())
    }
}
