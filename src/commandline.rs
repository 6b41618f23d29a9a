use crate::config::Config;
use anyhow::Result;
use bht1000_lib::{protocol as proto, tokio_common};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::{fmt, time::Duration};

/// Host and TCP port of a thermostat.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parses `host`, `host:port`, a bare IPv6 address or `[IPv6]:port`.
fn parse_endpoint(s: &str) -> Result<Endpoint, String> {
    let parse_port = |port: &str| {
        port.parse::<u16>()
            .map_err(|e| format!("Invalid port number format: {e}"))
    };
    let (host, port) = if let Some(rest) = s.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| String::from("Missing ']' after IPv6 address"))?;
        let port = match rest {
            "" => tokio_common::DEFAULT_PORT,
            _ => parse_port(
                rest.strip_prefix(':')
                    .ok_or_else(|| format!("Unexpected {rest:?} after IPv6 address"))?,
            )?,
        };
        (host, port)
    } else if s.matches(':').count() > 1 {
        // A bare IPv6 address, the port needs the bracket form.
        (s, tokio_common::DEFAULT_PORT)
    } else {
        match s.split_once(':') {
            Some((host, port)) => (host, parse_port(port)?),
            None => (s, tokio_common::DEFAULT_PORT),
        }
    };
    if host.is_empty() {
        return Err(String::from("Host must not be empty"));
    }
    Ok(Endpoint {
        host: host.to_string(),
        port,
    })
}

fn parse_hysteresis(s: &str) -> Result<f32, String> {
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("Invalid hysteresis value format: {e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("Hysteresis must be a non-negative number, got {value}"))
    }
}

fn parse_poll_interval(s: &str) -> Result<Duration, String> {
    let value = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if value.is_zero() {
        return Err(String::from("The poll interval must not be zero"));
    }
    Ok(value)
}

fn parse_degree_celsius(s: &str) -> Result<f32, String> {
    let value = s
        .parse::<f32>()
        .map_err(|e| format!("Invalid temperature value format: {e}"))?;
    // Same range check as the encoder, so a bad value fails before connecting.
    proto::half_degree_encode(value).map_err(|e| e.to_string())?;
    Ok(value)
}

/// Operating modes as shown by climate front ends.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum HvacMode {
    /// Thermostat turned off.
    Off,
    /// Turned on, holding the setpoint (manual mode).
    Heat,
    /// Turned on, following the weekly program.
    Auto,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliConnection {
    /// Connect to a thermostat via TCP.
    Tcp {
        /// The IP address or hostname of the thermostat, optionally followed by the port.
        /// Example: "192.168.1.50" or "thermostat.local:8899".
        #[arg(value_parser = parse_endpoint, verbatim_doc_comment)]
        endpoint: Endpoint,

        /// The hysteresis (dead band in °C) configured on the thermostat.
        /// It cannot be read from the device and is only used to tell
        /// whether the thermostat is heating.
        #[arg(long, default_value_t = tokio_common::DEFAULT_HYSTERESIS, value_parser = parse_hysteresis, verbatim_doc_comment)]
        hysteresis: f32,

        /// Commands for the connected thermostat.
        #[command(subcommand)]
        command: CliCommands,
    },
    /// Check whether a thermostat accepts connections.
    Check {
        /// The IP address or hostname of the thermostat, optionally followed by the port.
        #[arg(value_parser = parse_endpoint)]
        endpoint: Endpoint,
    },
    /// Poll all thermostats of a configuration file and print their state.
    /// The thermostats are polled in parallel until Ctrl-C is pressed.
    #[clap(verbatim_doc_comment)]
    Daemon {
        /// The configuration file listing the thermostats.
        #[arg(long, default_value_t = Config::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Continuously read the status at the specified interval and print it.
    Daemon {
        /// Interval for reading the status (e.g., "10s", "1m")
        #[arg(value_parser = parse_poll_interval, short, long, default_value = "30s")]
        poll_interval: Duration,
    },

    /// Read and display the current status.
    Read,

    /// Turn the thermostat on, keeping all other settings.
    TurnOn,

    /// Turn the thermostat off, keeping all other settings.
    TurnOff,

    /// Set the target temperature.
    SetTemperature {
        /// Target temperature in degrees Celsius (°C), half degree resolution.
        /// Example: "21.5".
        #[arg(value_parser = parse_degree_celsius, verbatim_doc_comment)]
        value: f32,
    },

    /// Activate the child lock, disabling the buttons on the device.
    Lock,

    /// Release the child lock.
    Unlock,

    /// Hold the setpoint until it is changed.
    SetManualMode,

    /// Follow the weekly program stored on the device.
    SetWeeklyMode,

    /// Set power and mode the way climate front ends do:
    /// "off" turns the thermostat off, "heat" turns it on in manual mode,
    /// "auto" turns it on in weekly mode.
    #[clap(verbatim_doc_comment)]
    SetHvacMode {
        #[arg(value_enum)]
        mode: HvacMode,
    },

    /// Set the device clock to the local time of this computer.
    SyncTime,
}

const fn about_text() -> &'static str {
    "BHT1000 thermostat CLI - Read and control BHT1000 thermostats via TCP."
}

#[derive(Parser, Debug)]
#[command(name="bhtctl", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is warn.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    /// Specifies the connection method and device-specific commands.
    #[command(subcommand)]
    pub connection: CliConnection,

    /// Timeout for establishing the connection.
    /// Examples: "10s", "500ms".
    #[arg(global = true, long, default_value = "10s", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub connect_timeout: Duration,

    /// Timeout for sending a command and receiving the response.
    /// Examples: "3s", "500ms".
    #[arg(global = true, long, default_value = "3s", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub read_timeout: Duration,

    /// Do not ask for confirmation.
    #[arg(global = true, short, long)]
    pub yes: bool,
}

impl CliArgs {
    pub fn timeouts(&self) -> tokio_common::ExchangeTimeouts {
        tokio_common::ExchangeTimeouts {
            connect: self.connect_timeout,
            read: self.read_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint() {
        assert_eq!(
            parse_endpoint("192.168.1.50"),
            Ok(Endpoint {
                host: String::from("192.168.1.50"),
                port: 8899
            })
        );
        assert_eq!(
            parse_endpoint("thermostat.local:1234"),
            Ok(Endpoint {
                host: String::from("thermostat.local"),
                port: 1234
            })
        );
        assert!(parse_endpoint("thermostat.local:port").is_err());
        assert!(parse_endpoint(":8899").is_err());
    }

    #[test]
    fn endpoint_ipv6() {
        assert_eq!(
            parse_endpoint("fe80::1"),
            Ok(Endpoint {
                host: String::from("fe80::1"),
                port: 8899
            })
        );
        let endpoint = parse_endpoint("[::1]:9000").unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                host: String::from("::1"),
                port: 9000
            }
        );
        assert_eq!(endpoint.to_string(), "[::1]:9000");
        assert_eq!(parse_endpoint("[::1]").unwrap().port, 8899);
        assert!(parse_endpoint("[::1").is_err());
        assert!(parse_endpoint("[::1]9000").is_err());
        assert!(parse_endpoint("[]:8899").is_err());
    }

    #[test]
    fn poll_interval() {
        assert_eq!(parse_poll_interval("10s"), Ok(Duration::from_secs(10)));
        assert!(parse_poll_interval("0s").is_err());
        assert!(parse_poll_interval("soon").is_err());
        assert!(CliArgs::try_parse_from([
            "bhtctl",
            "tcp",
            "10.0.0.2",
            "daemon",
            "--poll-interval",
            "0s"
        ])
        .is_err());
    }

    #[test]
    fn hysteresis() {
        assert_eq!(parse_hysteresis("0.5"), Ok(0.5));
        assert_eq!(parse_hysteresis("0"), Ok(0.0));
        assert!(parse_hysteresis("-1").unwrap_err().contains("non-negative"));
        assert!(parse_hysteresis("NaN").is_err());
    }

    #[test]
    fn degree_celsius() {
        assert_eq!(parse_degree_celsius("21.5"), Ok(21.5));
        assert!(parse_degree_celsius("128").is_err());
        assert!(parse_degree_celsius("warm").is_err());
    }

    #[test]
    fn cli_arguments() {
        let args = CliArgs::try_parse_from([
            "bhtctl",
            "--read-timeout",
            "500ms",
            "tcp",
            "10.0.0.2",
            "set-temperature",
            "22",
        ])
        .unwrap();
        assert_eq!(args.read_timeout, Duration::from_millis(500));
        assert_eq!(args.timeouts().connect, Duration::from_secs(10));
        assert_eq!(
            args.connection,
            CliConnection::Tcp {
                endpoint: Endpoint {
                    host: String::from("10.0.0.2"),
                    port: 8899
                },
                hysteresis: 1.0,
                command: CliCommands::SetTemperature { value: 22.0 },
            }
        );

        let args = CliArgs::try_parse_from(["bhtctl", "tcp", "10.0.0.2", "set-hvac-mode", "auto"])
            .unwrap();
        assert!(matches!(
            args.connection,
            CliConnection::Tcp {
                command: CliCommands::SetHvacMode {
                    mode: HvacMode::Auto
                },
                ..
            }
        ));
    }
}
