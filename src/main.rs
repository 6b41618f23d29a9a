//! BHT1000 Thermostat CLI
//!
//! A command-line interface (CLI) application for reading and controlling
//! BHT1000 Wi-Fi thermostats over their TCP protocol.
//!
//! This tool allows users to:
//! - Read the current temperature, setpoint, power, mode, child lock and
//!   calibration, together with the derived heating state.
//! - Turn the thermostat on or off, change the setpoint and the mode.
//! - Lock and unlock the device buttons.
//! - Synchronise the device clock with the local time.
//! - Check whether a thermostat is reachable.
//! - Run in a continuous daemon mode, polling one thermostat or all
//!   thermostats of a configuration file in parallel.
//!
//! The CLI leverages the `bht1000_lib` crate for protocol definitions and client operations.

use anyhow::{bail, Context, Result};
use bht1000_lib::{
    protocol as proto,
    state::{HeatingState, Snapshot},
    tokio_async_safe_client::SafeClient,
    tokio_common::{ExchangeTimeouts, DEFAULT_HYSTERESIS},
};
use clap::Parser;
use commandline::{CliCommands, CliConnection, Endpoint, HvacMode};
use dialoguer::Confirm;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use std::{panic, time::Duration};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

mod commandline;
mod config;

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown_file>", 0, 0));

        let cause_str = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            *s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "<unknown_panic_cause>"
        };

        error!(
            target: "panic",
            "Thread '{}' panicked at '{}': {}:{} - Cause: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            filename,
            line,
            column,
            cause_str
        );
    }));
    log_handle
}

/// The HVAC mode a climate front end shows for the snapshot.
fn hvac_mode(snapshot: &Snapshot) -> Option<&'static str> {
    match (snapshot.power()?, snapshot.mode()?) {
        (proto::Power::Off, _) => Some("off"),
        (proto::Power::On, proto::Mode::Weekly) => Some("auto"),
        (proto::Power::On, proto::Mode::Manual) => Some("heat"),
    }
}

/// The HVAC action a climate front end shows for the snapshot.
fn hvac_action(snapshot: &Snapshot) -> Option<&'static str> {
    if snapshot.power()? == proto::Power::Off {
        return Some("off");
    }
    match snapshot.heating_state() {
        HeatingState::Unknown => None,
        HeatingState::Idle => Some("idle"),
        HeatingState::Heating => Some("heating"),
    }
}

fn print_status(name: &str, snapshot: &Snapshot) {
    println!(
        "{name}: {snapshot} [hvac mode: {}, hvac action: {}]",
        hvac_mode(snapshot).unwrap_or("unknown"),
        hvac_action(snapshot).unwrap_or("unknown")
    );
}

/// Turns the boolean result of a client operation into an error.
fn ensure(succeeded: bool, operation: &str, endpoint: &Endpoint) -> Result<()> {
    if succeeded {
        Ok(())
    } else {
        bail!("Cannot {operation} ({endpoint}), use -v for details")
    }
}

/// Prompts the user for confirmation before the buttons get locked.
fn confirm_lock() -> Result<bool> {
    println!("WARNING: The child lock disables all buttons on the thermostat.");
    Confirm::new()
        .with_prompt("Do you want to lock the thermostat?")
        .default(false)
        .show_default(true)
        .interact()
        .context("Failed to get user confirmation.")
}

/// Reads the status periodically and prints it, forever.
///
/// With `sync_time` the device clock is set once after the first successful read.
async fn poll(client: SafeClient, name: String, poll_interval: Duration, sync_time: bool) {
    let mut time_synced = !sync_time;
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        debug!("Daemon: Reading status of {name}...");
        if client.read_status().await {
            print_status(&name, &client.snapshot().await);
            if !time_synced {
                time_synced = client.set_time(&chrono::Local::now()).await;
                if time_synced {
                    info!("Time of {name} synchronised");
                }
            }
        } else {
            println!("{name}: unavailable");
        }
    }
}

async fn wait_for_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Cannot listen for Ctrl-C")?;
    info!("Received Ctrl-C, stopping...");
    Ok(())
}

/// Handles the check command.
async fn handle_check(endpoint: &Endpoint, timeouts: ExchangeTimeouts) -> Result<()> {
    info!("Executing: Check {endpoint}");
    let client = SafeClient::new(endpoint.host.clone(), endpoint.port, DEFAULT_HYSTERESIS)
        .with_timeouts(timeouts);
    if client.check_reachable().await {
        println!("Thermostat {endpoint} is reachable.");
        Ok(())
    } else {
        bail!(
            "Thermostat {endpoint} is not reachable within {:?}",
            client.timeouts().connect
        )
    }
}

/// Polls all configured thermostats in parallel until Ctrl-C.
async fn handle_daemon(config_file: &str, timeouts: ExchangeTimeouts) -> Result<()> {
    let config = config::Config::load(config_file)?;
    trace!("Config: {config:?}");
    info!(
        "Starting daemon mode: {} thermostat(s), interval={:?}",
        config.thermostats.len(),
        config.poll_interval
    );

    let mut tasks = JoinSet::new();
    for thermostat in config.thermostats {
        let client = SafeClient::new(thermostat.host, thermostat.port, thermostat.hysteresis)
            .with_timeouts(timeouts);
        tasks.spawn(poll(
            client,
            thermostat.name,
            config.poll_interval,
            thermostat.sync_time,
        ));
    }
    wait_for_ctrl_c().await?;
    tasks.shutdown().await;
    Ok(())
}

/// Executes a command against a single thermostat.
async fn handle_command(
    client: &SafeClient,
    endpoint: &Endpoint,
    command: &CliCommands,
    yes: bool,
) -> Result<()> {
    if let CliCommands::Daemon { poll_interval } = command {
        info!("Starting daemon mode: interval={poll_interval:?}");
        tokio::select! {
            _ = poll(client.clone(), endpoint.to_string(), *poll_interval, false) => {}
            result = wait_for_ctrl_c() => result?,
        }
        return Ok(());
    }

    // Every command resends settings or is guarded by them, so they must be known.
    ensure(client.read_status().await, "read status", endpoint)?;

    match command {
        CliCommands::Daemon { .. } => unreachable!("Daemon should be handled earlier."),
        CliCommands::Read => {
            info!("Executing: Read Status");
        }
        CliCommands::TurnOn => {
            info!("Executing: Turn On");
            ensure(client.turn_on().await, "turn on", endpoint)?;
        }
        CliCommands::TurnOff => {
            info!("Executing: Turn Off");
            ensure(client.turn_off().await, "turn off", endpoint)?;
        }
        CliCommands::SetTemperature { value } => {
            info!("Executing: Set Temperature to {value} °C");
            ensure(
                client.set_temperature(*value).await,
                "set temperature",
                endpoint,
            )?;
        }
        CliCommands::Lock => {
            if !yes && !confirm_lock()? {
                info!("Lock aborted by user.");
                return Ok(());
            }
            info!("Executing: Lock");
            ensure(client.lock().await, "lock", endpoint)?;
        }
        CliCommands::Unlock => {
            info!("Executing: Unlock");
            ensure(client.unlock().await, "unlock", endpoint)?;
        }
        CliCommands::SetManualMode => {
            info!("Executing: Set Manual Mode");
            ensure(client.set_manual_mode().await, "set manual mode", endpoint)?;
        }
        CliCommands::SetWeeklyMode => {
            info!("Executing: Set Weekly Mode");
            ensure(client.set_weekly_mode().await, "set weekly mode", endpoint)?;
        }
        CliCommands::SetHvacMode { mode } => {
            info!("Executing: Set HVAC Mode to {mode:?}");
            match mode {
                HvacMode::Off => ensure(client.turn_off().await, "turn off", endpoint)?,
                HvacMode::Heat => {
                    ensure(client.turn_on().await, "turn on", endpoint)?;
                    ensure(client.set_manual_mode().await, "set manual mode", endpoint)?;
                }
                HvacMode::Auto => {
                    ensure(client.turn_on().await, "turn on", endpoint)?;
                    ensure(client.set_weekly_mode().await, "set weekly mode", endpoint)?;
                }
            }
        }
        CliCommands::SyncTime => {
            let now = chrono::Local::now();
            info!("Executing: Sync Time");
            ensure(client.set_time(&now).await, "set time", endpoint)?;
            println!("Time set to {}.", now.format("%A %H:%M:%S"));
        }
    }

    print_status(&endpoint.to_string(), &client.snapshot().await);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = commandline::CliArgs::parse();

    // 1. Initialize logging as early as possible
    let _log_handle = logging_init(args.verbose.log_level_filter());
    info!(
        "BHT1000 CLI started. Log level: {}",
        args.verbose.log_level_filter()
    );

    // 2. Execute the command
    let timeouts = args.timeouts();
    match &args.connection {
        CliConnection::Check { endpoint } => handle_check(endpoint, timeouts).await,
        CliConnection::Daemon { config_file } => handle_daemon(config_file, timeouts).await,
        CliConnection::Tcp {
            endpoint,
            hysteresis,
            command,
        } => {
            let client = SafeClient::new(endpoint.host.clone(), endpoint.port, *hysteresis)
                .with_timeouts(timeouts);
            info!(
                "Using thermostat {}:{} (hysteresis: {} °C)",
                client.host(),
                client.port(),
                client.hysteresis()
            );
            handle_command(&client, endpoint, command, args.yes).await
        }
    }
}
