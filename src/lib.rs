//! A library for controlling the BHT1000 Wi-Fi thermostat over its binary TCP protocol.
//!
//! This crate provides two layers to interact with the thermostat:
//!
//! 1.  **High-Level, Stateful Controller**: [`tokio_async_safe_client::SafeClient`]
//!     keeps the last known device state, guards commands that rewrite all
//!     device settings, and derives whether the thermostat is heating. This is
//!     the recommended approach for most users.
//!
//! 2.  **Low-Level, Stateless Functions**: [`tokio_async::BHT1000`] exchanges a
//!     single frame with the device and returns the decoded status.
//!
//! The frame codec in [`protocol`] does no I/O and is always available.
//!
//! ## Features
//!
//! - **Protocol Implementation**: Frame encoding, checksum, status decoding.
//! - **Heating State**: Hysteresis based idle/heating detection, see [`state`].
//! - **Connection per Command**: Every operation opens, uses and closes its own
//!   TCP connection with bounded connect and read times.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bht1000_lib::tokio_async_safe_client::SafeClient;
//! use bht1000_lib::tokio_common::DEFAULT_PORT;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = SafeClient::new("192.168.1.50", DEFAULT_PORT, 1.0);
//!     if client.read_status().await {
//!         println!("Thermostat: {}", client.snapshot().await);
//!     }
//!     // Commands other than a status read need a known state first.
//!     client.turn_on().await;
//! }
//! ```

mod error;
pub mod protocol;
pub mod state;

pub use error::Error;

#[cfg(feature = "tokio-tcp")]
pub mod tokio_common;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-tcp")))]
#[cfg(feature = "tokio-tcp")]
pub mod tokio_async;

#[cfg_attr(docsrs, doc(cfg(feature = "tokio-tcp")))]
#[cfg(feature = "tokio-tcp")]
pub mod tokio_async_safe_client;
