//! This module provides common data structures and error types for the `tokio`
//! based clients.
//!
//! It defines the `Error` enum, which encapsulates all possible communication
//! errors, and the fixed network parameters of the thermostat.
use crate::protocol as proto;
use std::time::Duration;

/// The TCP port the thermostat listens on.
pub const DEFAULT_PORT: u16 = 8899;
/// Upper bound for establishing a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for sending a command and receiving the response.
pub const READ_TIMEOUT: Duration = Duration::from_secs(3);
/// Maximum number of bytes read as response.
pub const MAX_RESPONSE_LEN: usize = 64;
/// Default dead band width in °C.
pub const DEFAULT_HYSTERESIS: f32 = 1.0;

/// Represents all possible errors that can occur while talking to the thermostat.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Wraps `proto::Error`, the response is malformed or not a status frame.
    #[error(transparent)]
    ProtocolError(#[from] proto::Error),

    /// Connecting, writing or reading failed.
    #[error("Transport error: {0}")]
    TransportError(#[from] std::io::Error),

    #[error("No connection within {0:?}")]
    ConnectTimeout(Duration),

    #[error("No response within {0:?}")]
    ReadTimeout(Duration),

    /// The command needs the device settings, but no status has been read yet.
    #[error("Device state is unknown, the status must be read first")]
    PreconditionNotMet,
}

/// The result type for tokio operations.
pub type Result<T> = std::result::Result<T, crate::tokio_common::Error>;

/// Time limits for a single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for ExchangeTimeouts {
    fn default() -> Self {
        Self {
            connect: CONNECT_TIMEOUT,
            read: READ_TIMEOUT,
        }
    }
}
