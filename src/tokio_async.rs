//! Asynchronous, stateless network client for the BHT1000 thermostat.
//!
//! This module provides the low-level API (`BHT1000` struct) to exchange
//! frames with the thermostat over TCP. Every exchange uses a fresh
//! connection: connect, write one command frame, read one response, close.
//! The response is hex-encoded and decoded into a validated
//! [`proto::Status`].
//!
//! The functions keep no device state, see
//! [`crate::tokio_async_safe_client::SafeClient`] for the stateful controller.
//!
//! # Examples
//!
//! ```no_run
//! use bht1000_lib::protocol::Frame;
//! use bht1000_lib::tokio_async::BHT1000;
//! use bht1000_lib::tokio_common::{ExchangeTimeouts, DEFAULT_PORT};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let status = BHT1000::exchange(
//!         "192.168.1.50",
//!         DEFAULT_PORT,
//!         &Frame::read_status(),
//!         &ExchangeTimeouts::default(),
//!     )
//!     .await?;
//!     println!("Status: {}", status);
//!     Ok(())
//! }
//! ```

use crate::{
    protocol as proto,
    tokio_common::{Error, ExchangeTimeouts, Result, MAX_RESPONSE_LEN},
};
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Stateless request/response functions for the BHT1000 thermostat.
#[derive(Debug)]
pub struct BHT1000;

impl BHT1000 {
    /// Opens a connection within the given time.
    async fn connect(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(stream) => Ok(stream?),
            Err(_) => Err(Error::ConnectTimeout(timeout)),
        }
    }

    /// Shuts the connection down and releases it, errors are only logged.
    async fn close(mut stream: TcpStream) {
        if let Err(err) = stream.shutdown().await {
            trace!("Closing connection failed: {err}");
        }
    }

    async fn write_and_read(stream: &mut TcpStream, frame: &proto::Frame) -> Result<Vec<u8>> {
        stream.write_all(&frame.encode()).await?;
        let mut buffer = [0u8; MAX_RESPONSE_LEN];
        let len = stream.read(&mut buffer).await?;
        Ok(buffer[..len].to_vec())
    }

    /// Checks whether a connection to the thermostat can be established.
    ///
    /// The connection is closed right away, nothing is sent.
    pub async fn check_reachable(host: &str, port: u16, timeout: Duration) -> Result<()> {
        let stream = Self::connect(host, port, timeout).await?;
        Self::close(stream).await;
        Ok(())
    }

    /// Sends a command frame and returns the status the thermostat answers with.
    ///
    /// The connection is closed on every path before the response is
    /// interpreted.
    ///
    /// # Errors
    ///
    /// * `Error::ConnectTimeout` / `Error::ReadTimeout` if a phase exceeds its limit.
    /// * `Error::TransportError` if connecting, writing or reading fails.
    /// * `Error::ProtocolError` if the response is shorter than a frame, not
    ///   hexadecimal or not a status frame.
    pub async fn exchange(
        host: &str,
        port: u16,
        frame: &proto::Frame,
        timeouts: &ExchangeTimeouts,
    ) -> Result<proto::Status> {
        let mut stream = Self::connect(host, port, timeouts.connect).await?;
        debug!("bytes to send ({host}:{port}): {frame}");
        let received =
            tokio::time::timeout(timeouts.read, Self::write_and_read(&mut stream, frame)).await;
        Self::close(stream).await;

        let received = match received {
            Ok(received) => received?,
            Err(_) => return Err(Error::ReadTimeout(timeouts.read)),
        };
        let text = hex::encode(&received);
        debug!("bytes received ({host}:{port}): {text}");
        Ok(proto::Status::decode(&text)?)
    }
}

/// A scripted thermostat for tests.
#[cfg(test)]
pub(crate) mod fake_device {
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// What the device did during one connection.
    #[derive(Debug)]
    pub(crate) struct Served {
        /// The command frame received.
        pub request: Vec<u8>,
        /// Whether the client closed the connection.
        pub closed: bool,
    }

    /// Accepts `responses.len()` connections. Each one reads the command frame
    /// and answers with the next response, `None` means no answer at all.
    /// Afterwards it waits for the client to close the connection.
    pub(crate) async fn serve(
        responses: Vec<Option<Vec<u8>>>,
    ) -> (SocketAddr, JoinHandle<Vec<Served>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut served = Vec::new();
            for response in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = vec![0u8; 8];
                socket.read_exact(&mut request).await.unwrap();
                if let Some(response) = response {
                    socket.write_all(&response).await.unwrap();
                }
                let mut rest = [0u8; 16];
                let closed = matches!(socket.read(&mut rest).await, Ok(0) | Err(_));
                served.push(Served { request, closed });
            }
            served
        });
        (addr, handle)
    }

    /// Raw status response bytes.
    pub(crate) fn status_bytes(flags: u8, setpoint: f32, temperature: f32) -> Vec<u8> {
        crate::protocol::Frame::new(
            crate::protocol::STATUS_COMMAND,
            flags,
            0xFB,
            (setpoint * 2.0) as u8,
            (temperature * 2.0) as u8,
        )
        .encode()
        .to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::fake_device::{serve, status_bytes};
    use super::*;
    use assert_matches::assert_matches;

    fn short_timeouts() -> ExchangeTimeouts {
        ExchangeTimeouts {
            connect: Duration::from_secs(2),
            read: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn exchange_status() {
        let (addr, device) = serve(vec![Some(status_bytes(0x18, 21.5, 20.0))]).await;
        let status = BHT1000::exchange(
            "127.0.0.1",
            addr.port(),
            &proto::Frame::read_status(),
            &short_timeouts(),
        )
        .await
        .unwrap();
        assert_eq!(status.setpoint(), 21.5);
        assert_eq!(status.temperature(), 20.0);
        assert_eq!(status.calibration(), -5);

        let served = device.await.unwrap();
        assert_eq!(served[0].request, proto::Frame::read_status().encode());
        assert!(served[0].closed);
    }

    #[tokio::test]
    async fn exchange_ignores_trailing_bytes() {
        let mut response = status_bytes(0x10, 20.0, 19.5);
        response.extend_from_slice(&[0xAA; 8]);
        let (addr, _device) = serve(vec![Some(response)]).await;
        let status = BHT1000::exchange(
            "127.0.0.1",
            addr.port(),
            &proto::Frame::lock(),
            &short_timeouts(),
        )
        .await
        .unwrap();
        assert_eq!(status.temperature(), 19.5);
    }

    #[tokio::test]
    async fn exchange_timeout_closes_connection() {
        let (addr, device) = serve(vec![None]).await;
        let result = BHT1000::exchange(
            "127.0.0.1",
            addr.port(),
            &proto::Frame::read_status(),
            &short_timeouts(),
        )
        .await;
        assert_matches!(result, Err(Error::ReadTimeout(..)));
        assert!(device.await.unwrap()[0].closed);
    }

    #[tokio::test]
    async fn exchange_short_response() {
        let (addr, _device) = serve(vec![Some(vec![0x50, 0x01, 0x01])]).await;
        let result = BHT1000::exchange(
            "127.0.0.1",
            addr.port(),
            &proto::Frame::read_status(),
            &short_timeouts(),
        )
        .await;
        assert_matches!(
            result,
            Err(Error::ProtocolError(proto::Error::MalformedFrame(..)))
        );
    }

    #[tokio::test]
    async fn exchange_invalid_status() {
        let echo = proto::Frame::read_status().encode().to_vec();
        let (addr, _device) = serve(vec![Some(echo)]).await;
        let result = BHT1000::exchange(
            "127.0.0.1",
            addr.port(),
            &proto::Frame::read_status(),
            &short_timeouts(),
        )
        .await;
        assert_matches!(
            result,
            Err(Error::ProtocolError(proto::Error::InvalidFrame { .. }))
        );
    }

    #[tokio::test]
    async fn check_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert_matches!(
            BHT1000::check_reachable("127.0.0.1", port, Duration::from_secs(2)).await,
            Ok(())
        );

        drop(listener);
        assert_matches!(
            BHT1000::check_reachable("127.0.0.1", port, Duration::from_secs(2)).await,
            Err(Error::TransportError(..))
        );
    }
}
