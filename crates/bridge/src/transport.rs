//! Blocking socket plumbing shared by the receiver and the publisher.

use crate::config::BrokerConfig;
use crate::errors::BridgeError;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use wire::{ConnAck, FrameAccumulator, decode_conn_ack, encode_connect};

/// Size of the stack buffer each socket read fills
const READ_CHUNK: usize = 4096;

/// Resolve the broker and open a TCP connection with both directions
/// bounded by `io_timeout`.
pub fn open(
    broker: &BrokerConfig,
    connect_timeout: Duration,
    io_timeout: Duration,
) -> Result<TcpStream, BridgeError> {
    let address = broker.address();
    let mut last_error = None;

    for candidate in address.to_socket_addrs()? {
        match TcpStream::connect_timeout(&candidate, connect_timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(io_timeout))?;
                stream.set_write_timeout(Some(io_timeout))?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%candidate, error = %e, "Connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .map(BridgeError::from)
        .unwrap_or(BridgeError::UnresolvedAddress(address)))
}

/// Whether a read failed only because its timeout elapsed.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Outcome of one [`poll_frame`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A complete frame, either already buffered or completed by this read
    Frame(Vec<u8>),
    /// Bytes arrived but the frame is not complete yet
    Partial,
    /// The read timed out with nothing new
    Idle,
}

/// Return a buffered frame, or do at most one read.
///
/// Any partial frame stays in `acc` for the next call. A clean EOF is
/// [`BridgeError::ConnectionClosed`].
pub fn poll_frame<S: Read>(
    stream: &mut S,
    acc: &mut FrameAccumulator,
) -> Result<Inbound, BridgeError> {
    if let Some(frame) = acc.next_frame()? {
        return Ok(Inbound::Frame(frame));
    }

    let mut chunk = [0u8; READ_CHUNK];
    let n = loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Err(BridgeError::ConnectionClosed),
            Ok(n) => break n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_timeout(&e) => return Ok(Inbound::Idle),
            Err(e) => return Err(e.into()),
        }
    };
    acc.extend(&chunk[..n]);

    Ok(match acc.next_frame()? {
        Some(frame) => Inbound::Frame(frame),
        None => Inbound::Partial,
    })
}

/// Read until a complete frame arrives. A read that times out first is an
/// error.
pub fn expect_frame<S: Read>(
    stream: &mut S,
    acc: &mut FrameAccumulator,
    waiting_for: &str,
) -> Result<Vec<u8>, BridgeError> {
    loop {
        match poll_frame(stream, acc)? {
            Inbound::Frame(frame) => return Ok(frame),
            Inbound::Partial => continue,
            Inbound::Idle => {
                return Err(BridgeError::Socket(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("timed out waiting for {}", waiting_for),
                )));
            }
        }
    }
}

/// Send CONNECT and wait for an accepting CONNACK.
pub fn handshake<S: Read + Write>(
    stream: &mut S,
    client_id: &str,
    keep_alive_secs: u16,
    acc: &mut FrameAccumulator,
) -> Result<ConnAck, BridgeError> {
    stream.write_all(&encode_connect(client_id, keep_alive_secs)?)?;
    stream.flush()?;

    let frame = expect_frame(stream, acc, "CONNACK")?;
    let ack = decode_conn_ack(&frame)?;
    if !ack.is_accepted() {
        return Err(BridgeError::ConnectionRefused(ack.return_code));
    }
    Ok(ack)
}
