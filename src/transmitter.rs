/// Transmitter module - outbound datagram adapters
///
/// The reporter only needs "send these bytes to the collector". Adapters
/// return the outcome as a value; the reporter decides what to do with a
/// failure (log it and let the next scheduled frame supersede it).

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::contracts::TELEMETRY_FRAME_LEN;
use crate::errors::{Result, TelemetryError};

/// Outbound half of the transport
pub trait DatagramSender {
    /// Send one datagram; returns bytes written
    ///
    /// Must not block the reporter loop for longer than a socket send.
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize>;
}

/// Non-blocking sender over a shared tokio socket
///
/// Uses `try_send_to`, so a full socket buffer surfaces as a transmit
/// failure instead of stalling the loop.
pub struct UdpTransmitter {
    socket: Arc<tokio::net::UdpSocket>,
    destination: SocketAddr,
}

impl UdpTransmitter {
    pub fn new(socket: Arc<tokio::net::UdpSocket>, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }
}

impl DatagramSender for UdpTransmitter {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize> {
        let sent = self
            .socket
            .try_send_to(bytes, self.destination)
            .map_err(|e| TelemetryError::TransmitFailure(e.to_string()))?;
        check_complete(sent, bytes.len())
    }
}

/// Blocking sender over a std socket, for hosts without a runtime
pub struct StdUdpTransmitter {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl StdUdpTransmitter {
    pub fn new(socket: UdpSocket, destination: SocketAddr) -> Self {
        Self {
            socket,
            destination,
        }
    }
}

impl DatagramSender for StdUdpTransmitter {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize> {
        let sent = self
            .socket
            .send_to(bytes, self.destination)
            .map_err(|e| TelemetryError::TransmitFailure(e.to_string()))?;
        check_complete(sent, bytes.len())
    }
}

fn check_complete(sent: usize, expected: usize) -> Result<usize> {
    if sent != expected {
        return Err(TelemetryError::TransmitFailure(format!(
            "short send: {} of {} bytes",
            sent, expected
        )));
    }
    Ok(sent)
}

/// In-memory sender that records frames, with optional forced failures
///
/// Clones share the same record, so a test can keep one handle while the
/// reporter owns the other.
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransmitter {
    inner: Arc<Mutex<LoopbackState>>,
}

#[derive(Debug, Default)]
struct LoopbackState {
    sent: Vec<[u8; TELEMETRY_FRAME_LEN]>,
    failures_pending: usize,
    failed: usize,
}

impl LoopbackTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` sends fail
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures_pending += count;
    }

    /// Frames delivered so far
    pub fn sent(&self) -> Vec<[u8; TELEMETRY_FRAME_LEN]> {
        self.inner.lock().sent.clone()
    }

    /// Remove and return delivered frames
    pub fn drain(&self) -> Vec<[u8; TELEMETRY_FRAME_LEN]> {
        std::mem::take(&mut self.inner.lock().sent)
    }

    pub fn failed(&self) -> usize {
        self.inner.lock().failed
    }
}

impl DatagramSender for LoopbackTransmitter {
    fn send_datagram(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut state = self.inner.lock();
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            state.failed += 1;
            return Err(TelemetryError::TransmitFailure("forced failure".to_string()));
        }

        let frame: [u8; TELEMETRY_FRAME_LEN] =
            bytes
                .try_into()
                .map_err(|_| TelemetryError::InvalidPacketLength {
                    expected: TELEMETRY_FRAME_LEN,
                    received: bytes.len(),
                })?;
        state.sent.push(frame);
        Ok(bytes.len())
    }
}
