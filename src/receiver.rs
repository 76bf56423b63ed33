use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::contracts::{AcknowledgementFrame, ACK_FRAME_LEN};

/// Receive buffer; larger than an ack so oversized datagrams are seen whole
/// and rejected instead of being truncated into something that matches.
const RECEIVE_BUFFER_LEN: usize = 64;

/// First pause after a socket error; doubles per consecutive error
const ERROR_BACKOFF_BASE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboxStats {
    pub accepted: u64,
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct InboxSlot {
    latest: Option<AcknowledgementFrame>,
    stats: InboxStats,
}

/// Single-slot handoff between the receive task and the reporter loop
///
/// The newest well-formed acknowledgement overwrites any older one. The
/// reporter takes it when the wait timer fires, leaving the slot empty.
#[derive(Debug, Default)]
pub struct AckInbox {
    slot: Mutex<InboxSlot>,
}

impl AckInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an inbound datagram if it has acknowledgement shape
    ///
    /// Returns false for malformed datagrams, which are dropped without
    /// disturbing what is already stored.
    pub fn deposit(&self, datagram: &[u8]) -> bool {
        let mut slot = self.slot.lock();
        match AcknowledgementFrame::decode(datagram) {
            Some(frame) => {
                slot.latest = Some(frame);
                slot.stats.accepted += 1;
                true
            }
            None => {
                slot.stats.discarded += 1;
                false
            }
        }
    }

    pub fn take(&self) -> Option<AcknowledgementFrame> {
        self.slot.lock().latest.take()
    }

    pub fn peek(&self) -> Option<AcknowledgementFrame> {
        self.slot.lock().latest
    }

    pub fn stats(&self) -> InboxStats {
        self.slot.lock().stats
    }
}

pub struct Receiver;

impl Receiver {
    /// Receive datagrams into `inbox` until `shutdown` becomes true
    ///
    /// Each wait is bounded by `receive_timeout`. Socket errors are logged
    /// and receiving continues; an unreachable collector must not stop the
    /// device from listening.
    pub async fn run(
        socket: Arc<UdpSocket>,
        inbox: Arc<AckInbox>,
        receive_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) {
        let mut buffer = [0u8; RECEIVE_BUFFER_LEN];
        let mut consecutive_errors = 0u32;
        debug!(?receive_timeout, "receiver started");

        while !*shutdown.borrow() {
            // sender dropped means nobody can ask us to stop any more
            if shutdown.has_changed().is_err() {
                break;
            }

            let received =
                tokio::time::timeout(receive_timeout, socket.recv_from(&mut buffer)).await;
            match received {
                Err(_elapsed) => {
                    consecutive_errors = 0;
                    trace!("receive timeout");
                }
                Ok(Ok((len, from))) => {
                    consecutive_errors = 0;
                    Self::accept(&inbox, &buffer[..len], from);
                }
                Ok(Err(e)) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    let pause = Self::error_backoff(consecutive_errors, receive_timeout);
                    warn!(error = %e, consecutive_errors, ?pause, "receive failed");
                    tokio::time::sleep(pause).await;
                }
            }
        }

        debug!("receiver stopped");
    }

    /// Pause after the `consecutive_errors`-th socket error in a row
    ///
    /// Doubles from [`ERROR_BACKOFF_BASE`] and never exceeds `receive_timeout`.
    pub fn error_backoff(consecutive_errors: u32, receive_timeout: Duration) -> Duration {
        let doublings = consecutive_errors.saturating_sub(1).min(16);
        ERROR_BACKOFF_BASE
            .saturating_mul(1 << doublings)
            .min(receive_timeout)
    }

    /// Spawn [`Receiver::run`] on the current runtime
    pub fn spawn(
        socket: Arc<UdpSocket>,
        inbox: Arc<AckInbox>,
        receive_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(Self::run(socket, inbox, receive_timeout, shutdown))
    }

    fn accept(inbox: &AckInbox, datagram: &[u8], from: SocketAddr) {
        if inbox.deposit(datagram) {
            trace!(%from, bytes = ?datagram, "acknowledgement received");
        } else {
            debug!(
                %from,
                len = datagram.len(),
                expected = ACK_FRAME_LEN,
                "malformed datagram ignored"
            );
        }
    }
}
