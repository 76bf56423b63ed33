/// Error types for the telemetry reporter
///
/// Protocol-level failures are absorbed by the reporter loop and surfaced
/// as status notices; adapters and codecs still return these as values so
/// callers and tests can see exactly what went wrong.
use thiserror::Error;

/// Result type alias for reporter operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Telemetry reporter error enumeration
///
/// Covers every failure mode in the reporting pipeline:
/// - Datagram transmit failures
/// - Malformed inbound or outbound frames
/// - Socket I/O during bring-up and receive
/// - Invalid configuration
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Send call reported failure; the next scheduled frame supersedes this one
    #[error("transmit failure: {0}")]
    TransmitFailure(String),

    /// No matching acknowledgement arrived before the wait timer expired
    #[error("acknowledgement timeout - no matching reply from collector")]
    AckTimeout,

    /// Frame of unexpected length
    #[error("invalid packet length: expected {expected}, received {received}")]
    InvalidPacketLength { expected: usize, received: usize },

    /// Checksum mismatch on a decoded telemetry frame
    #[error("integrity check failed: expected CRC-8 {expected:#04x}, got {actual:#04x}")]
    IntegrityCheckFailed { expected: u8, actual: u8 },

    /// Socket I/O error (bind, connect, receive)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(String),
}

impl TelemetryError {
    /// True for failures the reporter loop recovers from on its own
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}
