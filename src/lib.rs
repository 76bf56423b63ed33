/// Telemetry Reporter - periodic UDP telemetry with acknowledgement backoff
///
/// **License**: Creative Commons Attribution 4.0 International (CC BY 4.0)
///
/// A device sends a fixed 8-byte telemetry frame (sensor reading, buffered
/// button events, protocol flags, CRC-8) to a collector on a fixed period,
/// and periodically asks for an acknowledgement. When acknowledgements stop
/// arriving, both the telemetry and the acknowledgement-request periods back
/// off linearly until the collector answers again.
///
/// # Design Principles
/// - One cooperative loop owns all protocol state
/// - Timers, input handlers and the receive task only set flags or fill the inbox
/// - Fixed-size, checksummed wire frames
/// - Errors are values; the loop absorbs protocol failures and reports them

pub mod ack_manager;
pub mod checksum;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod events;
pub mod receiver;
pub mod reporter;
pub mod scheduler;
pub mod sensor;
pub mod status;
pub mod transmitter;

use std::time::Duration;

pub use ack_manager::{AckManager, AckOutcome, LinkState, RetryState};
pub use config::{ReporterConfig, ReporterConfigBuilder};
pub use contracts::{AcknowledgementFrame, OptionFlags, TelemetryFrame};
pub use errors::{Result, TelemetryError};
pub use events::{EventAccumulator, EventSet, InputSource};
pub use receiver::{AckInbox, Receiver};
pub use reporter::{PollSummary, Reporter, ReporterStats};
pub use scheduler::{Scheduler, TimerId};
pub use sensor::SensorSource;
pub use status::{StatusNotice, StatusSink};
pub use transmitter::DatagramSender;

/// Sender identifier of the reference device
pub const DEFAULT_SENDER_ID: u16 = 61414;

/// Default collector port
pub const DEFAULT_COLLECTOR_PORT: u16 = 4123;

/// Telemetry period while the link is healthy
pub const BASE_PACKET_INTERVAL: Duration = Duration::from_secs(10);

/// Acknowledgement-request period while healthy, and the backoff step
pub const BASE_ACK_INTERVAL: Duration = Duration::from_secs(60);

/// Wait after an acknowledgement request before checking the inbox
pub const ACK_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff ceiling (ten backoff steps)
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(600);

/// Bound on a single blocking receive
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reporter loop polling resolution
pub const LOOP_TICK: Duration = Duration::from_millis(100);
