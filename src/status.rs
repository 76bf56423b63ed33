/// Status notices - observational output of the reporter
///
/// The device shows a line of text for every notable protocol event. No
/// behavior depends on these; the default sink writes them to `tracing`.
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

/// Human-readable protocol event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNotice {
    /// Matching acknowledgement received
    Acknowledged,

    /// Acknowledgement missed; current retry counter
    Retrying(u32),

    /// A telemetry frame could not be sent
    SendFailed(String),
}

impl fmt::Display for StatusNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acknowledged => write!(f, "got ack"),
            Self::Retrying(count) => write!(f, "{}", count),
            Self::SendFailed(_) => write!(f, "sending packet failed"),
        }
    }
}

/// Sink for status notices, e.g. a small display
pub trait StatusSink {
    fn notice(&mut self, notice: &StatusNotice);
}

/// Default sink: structured log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn notice(&mut self, notice: &StatusNotice) {
        match notice {
            StatusNotice::Acknowledged => info!(status = %notice, "acknowledged"),
            StatusNotice::Retrying(count) => warn!(status = %notice, retry_count = count, "retrying"),
            StatusNotice::SendFailed(reason) => warn!(status = %notice, %reason, "send failed"),
        }
    }
}

/// Sink that keeps every notice, shareable with the caller
#[derive(Debug, Default, Clone)]
pub struct RecordingStatus {
    notices: Arc<Mutex<Vec<StatusNotice>>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<StatusNotice> {
        self.notices.lock().clone()
    }

    pub fn last(&self) -> Option<StatusNotice> {
        self.notices.lock().last().cloned()
    }
}

impl StatusSink for RecordingStatus {
    fn notice(&mut self, notice: &StatusNotice) {
        self.notices.lock().push(notice.clone());
    }
}
