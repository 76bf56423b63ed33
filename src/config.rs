/// Reporter configuration
///
/// Immutable for the lifetime of the process: built once, validated, and
/// handed to the reporter by reference. Defaults reproduce the field
/// deployment (10 s telemetry, 60 s acknowledgement requests, 5 s wait).
use std::net::SocketAddr;
use std::time::Duration;

use crate::errors::{Result, TelemetryError};

/// Complete configuration for one reporter instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Collector address telemetry is sent to
    pub destination: SocketAddr,

    /// Local address the socket binds to
    pub bind_address: SocketAddr,

    /// Identifier stamped on every frame and echoed by acknowledgements
    pub sender_id: u16,

    /// Telemetry period while the link is healthy
    pub base_packet_interval: Duration,

    /// Acknowledgement-request period while healthy; also the backoff base
    pub base_ack_interval: Duration,

    /// How long to wait for an acknowledgement after requesting one
    pub ack_wait_timeout: Duration,

    /// Ceiling for the backed-off interval
    pub max_backoff_interval: Duration,

    /// Upper bound of random jitter added to each backoff (zero = none)
    pub backoff_jitter: Duration,

    /// Bound on each blocking receive so the receive task notices shutdown
    pub receive_timeout: Duration,

    /// How often the reporter loop polls its timers
    pub tick: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            destination: SocketAddr::from(([127, 0, 0, 1], crate::DEFAULT_COLLECTOR_PORT)),
            bind_address: SocketAddr::from(([0, 0, 0, 0], 0)),
            sender_id: crate::DEFAULT_SENDER_ID,
            base_packet_interval: crate::BASE_PACKET_INTERVAL,
            base_ack_interval: crate::BASE_ACK_INTERVAL,
            ack_wait_timeout: crate::ACK_WAIT_TIMEOUT,
            max_backoff_interval: crate::MAX_BACKOFF_INTERVAL,
            backoff_jitter: Duration::ZERO,
            receive_timeout: crate::RECEIVE_TIMEOUT,
            tick: crate::LOOP_TICK,
        }
    }
}

impl ReporterConfig {
    /// Reject configurations the protocol cannot run with
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("base_packet_interval", self.base_packet_interval),
            ("base_ack_interval", self.base_ack_interval),
            ("ack_wait_timeout", self.ack_wait_timeout),
            ("receive_timeout", self.receive_timeout),
            ("tick", self.tick),
        ];
        for (name, value) in non_zero {
            if value.is_zero() {
                return Err(TelemetryError::Config(format!("{} must be non-zero", name)));
            }
        }

        if self.ack_wait_timeout >= self.base_ack_interval {
            return Err(TelemetryError::Config(format!(
                "ack_wait_timeout {:?} must be shorter than base_ack_interval {:?}",
                self.ack_wait_timeout, self.base_ack_interval
            )));
        }

        if self.tick >= self.ack_wait_timeout {
            return Err(TelemetryError::Config(format!(
                "tick {:?} must be shorter than ack_wait_timeout {:?}",
                self.tick, self.ack_wait_timeout
            )));
        }

        if self.max_backoff_interval < self.base_ack_interval {
            return Err(TelemetryError::Config(format!(
                "max_backoff_interval {:?} is below base_ack_interval {:?}",
                self.max_backoff_interval, self.base_ack_interval
            )));
        }

        Ok(())
    }
}

/// Floor for a scaled loop tick
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// ReporterConfigBuilder - fluent construction with validation at the end
#[derive(Debug, Clone, Default)]
pub struct ReporterConfigBuilder {
    config: ReporterConfig,
}

impl ReporterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, destination: SocketAddr) -> Self {
        self.config.destination = destination;
        self
    }

    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.config.bind_address = bind_address;
        self
    }

    pub fn with_sender_id(mut self, sender_id: u16) -> Self {
        self.config.sender_id = sender_id;
        self
    }

    pub fn with_base_packet_interval(mut self, interval: Duration) -> Self {
        self.config.base_packet_interval = interval;
        self
    }

    pub fn with_base_ack_interval(mut self, interval: Duration) -> Self {
        self.config.base_ack_interval = interval;
        self
    }

    pub fn with_ack_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_wait_timeout = timeout;
        self
    }

    pub fn with_max_backoff_interval(mut self, interval: Duration) -> Self {
        self.config.max_backoff_interval = interval;
        self
    }

    pub fn with_backoff_jitter(mut self, jitter: Duration) -> Self {
        self.config.backoff_jitter = jitter;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.config.receive_timeout = timeout;
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.config.tick = tick;
        self
    }

    /// Scale every protocol interval and the loop tick by `unit`
    ///
    /// The protocol is specified in abstract time units (seconds in the
    /// field). Demos and soak tests shrink the unit to run faster. The tick
    /// never drops below [`MIN_TICK`].
    pub fn with_time_unit(mut self, unit: Duration) -> Self {
        let scale = |units: Duration| {
            let nanos = units.as_nanos() * unit.as_nanos() / 1_000_000_000;
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        };
        self.config.base_packet_interval = scale(self.config.base_packet_interval);
        self.config.base_ack_interval = scale(self.config.base_ack_interval);
        self.config.ack_wait_timeout = scale(self.config.ack_wait_timeout);
        self.config.max_backoff_interval = scale(self.config.max_backoff_interval);
        self.config.backoff_jitter = scale(self.config.backoff_jitter);
        self.config.tick = scale(self.config.tick).max(MIN_TICK);
        self
    }

    pub fn build(self) -> Result<ReporterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
