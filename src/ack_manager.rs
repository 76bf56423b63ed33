/// ACK Manager module - retry/backoff state machine
///
/// Decides, each time the acknowledgement-wait timer expires, whether the
/// link is healthy or degraded, and reprograms the telemetry and
/// acknowledgement-request timers to match. Backoff is linear in the retry
/// count and throttles telemetry as well as acknowledgement requests.

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::ReporterConfig;
use crate::contracts::AcknowledgementFrame;
use crate::scheduler::{Scheduler, TimerId};

/// Link health as seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Healthy,
    Degraded(u32),
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(retries) => write!(f, "degraded ({} retries)", retries),
        }
    }
}

/// Result of one acknowledgement check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Matching acknowledgement found
    ///
    /// `recovered` is true when this ended a degraded period and the
    /// timers were put back to their base periods.
    Acknowledged { recovered: bool },

    /// Nothing matching arrived; both timers now run at `interval`
    Missed { retry_count: u32, interval: Duration },
}

/// Retry state - process-lifetime protocol state
///
/// Both intervals always equal `base + base * retry_count` (capped) while
/// degraded, and the base telemetry/ack periods while healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub retry_count: u32,
    pub current_ack_interval: Duration,
    pub current_packet_interval: Duration,
}

impl RetryState {
    fn healthy(config: &ReporterConfig) -> Self {
        Self {
            retry_count: 0,
            current_ack_interval: config.base_ack_interval,
            current_packet_interval: config.base_packet_interval,
        }
    }

    pub fn link_state(&self) -> LinkState {
        match self.retry_count {
            0 => LinkState::Healthy,
            n => LinkState::Degraded(n),
        }
    }
}

/// ACK Manager - owns the retry state and reprograms the scheduler
pub struct AckManager {
    sender_id: u16,
    base_packet_interval: Duration,
    base_ack_interval: Duration,
    max_backoff_interval: Duration,
    backoff_jitter: Duration,
    state: RetryState,
    rng: StdRng,
}

impl AckManager {
    /// Create a manager in the healthy state
    pub fn new(config: &ReporterConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a manager whose jitter is reproducible
    pub fn with_seed(config: &ReporterConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ReporterConfig, rng: StdRng) -> Self {
        Self {
            sender_id: config.sender_id,
            base_packet_interval: config.base_packet_interval,
            base_ack_interval: config.base_ack_interval,
            max_backoff_interval: config.max_backoff_interval,
            backoff_jitter: config.backoff_jitter,
            state: RetryState::healthy(config),
            rng,
        }
    }

    /// Linear backoff: `base + base * retry_count`, capped at `ceiling`
    pub fn calculate_backoff(retry_count: u32, base: Duration, ceiling: Duration) -> Duration {
        base.saturating_mul(retry_count.saturating_add(1)).min(ceiling)
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.state.retry_count
    }

    pub fn link_state(&self) -> LinkState {
        self.state.link_state()
    }

    /// Program the scheduler with the base periods at start-up
    pub fn arm_initial(&self, scheduler: &mut Scheduler) {
        scheduler.arm(TimerId::Telemetry, self.base_packet_interval);
        scheduler.arm(TimerId::AckRequest, self.base_ack_interval);
    }

    /// Handle acknowledgement-wait expiry
    ///
    /// `inbound` is whatever the receive path left in the inbox, already
    /// taken (so the inbox is clear afterwards). Anything that does not
    /// match this device's sender id counts as no acknowledgement.
    pub fn on_ack_wait_expired(
        &mut self,
        inbound: Option<AcknowledgementFrame>,
        scheduler: &mut Scheduler,
    ) -> AckOutcome {
        match inbound {
            Some(ack) if ack.matches(self.sender_id) => self.acknowledged(scheduler),
            Some(ack) => {
                debug!(
                    echoed = ack.echoed_sender(),
                    expected = self.sender_id,
                    "acknowledgement for another sender ignored"
                );
                self.missed(scheduler)
            }
            None => self.missed(scheduler),
        }
    }

    fn acknowledged(&mut self, scheduler: &mut Scheduler) -> AckOutcome {
        if self.state.retry_count == 0 {
            debug!("acknowledged, link healthy");
            return AckOutcome::Acknowledged { recovered: false };
        }

        info!(
            retries = self.state.retry_count,
            "acknowledged, restoring base intervals"
        );
        self.state = RetryState {
            retry_count: 0,
            current_ack_interval: self.base_ack_interval,
            current_packet_interval: self.base_packet_interval,
        };
        scheduler.rearm(TimerId::Telemetry, self.base_packet_interval);
        scheduler.rearm(TimerId::AckRequest, self.base_ack_interval);

        AckOutcome::Acknowledged { recovered: true }
    }

    fn missed(&mut self, scheduler: &mut Scheduler) -> AckOutcome {
        let retry_count = self.state.retry_count.saturating_add(1);
        let interval = self.backoff_interval(retry_count);

        warn!(retry_count, ?interval, "no acknowledgement, backing off");
        self.state = RetryState {
            retry_count,
            current_ack_interval: interval,
            current_packet_interval: interval,
        };
        scheduler.rearm(TimerId::Telemetry, interval);
        scheduler.rearm(TimerId::AckRequest, interval);

        AckOutcome::Missed {
            retry_count,
            interval,
        }
    }

    fn backoff_interval(&mut self, retry_count: u32) -> Duration {
        let interval =
            Self::calculate_backoff(retry_count, self.base_ack_interval, self.max_backoff_interval);
        if self.backoff_jitter.is_zero() {
            return interval;
        }

        let max_nanos = u64::try_from(self.backoff_jitter.as_nanos()).unwrap_or(u64::MAX);
        let jitter = Duration::from_nanos(self.rng.gen_range(0..=max_nanos));
        let jittered = interval.saturating_add(jitter);
        if jittered <= self.max_backoff_interval {
            jittered
        } else {
            // ceiling is a hard cap; jitter reflects below it
            self.max_backoff_interval.saturating_sub(jitter)
        }
    }
}
