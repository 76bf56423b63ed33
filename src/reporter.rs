/// Reporter module - the cooperative consumer loop
///
/// The reporter is the only owner of composite protocol state: the retry
/// state machine, the per-send option bits and the sequence counter. Timers,
/// the receive task and button handlers only raise flags or fill the inbox;
/// every transition happens inside [`Reporter::poll`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::ack_manager::{AckManager, AckOutcome, LinkState};
use crate::config::ReporterConfig;
use crate::contracts::{OptionFlags, TelemetryFrame};
use crate::events::EventAccumulator;
use crate::receiver::AckInbox;
use crate::scheduler::{Scheduler, TimerId};
use crate::sensor::SensorSource;
use crate::status::{StatusNotice, StatusSink};
use crate::transmitter::DatagramSender;

/// Counters over the reporter's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReporterStats {
    pub frames_sent: u64,
    pub send_failures: u64,
    pub acks_received: u64,
    pub acks_missed: u64,
}

/// What one call to [`Reporter::poll`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Frame handed to the transport this pass, if any
    pub sent: Option<TelemetryFrame>,
    /// True when a frame was built but the transport rejected it
    pub send_failed: bool,
    /// Acknowledgement-request timer fired this pass
    pub ack_requested: bool,
    /// Outcome of the acknowledgement check, if the wait timer fired
    pub ack: Option<AckOutcome>,
}

/// Reporter - drives telemetry, acknowledgement requests and backoff
pub struct Reporter<T, S, L>
where
    T: DatagramSender,
    S: SensorSource,
    L: StatusSink,
{
    config: ReporterConfig,
    scheduler: Scheduler,
    ack_manager: AckManager,
    events: Arc<EventAccumulator>,
    inbox: Arc<AckInbox>,
    transmitter: T,
    sensor: S,
    status: L,
    sequence: u8,
    options: OptionFlags,
    stats: ReporterStats,
}

impl<T, S, L> Reporter<T, S, L>
where
    T: DatagramSender,
    S: SensorSource,
    L: StatusSink,
{
    /// Create a reporter with timers armed at their base periods
    pub fn new(config: ReporterConfig, transmitter: T, sensor: S, status: L) -> Self {
        let ack_manager = AckManager::new(&config);
        Self::with_ack_manager(config, ack_manager, transmitter, sensor, status)
    }

    /// Same as [`Reporter::new`] with reproducible backoff jitter
    pub fn with_seed(
        config: ReporterConfig,
        seed: u64,
        transmitter: T,
        sensor: S,
        status: L,
    ) -> Self {
        let ack_manager = AckManager::with_seed(&config, seed);
        Self::with_ack_manager(config, ack_manager, transmitter, sensor, status)
    }

    fn with_ack_manager(
        config: ReporterConfig,
        ack_manager: AckManager,
        transmitter: T,
        sensor: S,
        status: L,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        ack_manager.arm_initial(&mut scheduler);

        Self {
            config,
            scheduler,
            ack_manager,
            events: Arc::new(EventAccumulator::new()),
            inbox: Arc::new(AckInbox::new()),
            transmitter,
            sensor,
            status,
            sequence: 0,
            options: OptionFlags::empty(),
            stats: ReporterStats::default(),
        }
    }

    /// Handle for button handlers to record input events
    pub fn events(&self) -> Arc<EventAccumulator> {
        Arc::clone(&self.events)
    }

    /// Handle for the receive task to deposit acknowledgements
    pub fn inbox(&self) -> Arc<AckInbox> {
        Arc::clone(&self.inbox)
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn retry_count(&self) -> u32 {
        self.ack_manager.retry_count()
    }

    pub fn link_state(&self) -> LinkState {
        self.ack_manager.link_state()
    }

    /// Option bits waiting for the next frame (checksum bit excluded)
    pub fn pending_options(&self) -> OptionFlags {
        self.options
    }

    pub fn stats(&self) -> ReporterStats {
        self.stats
    }

    /// One pass of the loop at time `now` (offset from reporter start)
    ///
    /// Work order per pass: acknowledgement request, telemetry send,
    /// acknowledgement check. A request and a send falling due together
    /// therefore produce one frame with the ack-requested bit set.
    pub fn poll(&mut self, now: Duration) -> PollSummary {
        self.scheduler.advance_to(now);
        let signals = self.scheduler.take_signals();
        let mut summary = PollSummary::default();

        if signals.is_raised(TimerId::AckRequest) {
            self.options.insert(OptionFlags::ACK_REQUESTED);
            self.scheduler
                .rearm(TimerId::AckWait, self.config.ack_wait_timeout);
            summary.ack_requested = true;
        }

        if signals.is_raised(TimerId::Telemetry) {
            summary.sent = self.send_telemetry();
            summary.send_failed = summary.sent.is_none();
        }

        if signals.is_raised(TimerId::AckWait) {
            summary.ack = Some(self.check_ack());
        }

        summary
    }

    fn send_telemetry(&mut self) -> Option<TelemetryFrame> {
        self.sequence = self.sequence.wrapping_add(1);
        let events = self.events.drain();
        let frame = TelemetryFrame {
            sender_id: self.config.sender_id,
            sequence: self.sequence,
            options: self.options | OptionFlags::CHECKSUM_PRESENT,
            reading: self.sensor.read_sensor(),
            events: events.bits(),
        };

        match self.transmitter.send_datagram(&frame.encode()) {
            Ok(_) => {
                debug!(
                    sequence = frame.sequence,
                    options = frame.options.bits(),
                    reading = frame.reading,
                    events = %events,
                    "telemetry sent"
                );
                self.options = OptionFlags::empty();
                self.stats.frames_sent += 1;
                Some(frame)
            }
            Err(e) => {
                // the next scheduled frame carries whatever this one held
                self.events.restore(events);
                self.stats.send_failures += 1;
                self.status.notice(&StatusNotice::SendFailed(e.to_string()));
                None
            }
        }
    }

    fn check_ack(&mut self) -> AckOutcome {
        let inbound = self.inbox.take();
        let outcome = self
            .ack_manager
            .on_ack_wait_expired(inbound, &mut self.scheduler);

        match outcome {
            AckOutcome::Acknowledged { .. } => {
                self.stats.acks_received += 1;
                self.status.notice(&StatusNotice::Acknowledged);
            }
            AckOutcome::Missed { retry_count, .. } => {
                self.options.insert(OptionFlags::RETRY_IN_PROGRESS);
                self.stats.acks_missed += 1;
                self.status.notice(&StatusNotice::Retrying(retry_count));
            }
        }
        outcome
    }

    /// Drive [`Reporter::poll`] from the tokio clock until `shutdown` is set
    ///
    /// Returns the final counters.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ReporterStats {
        let start = Instant::now();
        let mut ticker = tokio::time::interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sender_id = self.config.sender_id,
            destination = %self.config.destination,
            packet_interval = ?self.config.base_packet_interval,
            ack_interval = ?self.config.base_ack_interval,
            "reporter started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll(start.elapsed());
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(
            frames_sent = self.stats.frames_sent,
            send_failures = self.stats.send_failures,
            link = %self.link_state(),
            "reporter stopped"
        );
        self.stats
    }
}
