/// Scheduler module - timers that raise deferred-work signals
///
/// Timers never run protocol code. When a deadline passes the timer raises
/// its signal bit; the reporter loop later takes and clears the signals and
/// does the work itself. Time is a monotonic offset from reporter start, so
/// the same scheduler runs against a real clock or a simulated one.
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tracing::trace;

/// The three protocol timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Periodic: send a telemetry frame
    Telemetry,
    /// Periodic: request an acknowledgement on the next frame
    AckRequest,
    /// One-shot: check whether the acknowledgement arrived
    AckWait,
}

/// Whether a timer re-fires after expiry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Periodic,
    OneShot,
}

impl TimerId {
    pub const ALL: [TimerId; 3] = [TimerId::Telemetry, TimerId::AckRequest, TimerId::AckWait];

    pub const fn mode(self) -> TimerMode {
        match self {
            Self::Telemetry | Self::AckRequest => TimerMode::Periodic,
            Self::AckWait => TimerMode::OneShot,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Telemetry => 0,
            Self::AckRequest => 1,
            Self::AckWait => 2,
        }
    }

    const fn signal(self) -> u8 {
        1 << self.index()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Telemetry => "telemetry",
            Self::AckRequest => "ack-request",
            Self::AckWait => "ack-wait",
        };
        f.write_str(name)
    }
}

/// Signals taken from the scheduler in one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signals(u8);

impl Signals {
    pub const fn is_raised(self, timer: TimerId) -> bool {
        self.0 & timer.signal() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Atomic signal flags, one bit per timer
///
/// Raising is idempotent: several expiries before a take collapse into one.
#[derive(Debug, Default)]
pub struct SignalFlags(AtomicU8);

impl SignalFlags {
    pub fn raise(&self, timer: TimerId) {
        self.0.fetch_or(timer.signal(), Ordering::AcqRel);
    }

    pub fn take(&self) -> Signals {
        Signals(self.0.swap(0, Ordering::AcqRel))
    }
}

#[derive(Debug, Clone, Copy)]
struct TimerSlot {
    interval: Duration,
    deadline: Duration,
}

/// Scheduler - three independently armed timers
#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    slots: [Option<TimerSlot>; 3],
    signals: SignalFlags,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scheduler time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm `timer` to fire `interval` from now
    ///
    /// Periodic timers keep firing every `interval`; one-shot timers disarm
    /// themselves after firing. Arming an armed timer replaces it.
    pub fn arm(&mut self, timer: TimerId, interval: Duration) {
        debug_assert!(!interval.is_zero(), "timer interval must be non-zero");
        trace!(%timer, ?interval, now = ?self.now, "arm");
        self.slots[timer.index()] = Some(TimerSlot {
            interval,
            deadline: self.now + interval,
        });
    }

    pub fn disarm(&mut self, timer: TimerId) {
        self.slots[timer.index()] = None;
    }

    /// Disarm then arm as one step; the phase restarts at the current time
    pub fn rearm(&mut self, timer: TimerId, interval: Duration) {
        self.disarm(timer);
        self.arm(timer, interval);
    }

    pub fn is_armed(&self, timer: TimerId) -> bool {
        self.slots[timer.index()].is_some()
    }

    pub fn interval(&self, timer: TimerId) -> Option<Duration> {
        self.slots[timer.index()].map(|slot| slot.interval)
    }

    pub fn next_deadline(&self, timer: TimerId) -> Option<Duration> {
        self.slots[timer.index()].map(|slot| slot.deadline)
    }

    /// Earliest deadline across all armed timers
    pub fn next_wakeup(&self) -> Option<Duration> {
        self.slots.iter().flatten().map(|slot| slot.deadline).min()
    }

    /// Move the clock forward and raise signals for every expired timer
    ///
    /// Time never runs backwards; an older `now` is ignored.
    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
        let now = self.now;

        for timer in TimerId::ALL {
            let slot = &mut self.slots[timer.index()];
            let expired = matches!(slot, Some(active) if active.deadline <= now);
            if !expired {
                continue;
            }

            self.signals.raise(timer);
            if timer.mode() == TimerMode::OneShot {
                *slot = None;
            } else if let Some(active) = slot.as_mut() {
                // catch up without raising once per missed period
                while active.deadline <= now && !active.interval.is_zero() {
                    active.deadline += active.interval;
                }
            }
        }
    }

    /// Take and clear all raised signals
    pub fn take_signals(&self) -> Signals {
        self.signals.take()
    }

    /// Shared flags, for raising signals from outside the scheduler
    pub fn signals(&self) -> &SignalFlags {
        &self.signals
    }
}
