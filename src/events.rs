/// Event accumulator - pending user-input bitset
///
/// Producers (button handlers on any thread) only set bits; the reporter
/// loop is the single consumer and clears them by swapping in zero. Bit
/// union is commutative and idempotent, so no press recorded between two
/// drains can be lost.
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Logical input sources and their bit positions in the event byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Switch2,
    Switch3,
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl InputSource {
    pub const ALL: [InputSource; 7] = [
        InputSource::Switch2,
        InputSource::Switch3,
        InputSource::Up,
        InputSource::Down,
        InputSource::Left,
        InputSource::Right,
        InputSource::Fire,
    ];

    pub const fn bit(self) -> u8 {
        match self {
            Self::Switch2 => 0,
            Self::Switch3 => 1,
            Self::Up => 2,
            Self::Down => 3,
            Self::Left => 4,
            Self::Right => 5,
            Self::Fire => 6,
        }
    }

    pub const fn mask(self) -> u8 {
        1 << self.bit()
    }
}

/// Snapshot of drained events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSet(u8);

impl EventSet {
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, source: InputSource) -> bool {
        self.0 & source.mask() != 0
    }

    pub fn sources(self) -> impl Iterator<Item = InputSource> {
        InputSource::ALL
            .into_iter()
            .filter(move |source| self.contains(*source))
    }
}

impl fmt::Display for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010b}", self.0)
    }
}

/// Lock-free pending-events bitset shared between producers and the loop
#[derive(Debug, Default)]
pub struct EventAccumulator {
    pending: AtomicU8,
}

impl EventAccumulator {
    pub const fn new() -> Self {
        Self {
            pending: AtomicU8::new(0),
        }
    }

    /// Mark `source` as having fired; callable from any context
    pub fn record(&self, source: InputSource) {
        self.pending.fetch_or(source.mask(), Ordering::AcqRel);
    }

    /// Take every pending bit and reset to empty in one atomic step
    ///
    /// Only the reporter loop should call this.
    pub fn drain(&self) -> EventSet {
        EventSet(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Put drained bits back after a frame could not be sent
    pub fn restore(&self, events: EventSet) {
        if !events.is_empty() {
            self.pending.fetch_or(events.bits(), Ordering::AcqRel);
        }
    }

    /// Read without clearing
    pub fn peek(&self) -> EventSet {
        EventSet(self.pending.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_bit_positions() {
        assert_eq!(InputSource::Switch2.mask(), 0b0000_0001);
        assert_eq!(InputSource::Switch3.mask(), 0b0000_0010);
        assert_eq!(InputSource::Up.mask(), 0b0000_0100);
        assert_eq!(InputSource::Down.mask(), 0b0000_1000);
        assert_eq!(InputSource::Left.mask(), 0b0001_0000);
        assert_eq!(InputSource::Right.mask(), 0b0010_0000);
        assert_eq!(InputSource::Fire.mask(), 0b0100_0000);
    }

    #[test]
    fn test_drain_resets() {
        let acc = EventAccumulator::new();
        acc.record(InputSource::Fire);
        acc.record(InputSource::Up);
        acc.record(InputSource::Fire);

        let events = acc.drain();
        assert_eq!(events.bits(), 0b0100_0100);
        assert!(events.contains(InputSource::Up));
        assert!(!events.contains(InputSource::Down));
        assert!(acc.drain().is_empty());
    }

    #[test]
    fn test_restore_merges_with_new_presses() {
        let acc = EventAccumulator::new();
        acc.record(InputSource::Left);
        let drained = acc.drain();

        acc.record(InputSource::Right);
        acc.restore(drained);
        assert_eq!(
            acc.peek().bits(),
            InputSource::Left.mask() | InputSource::Right.mask()
        );
    }

    #[test]
    fn test_sources_iterator() {
        let set = EventSet::from_bits(0b0010_0001);
        let sources: Vec<_> = set.sources().collect();
        assert_eq!(sources, vec![InputSource::Switch2, InputSource::Right]);
        assert_eq!(set.to_string(), "0b00100001");
    }

    #[test]
    fn test_concurrent_producers() {
        let acc = Arc::new(EventAccumulator::new());
        let mut handles = vec![];

        for source in InputSource::ALL {
            let acc = Arc::clone(&acc);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    acc.record(source);
                }
            }));
        }

        let mut seen = 0u8;
        while handles.iter().any(|h| !h.is_finished()) {
            seen |= acc.drain().bits();
        }
        for handle in handles {
            handle.join().unwrap();
        }
        seen |= acc.drain().bits();

        assert_eq!(seen, 0b0111_1111);
        assert!(acc.drain().is_empty());
    }
}
