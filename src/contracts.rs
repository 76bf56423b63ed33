/// Wire contracts for the telemetry protocol
///
/// Two fixed-size frames cross the link: the 8-byte telemetry frame sent by
/// the device and the 3-byte acknowledgement returned by the collector.
/// Multi-byte fields are big-endian (high byte first) on the wire.
use crate::checksum::{checksum, CHECKSUM_LEN};
use crate::errors::{Result, TelemetryError};

/// Encoded telemetry frame length
pub const TELEMETRY_FRAME_LEN: usize = 8;

/// Encoded acknowledgement frame length
pub const ACK_FRAME_LEN: usize = 3;

/// Per-frame option bits
///
/// # Bit Layout
/// - bit0: acknowledgement requested
/// - bit1: checksum present (always set on outgoing frames)
/// - bit2: retry in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct OptionFlags(u8);

impl OptionFlags {
    pub const ACK_REQUESTED: Self = Self(1 << 0);
    pub const CHECKSUM_PRESENT: Self = Self(1 << 1);
    pub const RETRY_IN_PROGRESS: Self = Self(1 << 2);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for OptionFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// TelemetryFrame - periodic message from device to collector
///
/// # Wire Layout
/// | byte | field |
/// |---|---|
/// | 0 | sender id, high byte |
/// | 1 | sender id, low byte |
/// | 2 | sequence number |
/// | 3 | option flags |
/// | 4 | sensor reading, high byte |
/// | 5 | sensor reading, low byte |
/// | 6 | event bitset |
/// | 7 | CRC-8 over bytes 0..7 |
///
/// The checksum is not stored: it is recomputed on every `encode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Fixed identifier of this device
    pub sender_id: u16,

    /// Sequence number, wraps modulo 256
    pub sequence: u8,

    /// Protocol option bits for this frame
    pub options: OptionFlags,

    /// Latest sensor sample
    pub reading: u16,

    /// Input events accumulated since the previous frame
    pub events: u8,
}

impl TelemetryFrame {
    /// The seven bytes the checksum covers
    fn body(&self) -> [u8; TELEMETRY_FRAME_LEN - CHECKSUM_LEN] {
        let [sender_hi, sender_lo] = self.sender_id.to_be_bytes();
        let [reading_hi, reading_lo] = self.reading.to_be_bytes();
        [
            sender_hi,
            sender_lo,
            self.sequence,
            self.options.bits(),
            reading_hi,
            reading_lo,
            self.events,
        ]
    }

    /// Serialize into the 8-byte wire form, checksum last
    pub fn encode(&self) -> [u8; TELEMETRY_FRAME_LEN] {
        let body = self.body();
        let mut out = [0u8; TELEMETRY_FRAME_LEN];
        out[..body.len()].copy_from_slice(&body);
        out[TELEMETRY_FRAME_LEN - 1] = checksum(&body);
        out
    }

    /// Parse a telemetry frame, verifying length and checksum
    ///
    /// Used on the collector side and by tests; the device never decodes
    /// its own frames.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TELEMETRY_FRAME_LEN {
            return Err(TelemetryError::InvalidPacketLength {
                expected: TELEMETRY_FRAME_LEN,
                received: bytes.len(),
            });
        }

        let (body, trailer) = bytes.split_at(TELEMETRY_FRAME_LEN - CHECKSUM_LEN);
        let actual = checksum(body);
        if actual != trailer[0] {
            return Err(TelemetryError::IntegrityCheckFailed {
                expected: trailer[0],
                actual,
            });
        }

        Ok(Self {
            sender_id: u16::from_be_bytes([body[0], body[1]]),
            sequence: body[2],
            options: OptionFlags::from_bits(body[3]),
            reading: u16::from_be_bytes([body[4], body[5]]),
            events: body[6],
        })
    }
}

/// AcknowledgementFrame - short reply from the collector
///
/// Only the first two bytes carry meaning: the collector echoes the device's
/// sender id high byte then low byte. The third byte is padding or a
/// sequence echo and is ignored. Acks carry no checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcknowledgementFrame {
    pub bytes: [u8; ACK_FRAME_LEN],
}

impl AcknowledgementFrame {
    /// Build the reply a collector sends for `sender_id`
    pub fn for_sender(sender_id: u16, trailer: u8) -> Self {
        let [hi, lo] = sender_id.to_be_bytes();
        Self {
            bytes: [hi, lo, trailer],
        }
    }

    /// Structural decode: any 3-byte datagram is an acknowledgement frame
    ///
    /// Returns `None` for any other length; such datagrams are treated as
    /// if nothing had been received.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ACK_FRAME_LEN] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    pub fn encode(&self) -> [u8; ACK_FRAME_LEN] {
        self.bytes
    }

    /// Sender id as echoed by the collector
    pub fn echoed_sender(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    /// True when this frame acknowledges `sender_id`, irrespective of byte 2
    pub fn matches(&self, sender_id: u16) -> bool {
        self.echoed_sender() == sender_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_frame() -> TelemetryFrame {
        TelemetryFrame {
            sender_id: 61414,
            sequence: 5,
            options: OptionFlags::CHECKSUM_PRESENT,
            reading: 250,
            events: 0b0000_0001,
        }
    }

    #[test]
    fn test_reference_encoding() {
        let bytes = reference_frame().encode();
        assert_eq!(bytes, [0xEF, 0xE6, 0x05, 0x02, 0x00, 0xFA, 0x01, 0x90]);
    }

    #[test]
    fn test_decode_restores_fields() {
        let frame = reference_frame();
        let decoded = TelemetryFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let result = TelemetryFrame::decode(&[0u8; 7]);
        assert!(matches!(
            result,
            Err(TelemetryError::InvalidPacketLength { expected: 8, received: 7 })
        ));
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let mut bytes = reference_frame().encode();
        bytes[4] ^= 0x80;
        assert!(matches!(
            TelemetryFrame::decode(&bytes),
            Err(TelemetryError::IntegrityCheckFailed { .. })
        ));
    }

    #[test]
    fn test_checksum_tracks_fields() {
        let mut frame = reference_frame();
        let before = frame.encode()[7];
        frame.sequence = 6;
        assert_ne!(frame.encode()[7], before);
    }

    #[test]
    fn test_option_flags() {
        let mut options = OptionFlags::CHECKSUM_PRESENT;
        options.insert(OptionFlags::ACK_REQUESTED);
        assert_eq!(options.bits(), 0b011);
        assert!(options.contains(OptionFlags::ACK_REQUESTED));
        assert!(!options.contains(OptionFlags::RETRY_IN_PROGRESS));

        options.remove(OptionFlags::ACK_REQUESTED);
        assert_eq!(options, OptionFlags::CHECKSUM_PRESENT);
        assert!(OptionFlags::empty().is_empty());
        assert_eq!(
            (OptionFlags::ACK_REQUESTED | OptionFlags::RETRY_IN_PROGRESS).bits(),
            0b101
        );
    }

    #[test]
    fn test_ack_matching() {
        let ack = AcknowledgementFrame::decode(&[0xEF, 0xE6, 0x00]).unwrap();
        assert!(ack.matches(61414));
        assert!(!ack.matches(0xE6EF));

        // byte 2 is ignored
        let ack = AcknowledgementFrame::decode(&[0xEF, 0xE6, 0x7F]).unwrap();
        assert!(ack.matches(61414));

        let other = AcknowledgementFrame::for_sender(1234, 0);
        assert!(!other.matches(61414));
        assert_eq!(AcknowledgementFrame::for_sender(61414, 9).encode(), [0xEF, 0xE6, 9]);
    }

    #[test]
    fn test_ack_decode_length() {
        assert!(AcknowledgementFrame::decode(&[]).is_none());
        assert!(AcknowledgementFrame::decode(&[0xEF, 0xE6]).is_none());
        assert!(AcknowledgementFrame::decode(&[0xEF, 0xE6, 0, 0]).is_none());
    }
}
