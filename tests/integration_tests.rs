use std::time::Duration;

use telemetry_reporter::sensor::FixedSensor;
use telemetry_reporter::status::RecordingStatus;
use telemetry_reporter::transmitter::LoopbackTransmitter;
use telemetry_reporter::{
    AckOutcome, AcknowledgementFrame, InputSource, LinkState, OptionFlags, Reporter,
    ReporterConfigBuilder, StatusNotice, TelemetryFrame, TimerId,
};

type TestReporter = Reporter<LoopbackTransmitter, FixedSensor, RecordingStatus>;

const SENDER_ID: u16 = 61414;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn build() -> (TestReporter, LoopbackTransmitter, RecordingStatus) {
    let config = ReporterConfigBuilder::new()
        .with_sender_id(SENDER_ID)
        .build()
        .unwrap();
    let link = LoopbackTransmitter::new();
    let status = RecordingStatus::new();
    let reporter = Reporter::with_seed(config, 0, link.clone(), FixedSensor(250), status.clone());
    (reporter, link, status)
}

/// Poll once per time unit over `from..=to`
fn run_span(reporter: &mut TestReporter, from: u64, to: u64) {
    for t in from..=to {
        reporter.poll(secs(t));
    }
}

fn decoded(link: &LoopbackTransmitter) -> Vec<TelemetryFrame> {
    link.sent()
        .iter()
        .map(|bytes| TelemetryFrame::decode(bytes).expect("frame decodes"))
        .collect()
}

#[test]
fn test_scenario_no_replies_backs_off() {
    let (mut reporter, link, status) = build();

    run_span(&mut reporter, 0, 59);
    let frames = decoded(&link);
    assert_eq!(frames.len(), 5, "one frame every 10 units before t=60");
    assert!(frames
        .iter()
        .all(|f| f.options == OptionFlags::CHECKSUM_PRESENT));

    // t=60: ack-requested frame, wait timer armed for 5 units
    let summary = reporter.poll(secs(60));
    assert!(summary.ack_requested);
    let frame = summary.sent.unwrap();
    assert!(frame.options.contains(OptionFlags::ACK_REQUESTED));
    assert_eq!(reporter.scheduler().next_deadline(TimerId::AckWait), Some(secs(65)));

    // t=65: nothing arrived
    run_span(&mut reporter, 61, 64);
    let summary = reporter.poll(secs(65));
    assert_eq!(
        summary.ack,
        Some(AckOutcome::Missed { retry_count: 1, interval: secs(120) })
    );
    assert_eq!(reporter.link_state(), LinkState::Degraded(1));
    assert_eq!(reporter.scheduler().interval(TimerId::Telemetry), Some(secs(120)));
    assert_eq!(reporter.scheduler().interval(TimerId::AckRequest), Some(secs(120)));
    assert_eq!(status.last(), Some(StatusNotice::Retrying(1)));

    // telemetry throttled along with ack requests
    link.drain();
    run_span(&mut reporter, 66, 184);
    assert!(link.sent().is_empty());

    // t=185: next request goes out with the retry bit
    let frame = reporter.poll(secs(185)).sent.unwrap();
    assert!(frame.options.contains(OptionFlags::ACK_REQUESTED));
    assert!(frame.options.contains(OptionFlags::RETRY_IN_PROGRESS));

    // t=190: still silent
    run_span(&mut reporter, 186, 189);
    let summary = reporter.poll(secs(190));
    assert_eq!(
        summary.ack,
        Some(AckOutcome::Missed { retry_count: 2, interval: secs(180) })
    );
    assert_eq!(reporter.retry_count(), 2);
}

#[test]
fn test_scenario_reply_keeps_link_healthy() {
    let (mut reporter, _link, status) = build();
    run_span(&mut reporter, 0, 62);

    let inbox = reporter.inbox();
    assert!(inbox.deposit(&AcknowledgementFrame::for_sender(SENDER_ID, 0).encode()));
    run_span(&mut reporter, 63, 64);

    let summary = reporter.poll(secs(65));
    assert_eq!(summary.ack, Some(AckOutcome::Acknowledged { recovered: false }));
    assert_eq!(reporter.retry_count(), 0);
    assert_eq!(reporter.scheduler().interval(TimerId::Telemetry), Some(secs(10)));
    assert_eq!(reporter.scheduler().interval(TimerId::AckRequest), Some(secs(60)));
    assert_eq!(status.last(), Some(StatusNotice::Acknowledged));
    assert!(inbox.peek().is_none(), "inbox cleared after a match");
}

#[test]
fn test_recovery_restores_base_intervals() {
    let (mut reporter, link, status) = build();
    run_span(&mut reporter, 0, 190);
    assert_eq!(reporter.retry_count(), 2);

    // next request at 190 + 180 = 370, collector answers this time
    run_span(&mut reporter, 191, 370);
    reporter
        .inbox()
        .deposit(&AcknowledgementFrame::for_sender(SENDER_ID, 7).encode());
    let summary = reporter.poll(secs(375));
    assert_eq!(summary.ack, Some(AckOutcome::Acknowledged { recovered: true }));
    assert_eq!(reporter.link_state(), LinkState::Healthy);
    assert_eq!(status.last(), Some(StatusNotice::Acknowledged));

    // base cadence from the recovery point
    link.drain();
    run_span(&mut reporter, 376, 435);
    let frames = decoded(&link);
    assert_eq!(frames.len(), 6);
    let last = frames.last().unwrap();
    assert!(last.options.contains(OptionFlags::ACK_REQUESTED));
    assert!(!last.options.contains(OptionFlags::RETRY_IN_PROGRESS));
}

#[test]
fn test_foreign_ack_is_not_accepted() {
    let (mut reporter, _, _) = build();
    run_span(&mut reporter, 0, 60);
    reporter
        .inbox()
        .deposit(&AcknowledgementFrame::for_sender(SENDER_ID.swap_bytes(), 0).encode());

    let summary = reporter.poll(secs(65));
    assert!(matches!(summary.ack, Some(AckOutcome::Missed { retry_count: 1, .. })));
}

#[test]
fn test_malformed_inbound_treated_as_silence() {
    let (mut reporter, _, _) = build();
    run_span(&mut reporter, 0, 60);
    let inbox = reporter.inbox();
    assert!(!inbox.deposit(&[0xEF]));
    assert!(!inbox.deposit(&[0xEF, 0xE6, 0x00, 0x00, 0x00]));

    let summary = reporter.poll(secs(65));
    assert!(matches!(summary.ack, Some(AckOutcome::Missed { .. })));
}

#[test]
fn test_sequence_wraps_modulo_256() {
    let (mut reporter, link, _) = build();
    let inbox = reporter.inbox();
    let ack = AcknowledgementFrame::for_sender(SENDER_ID, 0).encode();
    for t in 0..=3000 {
        // collector answers every request, so cadence stays at 10
        inbox.deposit(&ack);
        reporter.poll(secs(t));
    }
    assert_eq!(reporter.retry_count(), 0);

    let frames = decoded(&link);
    assert!(frames.len() > 256);
    assert_eq!(frames[0].sequence, 1);
    for pair in frames.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence.wrapping_add(1));
    }
}

#[test]
fn test_every_frame_carries_checksum_and_identity() {
    let (mut reporter, link, _) = build();
    let events = reporter.events();
    events.record(InputSource::Left);
    run_span(&mut reporter, 0, 120);

    let frames = decoded(&link);
    assert!(frames.iter().all(|f| f.sender_id == SENDER_ID));
    assert!(frames
        .iter()
        .all(|f| f.options.contains(OptionFlags::CHECKSUM_PRESENT)));
    assert_eq!(frames[0].events, InputSource::Left.mask());
    assert!(frames[1..].iter().all(|f| f.events == 0));
}

#[test]
fn test_backoff_ceiling_holds_under_long_outage() {
    let (mut reporter, _, _) = build();
    let mut t = 0;
    let mut last_interval = Duration::ZERO;

    while reporter.retry_count() < 20 {
        t += 1;
        if let Some(AckOutcome::Missed { interval, .. }) = reporter.poll(secs(t)).ack {
            assert!(interval >= last_interval);
            last_interval = interval;
        }
    }
    assert_eq!(last_interval, secs(600));
}
