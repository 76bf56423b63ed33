use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use telemetry_reporter::checksum::checksum;
use telemetry_reporter::sensor::FixedSensor;
use telemetry_reporter::status::RecordingStatus;
use telemetry_reporter::transmitter::LoopbackTransmitter;
use telemetry_reporter::{
    AckManager, OptionFlags, Reporter, ReporterConfig, TelemetryFrame,
};

fn benchmark_checksum(c: &mut Criterion) {
    let body = [0xEF, 0xE6, 0x05, 0x02, 0x00, 0xFA, 0x01];

    c.bench_function("crc8_frame_body", |b| {
        b.iter(|| checksum(black_box(&body)));
    });
}

fn benchmark_encode(c: &mut Criterion) {
    let frame = TelemetryFrame {
        sender_id: 61414,
        sequence: 5,
        options: OptionFlags::CHECKSUM_PRESENT | OptionFlags::ACK_REQUESTED,
        reading: 250,
        events: 0b0100_0001,
    };

    c.bench_function("encode_telemetry_frame", |b| {
        b.iter(|| black_box(&frame).encode());
    });
}

fn benchmark_backoff(c: &mut Criterion) {
    c.bench_function("calculate_linear_backoff", |b| {
        b.iter(|| {
            for retry in 0..10 {
                AckManager::calculate_backoff(
                    retry,
                    black_box(Duration::from_secs(60)),
                    black_box(Duration::from_secs(600)),
                );
            }
        });
    });
}

fn benchmark_poll(c: &mut Criterion) {
    c.bench_function("reporter_poll_hour", |b| {
        b.iter(|| {
            let link = LoopbackTransmitter::new();
            let mut reporter = Reporter::with_seed(
                ReporterConfig::default(),
                0,
                link.clone(),
                FixedSensor(250),
                RecordingStatus::new(),
            );
            for t in 0..3600 {
                reporter.poll(Duration::from_secs(t));
            }
            link.sent().len()
        });
    });
}

criterion_group!(
    benches,
    benchmark_checksum,
    benchmark_encode,
    benchmark_backoff,
    benchmark_poll
);
criterion_main!(benches);
