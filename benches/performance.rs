//! Performance benchmarks for the MQTT load tester
//!
//! Covers the per-message hot path (registry bookkeeping, payload encoding
//! and decoding) and the post-run statistics over realistic run sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mqtt_load_tester::{
    clock::SendStamp,
    models::{
        message::{build_payload_data, InboundPayload, OutboundMessage},
        Outcome, ResultRecord,
    },
    report::chart_bars,
    stats::{DelayStatistics, MessageTally},
    tracker::OutcomeRegistry,
    types::OutcomeKind,
};

/// Delays with a little spread, in milliseconds
fn sample_delays(count: usize) -> Vec<f64> {
    (0..count).map(|i| 5.0 + (i % 97) as f64 * 0.37).collect()
}

/// Records with a 10% timeout rate
fn sample_records(count: usize) -> Vec<ResultRecord> {
    (1..=count as u32)
        .map(|i| {
            let outcome = if i % 10 == 0 {
                Outcome::timeout(i, "2024-01-01T00:00:00Z".to_string())
            } else {
                let send = i as f64;
                Outcome::success(i, "2024-01-01T00:00:00Z".to_string(), send, send + 0.005 + (i % 7) as f64 * 0.001)
            };
            ResultRecord::from(&outcome)
        })
        .collect()
}

fn stamp() -> SendStamp {
    SendStamp {
        wall_clock: "2024-01-01T00:00:00Z".to_string(),
        monotonic: 1.0,
    }
}

/// Benchmark the registry as the dispatcher and timer wheel use it
fn benchmark_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");

    for size in [100u32, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::new("register_and_resolve", size), size, |b, &size| {
            b.iter(|| {
                let registry = OutcomeRegistry::new();
                for index in 1..=size {
                    registry.register_send(index, stamp()).unwrap();
                }
                for index in 1..=size {
                    let kind = if index % 10 == 0 { OutcomeKind::Timeout } else { OutcomeKind::Success };
                    black_box(registry.try_resolve(index, kind));
                    registry.mark_enqueued();
                }
                black_box(registry.counts());
            });
        });
    }

    group.bench_function("duplicate_resolve", |b| {
        let registry = OutcomeRegistry::new();
        registry.register_send(1, stamp()).unwrap();
        registry.try_resolve(1, OutcomeKind::Success);
        b.iter(|| black_box(registry.try_resolve(black_box(1), OutcomeKind::Timeout)));
    });

    group.finish();
}

/// Benchmark payload encoding and decoding
fn benchmark_payloads(c: &mut Criterion) {
    let mut group = c.benchmark_group("payloads");

    for length in [55usize, 1_024, 65_536].iter() {
        let message = OutboundMessage::new(42, "2024-01-01T00:00:00Z".to_string(), 1.5, build_payload_data(*length));
        let encoded = message.to_json().unwrap();

        group.bench_with_input(BenchmarkId::new("encode", length), length, |b, _| {
            b.iter(|| black_box(message.to_json().unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("decode", length), length, |b, _| {
            b.iter(|| black_box(InboundPayload::decode(black_box(encoded.as_bytes())).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the report statistics
fn benchmark_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("statistics");

    for size in [10usize, 100, 1_000, 10_000].iter() {
        let delays = sample_delays(*size);
        let records = sample_records(*size);

        group.bench_with_input(BenchmarkId::new("delay_statistics", size), size, |b, _| {
            b.iter(|| black_box(DelayStatistics::from_delays(black_box(&delays))));
        });

        group.bench_with_input(BenchmarkId::new("tally", size), size, |b, _| {
            b.iter(|| black_box(MessageTally::from_records(black_box(&records))));
        });

        group.bench_with_input(BenchmarkId::new("chart_bars", size), size, |b, _| {
            b.iter(|| black_box(chart_bars(black_box(&records))));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_registry, benchmark_payloads, benchmark_statistics);
criterion_main!(benches);
