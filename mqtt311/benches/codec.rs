//! Benchmarks for the MQTT 3.1.1 codec and the publish path.
//!
//! Run with: cargo bench -p giztoy-mqtt311

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use giztoy_mqtt311::protocol::{self, Packet};
use giztoy_mqtt311::{ConnectOptions, QoS, Session};

/// Benchmark: remaining length encode/decode at each byte width.
fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");

    for value in [127usize, 16_383, 2_097_151, 268_435_455] {
        group.bench_with_input(BenchmarkId::new("encode", value), &value, |b, &value| {
            let mut buf = Vec::with_capacity(4);
            b.iter(|| {
                buf.clear();
                protocol::encode_remaining_length(black_box(value), &mut buf).unwrap();
            });
        });

        let mut encoded = Vec::new();
        protocol::encode_remaining_length(value, &mut encoded).unwrap();
        group.bench_with_input(BenchmarkId::new("decode", value), &encoded, |b, encoded| {
            b.iter(|| protocol::decode_remaining_length(black_box(encoded)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark: packet builders.
fn bench_build(c: &mut Criterion) {
    let options = ConnectOptions::new("bench-client")
        .with_credentials("user", "secret")
        .with_will("status/bench-client", "offline", QoS::AtLeastOnce, true);

    c.bench_function("build/connect", |b| {
        b.iter(|| Packet::connect(black_box(&options)).unwrap().to_bytes())
    });

    c.bench_function("build/subscribe", |b| {
        b.iter(|| Packet::subscribe(black_box("sensors/+/temp"), QoS::AtLeastOnce).unwrap())
    });

    let mut group = c.benchmark_group("build/publish");
    for size in [64usize, 1024, 16 * 1024] {
        let payload = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                Packet::publish("bench/topic", black_box(payload), false, QoS::AtMostOnce, 0)
                    .unwrap()
                    .to_bytes()
            });
        });
    }
    group.finish();
}

/// Benchmark: inbound PUBLISH decoding.
fn bench_decode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_publish");

    for size in [64usize, 1024, 16 * 1024] {
        let frame = Packet::publish("bench/topic", &vec![0u8; size], false, QoS::AtLeastOnce, 1)
            .unwrap()
            .to_bytes();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| protocol::decode_publish(black_box(frame)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark: session publish over an in-memory pipe.
fn bench_session_publish(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let session = rt.block_on(async {
        let (client, mut broker) = tokio::io::duplex(256 * 1024);
        let session = Session::with_stream(client, ConnectOptions::new("bench").with_keep_alive(0));

        broker.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();
        broker.write_all(&[0x90, 0x03, 0x00, 0x10, 0x00]).await.unwrap();
        session.connect().await.unwrap();
        session.subscribe("bench/topic", QoS::AtMostOnce).await.unwrap();

        // Drain everything the session writes.
        tokio::spawn(async move {
            let mut buf = vec![0u8; 64 * 1024];
            while let Ok(n) = broker.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        });

        session
    });

    let mut group = c.benchmark_group("session_publish");
    for size in [64usize, 1024, 4096] {
        let payload = vec![0u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.to_async(&rt).iter(|| async {
                session.publish(payload).await.unwrap();
            });
        });
    }
    group.finish();

    rt.block_on(async {
        session.disconnect().await.unwrap();
    });
}

criterion_group!(
    benches,
    bench_remaining_length,
    bench_build,
    bench_decode_publish,
    bench_session_publish,
);
criterion_main!(benches);
