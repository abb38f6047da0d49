//! Criterion micro-benchmarks for message framing and the post office.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use weft_core::Reference;
use weft_mcp::framing::{read_frame, write_frame};
use weft_mcp::{DirectClient, DirectRegistry, DirectServer, PostOffice, TransportClient, TransportServer};

/// Benchmark: Frame and unframe a 1 MiB payload.
fn bench_frame_1mib(c: &mut Criterion) {
    let payload = vec![0xA5u8; 1 << 20];
    let mut buf = Vec::with_capacity(payload.len() + 8);

    c.bench_function("frame_1mib", |b| {
        b.iter(|| {
            buf.clear();
            write_frame(&mut buf, &payload).unwrap();
            let mut reader = buf.as_slice();
            let back = read_frame(&mut reader).unwrap();
            black_box(back);
        });
    });
}

/// Benchmark: Deposit and collect 1000 small messages for one receiver.
fn bench_post_office_1k(c: &mut Criterion) {
    let office = PostOffice::new();
    let receiver: Reference = "micro[0].init_in".parse().unwrap();

    c.bench_function("post_office_1k", |b| {
        b.iter(|| {
            for i in 0u32..1000 {
                office.deposit(receiver.clone(), i.to_le_bytes().to_vec()).unwrap();
            }
            for _ in 0..1000 {
                let message = office.get_message(&receiver, Some(Duration::ZERO)).unwrap();
                black_box(message);
            }
        });
    });
}

/// Benchmark: One request/response over the in-process transport.
fn bench_direct_round_trip(c: &mut Criterion) {
    let registry = DirectRegistry::new();
    let office = Arc::new(PostOffice::new());
    let mut server = DirectServer::start(&registry, office.clone()).unwrap();
    let mut client = DirectClient::connect(&registry, &server.location()).unwrap();
    let receiver: Reference = "micro[0].init_in".parse().unwrap();
    let request = receiver.to_string();
    let message = vec![7u8; 256];

    c.bench_function("direct_round_trip", |b| {
        b.iter(|| {
            office.deposit(receiver.clone(), message.clone()).unwrap();
            let reply = client.call(request.as_bytes(), None).unwrap();
            black_box(reply);
        });
    });

    client.close().unwrap();
    server.close().unwrap();
}

criterion_group!(
    benches,
    bench_frame_1mib,
    bench_post_office_1k,
    bench_direct_round_trip
);
criterion_main!(benches);
