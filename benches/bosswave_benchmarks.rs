// ABOUTME: Benchmark suite for the broker frame codec
// ABOUTME: Measures encode and parse throughput for representative frames

use bosswave::{Command, Frame, PayloadObject, RoutingObject};
use bytes::{Bytes, BytesMut};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::io::Cursor;

fn sample_publish_frame() -> Frame {
    let mut frame = Frame::new(Command::PUBLISH, 42);
    frame.add_kv("uri", "castle/keep/door/sensors/0");
    frame.add_kv("autochain", "true");
    frame.add_routing_object(RoutingObject::new(2, Bytes::from_static(&[7u8; 32])));
    frame.add_payload_object(PayloadObject::from_num(
        64,
        Bytes::from_static(&[0x55u8; 256]),
    ));
    frame
}

fn bench_frame_encode(c: &mut Criterion) {
    let frame = sample_publish_frame();
    c.bench_function("frame_encode", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(512);
            black_box(&frame).encode(&mut buf);
            black_box(buf);
        })
    });
}

fn bench_frame_parse(c: &mut Criterion) {
    let bytes = sample_publish_frame().to_bytes();
    c.bench_function("frame_parse", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(bytes.as_ref());
            black_box(Frame::parse(&mut cursor).expect("sample frame parses"))
        })
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let frame = sample_publish_frame();
    c.bench_function("frame_round_trip", |b| {
        b.iter(|| {
            let bytes = black_box(&frame).to_bytes();
            let mut cursor = Cursor::new(bytes.as_ref());
            black_box(Frame::parse(&mut cursor).expect("sample frame parses"))
        })
    });
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_parse,
    bench_round_trip
);
criterion_main!(benches);
