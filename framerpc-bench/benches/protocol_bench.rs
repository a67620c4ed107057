//! Framing, envelope and dispatch benchmarks.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use framerpc_protocol::{encode_frame, Envelope, Frame, JsonCodec, PayloadCodec};
use framerpc_server::{ConnectionHandler, MethodResult, Methods, Registry, Service};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

struct Echo;

#[derive(Serialize, Deserialize)]
struct Blob {
    data: String,
}

#[derive(Default, Serialize)]
struct BlobLen {
    len: usize,
}

impl Echo {
    fn measure(&self, args: Blob, reply: &mut BlobLen) -> MethodResult {
        reply.len = args.data.len();
        Ok(())
    }
}

impl Service for Echo {
    fn register_methods<C: PayloadCodec>(methods: &mut Methods<'_, Self, C>) {
        methods.method("Measure", Self::measure);
    }
}

fn create_test_request(payload_size: usize) -> Vec<u8> {
    let codec = JsonCodec;
    let params = codec
        .encode(&Blob {
            data: "x".repeat(payload_size),
        })
        .unwrap();
    codec
        .encode_envelope(&Envelope::new("Echo.Measure", params))
        .unwrap()
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(7, Bytes::from("x".repeat(size)));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let encoded = encode_frame(7, "x".repeat(size).as_bytes()).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = BytesMut::from(&encoded[..]);
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_envelope_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_decode");
    let codec = JsonCodec;

    for size in [100, 1000, 10000] {
        let request = create_test_request(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(codec.decode_envelope(request).unwrap()));
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    let mut registry = Registry::new();
    registry.register(Echo).unwrap();
    let handler = ConnectionHandler::new(Arc::new(registry), Arc::new(JsonCodec));

    for size in [100, 1000, 10000] {
        let request = create_test_request(size);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| black_box(handler.handle_request(request).unwrap()));
        });
    }

    group.bench_function("unknown_method", |b| {
        let request = JsonCodec
            .encode_envelope(&Envelope::new("Echo.Missing", &b"{}"[..]))
            .unwrap();
        b.iter(|| black_box(handler.handle_request(&request).is_err()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_envelope_decode,
    bench_dispatch,
);

criterion_main!(benches);
