//! Criterion benchmarks for the mirror-core framing routines.
//!
//! Control records and video frames sit on the hot path of every session, so
//! their encode/decode cost is tracked here.
//!
//! Run with:
//! ```bash
//! cargo bench --package mirror-core --bench framing_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mirror_core::protocol::{decode_control_event, encode_control_event, encode_video_frame};
use mirror_core::ControlEvent;

/// Benchmarks control record encode and decode.
fn bench_control_event(c: &mut Criterion) {
    let event = ControlEvent::mouse(960, 540, 1, 2);
    let record = encode_control_event(&event);

    let mut group = c.benchmark_group("control_event");
    group.bench_function("encode", |b| b.iter(|| encode_control_event(black_box(&event))));
    group.bench_function("decode", |b| {
        b.iter(|| decode_control_event(black_box(&record)).expect("decode must succeed"))
    });
    group.finish();
}

/// Benchmarks video frame prefixing across typical encoder output sizes.
fn bench_video_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_video_frame");
    for size in [1_024usize, 16 * 1024, 256 * 1024] {
        let payload = vec![0x5Au8; size];
        group.bench_with_input(BenchmarkId::new("bytes", size), &payload, |b, payload| {
            b.iter(|| encode_video_frame(black_box(payload)).expect("encode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_control_event, bench_video_frame);
criterion_main!(benches);
