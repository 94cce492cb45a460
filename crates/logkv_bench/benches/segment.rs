//! Segment append and replay benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logkv_bench::{encode_segment, generate_records};
use logkv_core::{Record, Segment, SegmentId, Value};
use logkv_storage::{FileBackend, InMemoryBackend};
use tempfile::TempDir;

/// Benchmark appends to an in-memory segment.
fn bench_memory_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_append_memory");

    for size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut segment =
                Segment::new(SegmentId::FIRST, Box::new(InMemoryBackend::new()), false);
            let record = Record::set("key", Value::string("x".repeat(size), 1));

            b.iter(|| {
                let offset = segment.append(black_box(&record)).unwrap();
                black_box(offset);
            });
        });
    }

    group.finish();
}

/// Benchmark appends to a file segment, with and without fsync.
fn bench_file_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_append_file");

    // Use smaller sample size for fsync-bound operations
    group.sample_size(20);

    for sync in [false, true] {
        let name = if sync { "sync" } else { "no_sync" };
        group.bench_function(name, |b| {
            let temp_dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&temp_dir.path().join("segment-000001")).unwrap();
            let mut segment = Segment::new(SegmentId::FIRST, Box::new(backend), sync);
            let record = Record::set("key", Value::string("value", 1));

            b.iter(|| {
                segment.append(black_box(&record)).unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark replaying a segment.
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_replay");

    for count in [100, 1_000, 10_000].iter() {
        let data = encode_segment(&generate_records(*count, 100, 32, 10));
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            let segment = Segment::new(
                SegmentId::FIRST,
                Box::new(InMemoryBackend::with_data(data.clone())),
                false,
            );

            b.iter(|| {
                let records = segment.replay().unwrap();
                black_box(records);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_memory_append, bench_file_append, bench_replay);
criterion_main!(benches);
