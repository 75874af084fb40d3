//! Criterion benchmarks for [`ByteBuffer`] assembly and materialization.
//!
//! Pages typically build a label from many small `append` calls and print
//! it once, so the interesting costs are per-append overhead and the single
//! concatenation at print time.
//!
//! Run with:
//! ```bash
//! cargo bench --package printbridge-core --bench buffer_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use printbridge_core::{ByteBuffer, Charset};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// One ZPL field, roughly what a page appends per call.
const FIELD: &[u8] = b"^FO50,50^A0N,30,30^FDShipping label line^FS";

fn build_buffer(chunks: usize) -> ByteBuffer {
    let mut buffer = ByteBuffer::new();
    for _ in 0..chunks {
        buffer.append(FIELD);
    }
    buffer
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for &count in &[10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("chunks", count), &count, |b, &count| {
            b.iter(|| black_box(build_buffer(count)))
        });
    }

    group.finish();
}

fn bench_append_text(c: &mut Criterion) {
    c.bench_function("append_text_latin1", |b| {
        b.iter(|| {
            let mut buffer = ByteBuffer::new();
            buffer.append_text(black_box("Größe: 42 cm, Preis: 9,99 €"), Charset::Iso8859_1);
            buffer
        })
    });
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");

    for &count in &[1usize, 10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::new("first_call", count), &count, |b, &count| {
            b.iter_batched(
                || build_buffer(count),
                |buffer| black_box(buffer.materialize()),
                criterion::BatchSize::SmallInput,
            )
        });

        let cached = build_buffer(count);
        cached.materialize();
        group.bench_with_input(BenchmarkId::new("cached", count), &count, |b, _| {
            b.iter(|| black_box(cached.materialize()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_append, bench_append_text, bench_materialize);
criterion_main!(benches);
