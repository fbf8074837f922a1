//! Record codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fuelkv_bench::random_features;
use fuelkv_codec::{decode_record, encode_record, Value};

/// A small metadata record.
fn metadata() -> Value {
    Value::map(vec![
        (Value::from("speaker"), Value::from("spk-0042")),
        (Value::from("frames"), Value::Integer(1_250)),
        (Value::from("duration"), Value::Float(12.5)),
    ])
}

/// Benchmark encoding feature vectors of growing dimension.
fn bench_encode_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_features");

    for dim in [16usize, 128, 1024, 8192] {
        group.throughput(Throughput::Elements(dim as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dim), &dim, |b, &dim| {
            let value = random_features(dim);
            b.iter(|| {
                let bytes = encode_record(black_box(&value)).unwrap();
                black_box(bytes);
            });
        });
    }

    group.finish();
}

/// Benchmark decoding feature vectors of growing dimension.
fn bench_decode_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_features");

    for dim in [16usize, 128, 1024, 8192] {
        let bytes = encode_record(&random_features(dim)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dim), &bytes, |b, bytes| {
            b.iter(|| {
                let value = decode_record(black_box(bytes)).unwrap();
                black_box(value);
            });
        });
    }

    group.finish();
}

/// Benchmark a small map, where key sorting dominates.
fn bench_metadata(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata");
    let value = metadata();
    let bytes = encode_record(&value).unwrap();

    group.bench_function("encode", |b| {
        b.iter(|| black_box(encode_record(black_box(&value)).unwrap()));
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(decode_record(black_box(&bytes)).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_features,
    bench_decode_features,
    bench_metadata
);
criterion_main!(benches);
