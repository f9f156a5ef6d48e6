//! Benchmarks for the key hashing and sharding hot paths.

use std::fs;
use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use partitioned_join::cancel::Cancellation;
use partitioned_join::dataset::Dataset;
use partitioned_join::ingestion::Dialect;
use partitioned_join::join::{shard_dataset, shard_index, KeyAtom};
use partitioned_join::schema::TableSchema;
use partitioned_join::types::DataType;

fn bench_shard_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_index");
    let keys: Vec<Vec<KeyAtom>> = (0..10_000i64)
        .map(|i| vec![KeyAtom::Int(i), KeyAtom::Str(format!("name-{i}"))])
        .collect();
    group.throughput(Throughput::Elements(keys.len() as u64));
    group.bench_function("int_str_pairs", |b| {
        b.iter(|| {
            for k in &keys {
                black_box(shard_index(k, 64));
            }
        })
    });
    group.finish();
}

fn bench_shard_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("shard_dataset");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(5));

    let dir = tempfile::tempdir().expect("tempdir");
    let rows = 50_000u64;
    let mut body = String::from("id,score,name\n");
    for i in 0..rows {
        body.push_str(&format!("{i},{}.5,user{i}\n", i % 100));
    }
    let path = dir.path().join("input.csv");
    fs::write(&path, body).expect("write input");

    let schema = TableSchema {
        ids: vec!["id".into()],
        features: vec!["score".into(), "name".into()],
        id_types: vec![DataType::Int64],
        feature_types: vec![DataType::Float64, DataType::Str],
        ..Default::default()
    };
    let ds = Dataset::new(&path, schema, vec!["id".into()]);

    for &shards in &[2usize, 8, 32] {
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(BenchmarkId::from_parameter(shards), &shards, |b, &n| {
            b.iter(|| {
                let scratch = tempfile::tempdir().expect("scratch");
                let set = shard_dataset(0, &ds, Dialect::default(), n, scratch.path(), &Cancellation::new())
                    .expect("shard");
                black_box(set.rows);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shard_index, bench_shard_dataset);
criterion_main!(benches);
