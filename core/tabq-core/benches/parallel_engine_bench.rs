use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use std::sync::Arc;
use tabq_core::engine::ParallelExecutionEngine;
use tabq_core::sql::ast::{SelectEntity, col, lit};
use tabq_core::sql::ParallelQueryExecutor;
use tabq_core::{Catalog, ExecutionConfig, Executor, Value};

// ════════════════════════════════════════════
// Parallel Execution Engine Benchmarks
// ════════════════════════════════════════════

fn bench_parallel_engine_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_engine_policies");

    for size in [100, 1_000, 10_000, 100_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("auto", size), size, |b, &size| {
            let engine = ParallelExecutionEngine::new_auto().unwrap();
            b.iter(|| {
                engine.execute(|| {
                    (0..size)
                        .into_par_iter()
                        .map(|i| black_box(i * 2))
                        .sum::<usize>()
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("fixed_4", size), size, |b, &size| {
            let engine = ParallelExecutionEngine::new_fixed(4).unwrap();
            b.iter(|| {
                engine.execute(|| {
                    (0..size)
                        .into_par_iter()
                        .map(|i| black_box(i * 2))
                        .sum::<usize>()
                })
            });
        });

        // Sequential baseline
        group.bench_with_input(BenchmarkId::new("sequential", size), size, |b, &size| {
            b.iter(|| (0..size).map(|i| black_box(i * 2)).sum::<usize>());
        });
    }

    group.finish();
}

fn bench_auto_tune(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_tune");
    let engine = ParallelExecutionEngine::new_auto().unwrap();

    for size in [100, 1_000, 10_000, 100_000, 1_000_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| engine.auto_tune(black_box(size), 1_000));
        });
    }

    group.finish();
}

// ════════════════════════════════════════════
// Record Mapping Benchmarks
// ════════════════════════════════════════════

fn bench_map_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_records");
    let values: Arc<Vec<Value>> = Arc::new((0..100_000i64).map(Value::from).collect());

    for threads in [1usize, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(values.len() as u64));
        group.bench_with_input(BenchmarkId::new("threads", threads), threads, |b, &threads| {
            let engine = ParallelExecutionEngine::new_fixed(threads).unwrap();
            let executor = ParallelQueryExecutor::from_engine(&engine).with_min_rows(1_000);
            let values = Arc::clone(&values);
            b.iter(|| {
                executor
                    .map_records(values.len(), |i| Ok(values[i].to_float().unwrap_or_default() * 1.5))
                    .unwrap()
            });
        });
    }

    group.finish();
}

// ════════════════════════════════════════════
// End-to-End Query Benchmarks
// ════════════════════════════════════════════

fn bench_where_by_cpu(c: &mut Criterion) {
    let mut group = c.benchmark_group("where_by_cpu");
    let catalog = Arc::new(Catalog::new());
    let rows = (0..50_000i64)
        .map(|i| vec![Value::from(i), Value::from((i * 31) % 997)])
        .collect();
    catalog.register("t", &["id", "v"], rows).unwrap();
    let query = SelectEntity::new()
        .field(col("id"))
        .from_table("t")
        .filter(col("v").gt(lit(500)).and(col("id").lt(lit(40_000))))
        .into_query();

    group.throughput(Throughput::Elements(50_000));
    for cpu in [1usize, 2, 4].iter() {
        group.bench_with_input(BenchmarkId::new("cpu", cpu), cpu, |b, &cpu| {
            let config = ExecutionConfig::default().with_cpu(cpu).with_min_rows_for_parallel(1_000);
            let executor = Executor::with_config(config, Arc::clone(&catalog)).unwrap();
            b.iter(|| executor.query(black_box(&query)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_parallel_engine_policies,
    bench_auto_tune,
    bench_map_records,
    bench_where_by_cpu
);
criterion_main!(benches);
