//! Performance benchmarks for floe-state operations.
//!
//! Run with: cargo bench --package floe-state

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use floe_state::{path, produce, Path, Store, Value};
use serde_json::json;

// ============================================================================
// Helper functions to generate test data
// ============================================================================

/// Generate a flat snapshot with N fields
fn generate_flat_snapshot(num_fields: usize) -> Value {
    (0..num_fields)
        .map(|i| (format!("field_{i}"), Value::from(i as i64)))
        .collect()
}

/// Generate a deeply nested snapshot
fn generate_nested_snapshot(depth: usize) -> Value {
    let mut current = Value::from_json(json!({"value": 42}));
    for i in (0..depth).rev() {
        current = [(format!("level_{i}"), current)].into_iter().collect();
    }
    current
}

/// Generate a snapshot holding one list of N rows
fn generate_list_snapshot(rows: usize) -> Value {
    let data: Vec<Value> = (0..rows)
        .map(|i| Value::from_json(json!({"id": i, "label": format!("row {i}")})))
        .collect();
    [
        ("data".to_string(), Value::from(data)),
        ("selected".to_string(), Value::Null),
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Benchmark: single-field produce vs deep clone across document widths
// ============================================================================

fn bench_produce_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_flat_snapshot");

    for num_fields in [10, 100, 1000, 10000] {
        group.throughput(Throughput::Elements(num_fields as u64));
        let snap = generate_flat_snapshot(num_fields);

        group.bench_with_input(
            BenchmarkId::new("set_one_field", num_fields),
            &snap,
            |b, snap| {
                b.iter(|| {
                    let next = produce(black_box(snap), |d| d.set("field_0", -1)).unwrap();
                    black_box(next)
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("deep_clone", num_fields),
            &snap,
            |b, snap| b.iter(|| black_box(snap.deep_clone())),
        );
    }

    group.finish();
}

fn bench_produce_nested(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_nested_snapshot");

    for depth in [4, 16, 64] {
        let snap = generate_nested_snapshot(depth);
        let mut target = Path::root();
        for i in 0..depth {
            target = target.key(format!("level_{i}"));
        }
        let target = target.key("value");

        group.bench_with_input(BenchmarkId::from_parameter(depth), &snap, |b, snap| {
            b.iter(|| {
                let next = produce(black_box(snap), |d| d.set(target.clone(), 0)).unwrap();
                black_box(next)
            })
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: editing one row of a large list shares the rest
// ============================================================================

fn bench_produce_list_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_list_row");

    for rows in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(rows as u64));
        let snap = generate_list_snapshot(rows);

        group.bench_with_input(BenchmarkId::from_parameter(rows), &snap, |b, snap| {
            b.iter(|| {
                let next = produce(black_box(snap), |d| {
                    d.set(path!("data", 0, "label"), "edited")
                })
                .unwrap();
                black_box(next)
            })
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: dispatch fan-out across listener counts
// ============================================================================

fn bench_dispatch_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_fanout");

    for listeners in [1, 10, 100] {
        group.throughput(Throughput::Elements(listeners as u64));

        let store = Store::new(generate_list_snapshot(100));
        let subs: Vec<_> = (0..listeners)
            .map(|_| store.subscribe(|| {}))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &store, |b, store| {
            b.iter(|| store.set_state(|d| d.set("selected", 1)).unwrap())
        });

        drop(subs);
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_produce_flat,
    bench_produce_nested,
    bench_produce_list_row,
    bench_dispatch_fanout
);
criterion_main!(benches);
