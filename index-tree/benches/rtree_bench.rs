//! R-tree benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use index_tree::{Envelope, RTree, SplitPolicy, TreeConfig};
use std::hint::black_box;
use tempfile::tempdir;

fn cell(i: u32) -> Envelope {
    let x = (i % 100) as f64;
    let y = (i / 100) as f64;
    Envelope::from_2d(x, y, x + 1.0, y + 1.0).unwrap()
}

fn bench_memory_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("Memory RTree Insert");

    for policy in [SplitPolicy::Linear, SplitPolicy::Quadratic] {
        for size in [100u32, 1000, 10000].iter() {
            let id = BenchmarkId::new(format!("{:?}", policy), size);
            group.bench_with_input(id, size, |b, &size| {
                b.iter_with_setup(
                    || RTree::in_memory(TreeConfig::new().with_split_policy(policy)).unwrap(),
                    |mut tree| {
                        for i in 0..size {
                            tree.insert(i + 1, cell(i)).unwrap();
                        }
                        black_box(tree.len())
                    },
                );
            });
        }
    }

    group.finish();
}

fn bench_file_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("File RTree Insert");

    for size in [100u32, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("bench.tree");
                    (RTree::create(&path, TreeConfig::default()).unwrap(), dir)
                },
                |(mut tree, _dir)| {
                    for i in 0..size {
                        tree.insert(i + 1, cell(i)).unwrap();
                    }
                    black_box(tree.len())
                },
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("RTree Search");
    let query = Envelope::from_2d(25.0, 25.0, 75.0, 75.0).unwrap();

    let mut memory = RTree::in_memory(TreeConfig::default()).unwrap();
    for i in 0..10000 {
        memory.insert(i + 1, cell(i)).unwrap();
    }
    group.bench_function("memory_search_10k", |b| {
        b.iter(|| black_box(memory.search(&query).unwrap()));
    });

    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.tree");
    let mut paged = RTree::create(&path, TreeConfig::default()).unwrap();
    for i in 0..10000 {
        paged.insert(i + 1, cell(i)).unwrap();
    }
    paged.flush().unwrap();
    group.bench_function("file_search_10k", |b| {
        b.iter(|| black_box(paged.search(&query).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_memory_insert, bench_file_insert, bench_search);
criterion_main!(benches);
