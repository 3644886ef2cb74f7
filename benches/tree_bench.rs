//! Multicast tree Criterion benchmarks.
//!
//! Measures balanced tree construction, both reconfiguration directions,
//! and graph wire-format round trips. All of these run on the control
//! plane; the targets are generous but keep regressions visible.
//!
//! Run with: cargo bench --bench tree_bench

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use streamcast::tree::{reconfigure, MulticastGraph, TreeBuilder, TreeShape};

fn numbered(position: streamcast::tree::NodePosition) -> Result<String, String> {
    Ok(format!("n{}", position.id))
}

fn build_graph(workers: u32, degree: usize) -> MulticastGraph {
    TreeBuilder::new("root")
        .build_balanced_partial_tree(workers * 4, workers, degree, numbered)
        .expect("construction failed")
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_balanced_partial_tree");
    for workers in [16u32, 128, 1024] {
        group.throughput(Throughput::Elements(u64::from(workers)));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            let builder = TreeBuilder::new("root");
            b.iter(|| {
                builder
                    .build_balanced_partial_tree(black_box(w * 4), black_box(w), 4, numbered)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_shapes");
    let builder = TreeBuilder::new("root");
    for (name, shape) in [
        ("chain", TreeShape::Chain),
        ("binomial", TreeShape::Binomial),
        ("star", TreeShape::Star),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| builder.build_tree(shape, 512, 128, 4, numbered).unwrap());
        });
    }
    group.finish();
}

fn bench_reconfigure(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconfigure");
    for workers in [128u32, 1024] {
        let graph = build_graph(workers, 4);
        group.throughput(Throughput::Elements(u64::from(workers)));
        group.bench_with_input(
            BenchmarkId::new("scale_down", workers),
            &graph,
            |b, graph| b.iter(|| reconfigure(black_box(graph), 4, 2).unwrap()),
        );
        group.bench_with_input(BenchmarkId::new("scale_up", workers), &graph, |b, graph| {
            b.iter(|| reconfigure(black_box(graph), 4, 8).unwrap());
        });
    }
    group.finish();
}

fn bench_wire_round_trip(c: &mut Criterion) {
    let graph = build_graph(512, 4);
    let json = graph.to_json().unwrap();
    let mut group = c.benchmark_group("wire");
    group.bench_function("to_json", |b| {
        b.iter(|| black_box(&graph).to_json().unwrap());
    });
    group.bench_function("from_json", |b| {
        b.iter(|| MulticastGraph::from_json(black_box(&json)).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_shapes,
    bench_reconfigure,
    bench_wire_round_trip
);
criterion_main!(benches);
