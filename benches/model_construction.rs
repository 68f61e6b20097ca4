//! Benchmarks for network parsing and System-Optimal model construction
//!
//! Networks are square grids of undirected edges with a BPR-like linear cost, with demand
//! between opposite corners and along the border.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use sotap::assignment::SystemOptimalModel;
use sotap::lp_model_builder;
use sotap::network::{Network, parser::parse};
use std::fmt::Write;

/// Grid sizes (nodes per side)
const GRID_SIZES: &[usize] = &[4, 8, 12];

/// Number of OD pairs generated per grid
const COMMODITIES: usize = 6;

/// Network description of a `size` x `size` grid
fn grid_network(size: usize) -> String {
    let mut out = String::from("function bpr (f) t0 * (1 + f / cap)\n");
    let node = |r: usize, c: usize| format!("n{}_{}", r, c);

    for r in 0..size {
        for c in 0..size {
            writeln!(out, "node {}", node(r, c)).unwrap();
        }
    }
    for r in 0..size {
        for c in 0..size {
            let t0 = 1.0 + ((r * size + c) % 5) as f64;
            if c + 1 < size {
                writeln!(
                    out,
                    "edge h{}_{} {} {} bpr {} 100",
                    r,
                    c,
                    node(r, c),
                    node(r, c + 1),
                    t0
                )
                .unwrap();
            }
            if r + 1 < size {
                writeln!(
                    out,
                    "edge v{}_{} {} {} bpr {} 80",
                    r,
                    c,
                    node(r, c),
                    node(r + 1, c),
                    t0
                )
                .unwrap();
            }
        }
    }

    let last = size - 1;
    let pairs = [
        (node(0, 0), node(last, last)),
        (node(last, last), node(0, 0)),
        (node(0, last), node(last, 0)),
        (node(last, 0), node(0, last)),
        (node(0, 0), node(0, last)),
        (node(last, 0), node(last, last)),
    ];
    for (i, (o, d)) in pairs.iter().take(COMMODITIES).enumerate() {
        writeln!(out, "od {} {} {} {}", i, o, d, 10 * (i + 1)).unwrap();
    }

    out
}

fn load_network(size: usize) -> Option<Network> {
    match parse(&grid_network(size)) {
        Ok(network) => Some(network),
        Err(e) => {
            eprintln!("Warning: Could not parse grid {}: {}. Skipping benchmark.", size, e);
            None
        }
    }
}

/// Benchmark parsing and cost resolution
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for &size in GRID_SIZES {
        let text = grid_network(size);
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_with_input(BenchmarkId::new("grid", size), &text, |b, text| {
            b.iter(|| black_box(parse(black_box(text))))
        });
    }

    group.finish();
}

/// Benchmark declaring variables, the objective and every constraint
fn bench_model_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_build");

    for &size in GRID_SIZES {
        let Some(network) = load_network(size) else {
            continue;
        };

        // Count edges times commodities for throughput measurement
        let shares = network.graph.edge_count() * network.od.len();
        group.throughput(Throughput::Elements(shares as u64));

        group.bench_with_input(BenchmarkId::new("grid", size), &network, |b, network| {
            b.iter(|| {
                let mut model =
                    SystemOptimalModel::new(black_box(network), lp_model_builder!()).unwrap();
                model.build().unwrap();
                black_box(model.stats())
            })
        });
    }

    group.finish();
}

/// Benchmark CPLEX LP rendering of a built model
fn bench_lp_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("lp_export");

    for &size in GRID_SIZES {
        let Some(network) = load_network(size) else {
            continue;
        };
        let mut model = SystemOptimalModel::new(&network, lp_model_builder!()).unwrap();
        model.build().unwrap();

        group.bench_with_input(BenchmarkId::new("grid", size), &model, |b, model| {
            b.iter(|| black_box(model.export_lp("grid")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_model_build, bench_lp_export);
criterion_main!(benches);
