//! Criterion benchmarks for the processing graph (`tandem-graph::graph`).
//!
//! Two axes:
//!
//! - **Prepare**: latency plan, topological sort and buffer allocation
//! - **Process**: `process_block()` throughput at varying block sizes
//!
//! Run with: `cargo bench -p tandem-graph -- graph/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tandem_graph::{Input, LatencyNode, NodeGraph, PlaybackInfo, SineNode, SummingNode};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZE: usize = 256;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

// ---------------------------------------------------------------------------
// Graph constructors
// ---------------------------------------------------------------------------

/// `n` stereo tones with latencies 0, 16, 32, ... merged by one summing node.
fn make_fan_in(n: usize) -> NodeGraph {
    let mut graph = NodeGraph::new();
    let mut inputs = Vec::with_capacity(n);
    for i in 0..n {
        let tone = graph.add(SineNode::new(110.0 * (i + 1) as f32, 0.1, 2)).unwrap();
        let node = if i == 0 {
            tone
        } else {
            graph.add(LatencyNode::new(Input::owned(tone), i * 16)).unwrap()
        };
        inputs.push(node);
    }
    graph.add(SummingNode::owned(&inputs)).unwrap();
    graph
}

/// Two levels of summing: `n` groups of four tones each.
fn make_nested(n: usize) -> NodeGraph {
    let mut graph = NodeGraph::new();
    let mut groups = Vec::with_capacity(n);
    for g in 0..n {
        let mut members = Vec::with_capacity(4);
        for i in 0..4 {
            let tone = graph.add(SineNode::new(220.0, 0.05, 2)).unwrap();
            members.push(
                graph
                    .add(LatencyNode::new(Input::owned(tone), g * 8 + i * 3))
                    .unwrap(),
            );
        }
        groups.push(graph.add(SummingNode::owned(&members)).unwrap());
    }
    graph.add(SummingNode::owned(&groups)).unwrap();
    graph
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/prepare");
    for n in [4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("fan_in", n), &n, |b, &n| {
            b.iter_batched(
                || make_fan_in(n),
                |mut graph| {
                    graph
                        .prepare(PlaybackInfo::new(SAMPLE_RATE, BLOCK_SIZE))
                        .unwrap();
                    black_box(graph)
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/process");
    for &block in BLOCK_SIZES {
        let mut graph = make_nested(8);
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, block)).unwrap();
        group.bench_with_input(BenchmarkId::new("nested_8x4", block), &block, |b, _| {
            b.iter(|| black_box(graph.process_block()));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_prepare, bench_process);
criterion_main!(benches);
