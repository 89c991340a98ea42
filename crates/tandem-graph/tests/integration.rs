//! Integration tests for tandem-graph.
//!
//! Builds small graphs from source nodes and checks rendered output at the
//! sample level: latency node timing, summing and alignment, readiness within
//! a block, aliasing passthroughs with shared meters, and bridge delivery
//! across threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tandem_graph::bridge;
use tandem_graph::{
    BufferNode, GraphError, Input, LatencyNode, LiveMidiEvent, LiveMidiOutputNode, MidiMessage,
    MidiSequenceNode, NodeGraph, NodeId, PlaybackInfo, SharedLevelMeterNode, SineNode,
    SinkRegistry, SummingNode,
};

const SAMPLE_RATE: f32 = 48000.0;

/// Mono ramp 1, 2, 3, ... of the given length.
fn ramp(len: usize) -> Vec<f32> {
    (1..=len).map(|i| i as f32).collect()
}

/// Mono buffer with a single 1.0 at `at`.
fn impulse(len: usize, at: usize) -> Vec<f32> {
    let mut v = vec![0.0; len];
    v[at] = 1.0;
    v
}

/// Renders `blocks` blocks and returns channel `ch` of `node`'s output, concatenated.
fn render_channel(graph: &mut NodeGraph, node: NodeId, ch: usize, blocks: usize) -> Vec<f32> {
    let mut out = Vec::new();
    for _ in 0..blocks {
        graph.process_block();
        out.extend_from_slice(graph.output(node).unwrap().audio.channel(ch));
    }
    out
}

/// Renders `blocks` blocks and returns `node`'s MIDI as (timeline sample, note).
fn render_midi(graph: &mut NodeGraph, node: NodeId, blocks: usize) -> Vec<(i64, u8)> {
    let mut out = Vec::new();
    for _ in 0..blocks {
        let range = graph.process_block();
        for event in graph.output(node).unwrap().midi {
            out.push((
                range.start + i64::from(event.sample_offset),
                event.message.bytes()[1],
            ));
        }
    }
    out
}

fn note(n: u8) -> MidiMessage {
    MidiMessage::note_on(0, n, 100)
}

// ============================================================================
// 1. Latency node
// ============================================================================

#[test]
fn latency_node_d64_b64_first_block_silent_second_is_input() {
    let mut graph = NodeGraph::new();
    let src = graph.add(BufferNode::new(vec![ramp(128)])).unwrap();
    let delayed = graph.add(LatencyNode::new(Input::owned(src), 64)).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    graph.process_block();
    assert_eq!(graph.output(delayed).unwrap().audio.channel(0), &[0.0; 64]);

    graph.process_block();
    assert_eq!(
        graph.output(delayed).unwrap().audio.channel(0),
        ramp(64).as_slice()
    );
}

#[test]
fn latency_node_short_and_long_delays_shift_audio_exactly() {
    for (delay, block) in [(10, 64), (64, 64), (150, 64), (1, 1), (7, 3)] {
        let len = delay + block * 4;
        let mut graph = NodeGraph::new();
        let src = graph.add(BufferNode::new(vec![ramp(len)])).unwrap();
        let delayed = graph.add(LatencyNode::new(Input::owned(src), delay)).unwrap();
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, block)).unwrap();

        let blocks = len.div_ceil(block);
        let out = render_channel(&mut graph, delayed, 0, blocks);
        for (t, &sample) in out.iter().enumerate().take(len) {
            let expected = if t < delay { 0.0 } else { (t - delay + 1) as f32 };
            assert_eq!(sample, expected, "delay={delay} block={block} t={t}");
        }
        assert_eq!(graph.properties(delayed).unwrap().latency_samples, delay);
    }
}

#[test]
fn latency_node_midi_shorter_than_block() {
    let mut graph = NodeGraph::new();
    let seq = graph
        .add(MidiSequenceNode::new(vec![(5, note(1)), (60, note(2)), (63, note(3))]))
        .unwrap();
    let delayed = graph.add(LatencyNode::new(Input::owned(seq), 10)).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let events = render_midi(&mut graph, delayed, 3);
    assert_eq!(events, vec![(15, 1), (70, 2), (73, 3)]);
}

#[test]
fn latency_node_midi_longer_than_block() {
    let mut graph = NodeGraph::new();
    let seq = graph
        .add(MidiSequenceNode::new(vec![
            (0, note(1)),
            (30, note(2)),
            (30, note(3)),
            (100, note(4)),
        ]))
        .unwrap();
    let delayed = graph.add(LatencyNode::new(Input::owned(seq), 150)).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let events = render_midi(&mut graph, delayed, 6);
    assert_eq!(events, vec![(150, 1), (180, 2), (180, 3), (250, 4)]);
}

// ============================================================================
// 2. Summing and alignment
// ============================================================================

#[test]
fn summing_two_channel_and_mono() {
    let mut graph = NodeGraph::new();
    let stereo = graph
        .add(BufferNode::new(vec![vec![1.0; 64], vec![2.0; 64]]))
        .unwrap();
    let mono = graph.add(BufferNode::new(vec![vec![0.5; 64]])).unwrap();
    let sum = graph.add(SummingNode::owned(&[stereo, mono])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 32)).unwrap();

    assert_eq!(graph.properties(sum).unwrap().num_channels, 2);
    graph.process_block();
    let out = graph.output(sum).unwrap();
    assert_eq!(out.audio.num_channels(), 2);
    assert_eq!(out.audio.channel(0), &[1.5; 32]);
    assert_eq!(out.audio.channel(1), &[2.0; 32]);
}

#[test]
fn summing_concatenates_midi() {
    let mut graph = NodeGraph::new();
    let a = graph.add(MidiSequenceNode::new(vec![(4, note(1))])).unwrap();
    let b = graph.add(MidiSequenceNode::new(vec![(2, note(2))])).unwrap();
    let sum = graph.add(SummingNode::owned(&[a, b])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 16)).unwrap();

    assert_eq!(render_midi(&mut graph, sum, 1), vec![(4, 1), (2, 2)]);
}

#[test]
fn summing_many_dense_midi_inputs_keeps_every_event() {
    let mut graph = NodeGraph::new();
    let a = graph
        .add(MidiSequenceNode::new(vec![(0, note(1)); 300]))
        .unwrap();
    let b = graph
        .add(MidiSequenceNode::new(vec![(0, note(2)); 300]))
        .unwrap();
    let sum = graph.add(SummingNode::owned(&[a, b])).unwrap();
    let delayed = graph.add(LatencyNode::new(Input::owned(sum), 100)).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let capacity = graph.output(sum).unwrap().midi.capacity();
    assert!(capacity >= 600);
    graph.process_block();
    let out = graph.output(sum).unwrap().midi;
    assert_eq!(out.len(), 600);
    assert_eq!(out.capacity(), capacity);
    assert!(out.iter().take(300).all(|e| e.message == note(1)));
    assert!(out.iter().skip(300).all(|e| e.message == note(2)));

    // 100 samples later, every event comes out of the delay in one block.
    let events = render_midi(&mut graph, delayed, 2);
    assert_eq!(events.len(), 600);
    assert!(events.iter().all(|&(time, _)| time == 100));
}

#[test]
fn alignment_equalises_direct_input_latency() {
    let mut graph = NodeGraph::new();
    let fast = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let slow_src = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let slow = graph.add(LatencyNode::new(Input::owned(slow_src), 30)).unwrap();
    let sum = graph.add(SummingNode::owned(&[fast, slow])).unwrap();

    assert_eq!(graph.latency_plan().len(), 1);
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let inputs = graph.direct_inputs(sum).unwrap();
    assert_eq!(inputs.len(), 2);
    for input in &inputs {
        assert_eq!(graph.properties(*input).unwrap().latency_samples, 30);
    }

    // Owned edge: sum -> wrapper -> original.
    let wrapper = inputs[0];
    assert_ne!(wrapper, fast);
    assert_eq!(graph.node_name(wrapper).unwrap(), "latency");
    assert_eq!(graph.owner(wrapper).unwrap(), Some(sum));
    assert_eq!(graph.owner(fast).unwrap(), Some(wrapper));
    assert!(graph.inputs(sum).unwrap().iter().all(|i| i.is_owned()));

    let out = render_channel(&mut graph, sum, 0, 2);
    for (t, &sample) in out.iter().enumerate() {
        let expected = if t == 30 { 2.0 } else { 0.0 };
        assert_eq!(sample, expected, "t={t}");
    }
}

#[test]
fn alignment_wraps_shared_edge_without_taking_ownership() {
    let mut graph = NodeGraph::new();
    let src = graph.add(BufferNode::new(vec![impulse(128, 3)])).unwrap();
    let slow = graph.add(LatencyNode::new(Input::shared(src), 20)).unwrap();
    let sum = graph
        .add(SummingNode::new(vec![Input::shared(src), Input::owned(slow)]))
        .unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let edges = graph.inputs(sum).unwrap().to_vec();
    assert!(edges[0].is_owned());
    let wrapper = edges[0].node;
    assert_eq!(graph.inputs(wrapper).unwrap(), &[Input::shared(src)]);
    assert_eq!(graph.owner(src).unwrap(), None);
    assert_eq!(graph.owner(wrapper).unwrap(), Some(sum));

    let out = render_channel(&mut graph, sum, 0, 1);
    assert_eq!(out[23], 2.0);
    assert_eq!(out.iter().filter(|&&s| s != 0.0).count(), 1);
}

#[test]
fn alignment_nested_summing_nodes() {
    let mut graph = NodeGraph::new();
    let a = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let b_src = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let b = graph.add(LatencyNode::new(Input::owned(b_src), 10)).unwrap();
    let inner = graph.add(SummingNode::owned(&[a, b])).unwrap();
    let c_src = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let c = graph.add(LatencyNode::new(Input::owned(c_src), 25)).unwrap();
    let d = graph.add(BufferNode::new(vec![impulse(256, 0)])).unwrap();
    let outer = graph.add(SummingNode::owned(&[inner, c, d])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 16)).unwrap();

    for sum in [inner, outer] {
        let latencies: Vec<usize> = graph
            .direct_inputs(sum)
            .unwrap()
            .iter()
            .map(|id| graph.properties(*id).unwrap().latency_samples)
            .collect();
        let max = *latencies.iter().max().unwrap();
        assert!(latencies.iter().all(|&l| l == max), "{latencies:?}");
    }
    assert_eq!(graph.properties(outer).unwrap().latency_samples, 25);

    let out = render_channel(&mut graph, outer, 0, 4);
    assert_eq!(out[25], 4.0);
    assert_eq!(out.iter().filter(|&&s| s != 0.0).count(), 1);
}

#[test]
fn alignment_delays_midi_with_audio() {
    let mut graph = NodeGraph::new();
    let midi = graph.add(MidiSequenceNode::new(vec![(2, note(9))])).unwrap();
    let audio_src = graph.add(SineNode::new(440.0, 0.1, 1)).unwrap();
    let audio = graph.add(LatencyNode::new(Input::owned(audio_src), 40)).unwrap();
    let sum = graph.add(SummingNode::owned(&[midi, audio])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 32)).unwrap();

    assert_eq!(render_midi(&mut graph, sum, 3), vec![(42, 9)]);
}

// ============================================================================
// 3. Scheduling and readiness
// ============================================================================

#[test]
fn processing_order_respects_inputs() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    let b_src = graph.add(SineNode::new(200.0, 0.1, 1)).unwrap();
    let b = graph.add(LatencyNode::new(Input::owned(b_src), 5)).unwrap();
    graph.add(SummingNode::owned(&[a, b])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 16)).unwrap();

    let order = graph.processing_order();
    assert_eq!(order.len(), graph.node_count());
    for (pos, id) in order.iter().enumerate() {
        for input in graph.direct_inputs(*id).unwrap() {
            let input_pos = order.iter().position(|n| *n == input).unwrap();
            assert!(input_pos < pos, "{input} must run before {id}");
        }
    }
}

#[test]
fn readiness_is_monotonic_within_block() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    let b_src = graph.add(SineNode::new(200.0, 0.1, 1)).unwrap();
    let b = graph.add(LatencyNode::new(Input::owned(b_src), 5)).unwrap();
    let sum = graph.add(SummingNode::owned(&[a, b])).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 16)).unwrap();

    for _ in 0..2 {
        graph.begin_block();
        assert!(!graph.is_ready(sum));
        assert!(!graph.process_node(sum));

        let mut became_ready = false;
        for id in graph.processing_order() {
            if id == sum {
                continue;
            }
            assert!(graph.process_node(id), "{id} should be ready in topo order");
            let ready = graph.is_ready(sum);
            assert!(!(became_ready && !ready), "readiness regressed");
            became_ready |= ready;
        }
        assert!(graph.is_ready(sum));
        assert!(graph.process_node(sum));
        assert!(graph.has_processed(sum));
        assert!(graph.is_ready(sum));
        // Already processed this block.
        assert!(!graph.process_node(sum));
    }
}

#[test]
fn block_ranges_advance_by_block_size() {
    let mut graph = NodeGraph::new();
    graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 128)).unwrap();
    assert_eq!(graph.process_block(), 0..128);
    assert_eq!(graph.process_block(), 128..256);
    assert_eq!(graph.position(), 256);
}

// ============================================================================
// 4. Graph building errors and removal
// ============================================================================

#[test]
fn owned_input_cannot_have_two_owners() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    let first = graph.add(LatencyNode::new(Input::owned(a), 1)).unwrap();
    let err = graph.add(LatencyNode::new(Input::owned(a), 1)).unwrap_err();
    assert_eq!(err, GraphError::AlreadyOwned { node: a, owner: first });

    let err = graph
        .add(SummingNode::new(vec![Input::owned(first), Input::owned(first)]))
        .unwrap_err();
    assert_eq!(err, GraphError::DuplicateOwnedInput(first));
    // The rejected node took no slot and no ownership.
    assert_eq!(graph.owner(first).unwrap(), None);

    // Shared edges are fine.
    graph.add(SummingNode::shared(&[a, a])).unwrap();
}

#[test]
fn missing_input_is_rejected() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    let lat = graph.add(LatencyNode::new(Input::owned(a), 1)).unwrap();
    graph.remove(lat).unwrap();
    let err = graph.add(LatencyNode::new(Input::shared(a), 1)).unwrap_err();
    assert_eq!(err, GraphError::NodeNotFound(a));
}

#[test]
fn remove_drops_owned_subtree() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    let b = graph.add(SineNode::new(200.0, 0.1, 1)).unwrap();
    let lat = graph.add(LatencyNode::new(Input::owned(a), 4)).unwrap();
    let sum = graph
        .add(SummingNode::new(vec![Input::owned(lat), Input::shared(b)]))
        .unwrap();
    assert_eq!(graph.roots(), vec![b, sum]);

    assert_eq!(
        graph.remove(lat),
        Err(GraphError::StillReferenced { node: lat, by: sum })
    );
    assert_eq!(
        graph.remove(b),
        Err(GraphError::StillReferenced { node: b, by: sum })
    );

    graph.remove(sum).unwrap();
    assert_eq!(graph.node_count(), 1);
    assert!(graph.contains(b));
    assert!(!graph.contains(a));
    assert!(!graph.contains(lat));
}

#[test]
fn prepare_errors() {
    let mut graph = NodeGraph::new();
    assert_eq!(
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)),
        Err(GraphError::EmptyGraph)
    );
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    assert_eq!(
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 0)),
        Err(GraphError::InvalidBlockSize(0))
    );
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();
    assert!(graph.is_prepared());
    assert_eq!(
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)),
        Err(GraphError::AlreadyPrepared)
    );
    assert_eq!(
        graph.add(SineNode::new(1.0, 0.1, 1)).unwrap_err(),
        GraphError::AlreadyPrepared
    );
    assert_eq!(graph.remove(a), Err(GraphError::AlreadyPrepared));
}

#[test]
fn unprepared_graph_has_no_output() {
    let mut graph = NodeGraph::new();
    let a = graph.add(SineNode::new(100.0, 0.1, 1)).unwrap();
    assert!(graph.output(a).is_none());
    assert!(!graph.process_node(a));
    assert!(graph.process_block().is_empty());
}

// ============================================================================
// 5. Shared meter passthrough
// ============================================================================

#[test]
fn meter_node_aliases_input_audio() {
    let registry = SinkRegistry::new();
    let mut graph = NodeGraph::new();
    let src = graph.add(BufferNode::new(vec![vec![0.5; 256]])).unwrap();
    let meter = graph
        .add(SharedLevelMeterNode::new(
            Input::owned(src),
            registry.acquire("track"),
        ))
        .unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    graph.process_block();
    let passthrough = graph.output(meter).unwrap().audio;
    let source = graph.output(src).unwrap().audio;
    assert!(std::ptr::eq(passthrough, source));
    assert_eq!(passthrough.channel(0), &[0.5; 64]);
    assert_eq!(graph.properties(meter).unwrap().num_channels, 1);
}

#[test]
fn meter_sums_concurrent_renders_and_releases_on_drop() {
    let registry = SinkRegistry::new();
    let reader = registry.acquire("track");

    let build = || {
        let mut graph = NodeGraph::new();
        let src = graph.add(BufferNode::new(vec![vec![0.25; 256]])).unwrap();
        graph
            .add(SharedLevelMeterNode::new(
                Input::owned(src),
                registry.acquire("track"),
            ))
            .unwrap();
        graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();
        graph
    };
    let mut first = build();
    let mut second = build();
    assert_eq!(registry.holders(&"track"), 3);

    first.process_block();
    second.process_block();
    assert_eq!(reader.peak(0), 0.0);

    // The next block's first prefetch publishes the summed block.
    first.process_block();
    assert!((reader.peak(0) - 0.5).abs() < 1e-6);
    assert!((reader.rms(0) - 0.5).abs() < 1e-6);

    drop(first);
    drop(second);
    assert_eq!(registry.holders(&"track"), 1);
    drop(reader);
    assert!(!registry.contains(&"track"));
}

// ============================================================================
// 6. Bridge
// ============================================================================

#[test]
fn live_midi_output_forwards_and_reports() {
    let (tx, mut rx) = bridge::channel::<LiveMidiEvent>(64);
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    rx.add_listener(move |e: &LiveMidiEvent| sink.lock().push(*e));

    let mut graph = NodeGraph::new();
    let seq = graph
        .add(MidiSequenceNode::new(vec![(3, note(1)), (40, note(2))]))
        .unwrap();
    let live = graph
        .add(LiveMidiOutputNode::new(Input::owned(seq), tx))
        .unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 32)).unwrap();

    let forwarded = render_midi(&mut graph, live, 2);
    assert_eq!(forwarded, vec![(3, 1), (40, 2)]);
    assert_eq!(rx.dispatch_pending(), 2);

    let positions: Vec<i64> = received.lock().iter().map(|e| e.sample_position).collect();
    assert_eq!(positions, vec![3, 40]);
    assert_eq!(received.lock()[1].message, note(2));
}

#[test]
fn bridge_delivers_every_item_exactly_once_across_threads() {
    const ITEMS: u32 = 20_000;
    let (tx, mut rx) = bridge::channel::<u32>(256);
    let received = Arc::new(Mutex::new(Vec::with_capacity(ITEMS as usize)));
    let sink = Arc::clone(&received);
    rx.add_listener(move |v: &u32| sink.lock().push(*v));

    let producer = thread::spawn(move || {
        for mut item in 0..ITEMS {
            while let Err(rejected) = tx.try_send(item) {
                item = rejected;
                thread::yield_now();
            }
        }
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    while received.lock().len() < ITEMS as usize && Instant::now() < deadline {
        rx.wait_and_dispatch(Duration::from_millis(5));
    }
    producer.join().unwrap();
    rx.dispatch_pending();

    assert_eq!(rx.dropped(), 0);
    let received = received.lock();
    assert_eq!(received.len(), ITEMS as usize);
    assert!(received.iter().copied().eq(0..ITEMS));
}

#[test]
fn graph_renders_on_another_thread_while_bridge_drains() {
    // Room for every event, however far the audio thread runs ahead.
    let (tx, mut rx) = bridge::channel::<LiveMidiEvent>(256);
    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    rx.add_listener(move |_: &LiveMidiEvent| *sink.lock() += 1);

    let events: Vec<(i64, MidiMessage)> = (0..200).map(|i| (i * 37, note(60))).collect();
    let mut graph = NodeGraph::new();
    let seq = graph.add(MidiSequenceNode::new(events)).unwrap();
    graph
        .add(LiveMidiOutputNode::new(Input::owned(seq), tx))
        .unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 64)).unwrap();

    let audio = thread::spawn(move || {
        for _ in 0..(200 * 37 / 64 + 1) {
            graph.process_block();
        }
    });

    let deadline = Instant::now() + Duration::from_secs(10);
    while *count.lock() < 200 && Instant::now() < deadline {
        rx.wait_and_dispatch(Duration::from_millis(5));
    }
    audio.join().unwrap();
    rx.dispatch_pending();
    assert_eq!(*count.lock(), 200);
    assert_eq!(rx.dropped(), 0);
}

#[test]
fn full_bridge_drops_reports_but_keeps_graph_midi() {
    let (tx, mut rx) = bridge::channel::<LiveMidiEvent>(4);
    let mut graph = NodeGraph::new();
    let seq = graph
        .add(MidiSequenceNode::new(vec![(0, note(1)); 10]))
        .unwrap();
    let live = graph
        .add(LiveMidiOutputNode::new(Input::owned(seq), tx))
        .unwrap();
    graph.prepare(PlaybackInfo::new(SAMPLE_RATE, 32)).unwrap();

    // Downstream nodes still see every event.
    assert_eq!(render_midi(&mut graph, live, 1).len(), 10);
    assert_eq!(rx.dispatch_pending(), 4);
    assert_eq!(rx.dropped(), 6);
}
