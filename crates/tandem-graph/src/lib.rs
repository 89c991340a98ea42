//! Tandem Graph - block-based audio/MIDI processing graph
//!
//! This crate renders a DAG of processing nodes one fixed-size block at a
//! time, with automatic latency compensation wherever parallel paths are
//! merged.
//!
//! # Modules
//!
//! - [`graph`] - node contract, arena, scheduler, latency alignment
//! - [`nodes`] - latency, summing, passthrough and source nodes
//! - [`bridge`] - audio thread to message thread delivery
//! - [`meter`] - level meter shared between render instances
//!
//! # Threading
//!
//! Graphs are built and prepared on a non-real-time thread, then moved to
//! the audio thread. Nothing on the processing path allocates or waits on a
//! contended lock; results reach other threads through [`bridge`] or the
//! atomics of a [`meter::LevelMeter`].
//!
//! # Logging
//!
//! Enable the `tracing` feature to log graph edits and preparation at
//! `debug` level. Nothing is logged from `process`.

pub mod bridge;
pub mod graph;
pub mod meter;
pub mod nodes;

pub use bridge::{BridgeListener, BridgeReceiver, BridgeSender, ListenerId};
pub use graph::{
    AudioBlock, DelayLine, GraphError, Input, LatencyPlan, MidiBuffer, MidiEvent, MidiMessage,
    Node, NodeGraph, NodeId, NodeProperties, Ownership, PlaybackInfo, ProcessContext,
    Substitution,
};
pub use meter::{LevelMeter, SinkHandle, SinkRegistry};
pub use nodes::{
    BufferNode, LatencyNode, LiveMidiEvent, LiveMidiOutputNode, MidiSequenceNode,
    SharedLevelMeterNode, SineNode, SummingNode,
};
