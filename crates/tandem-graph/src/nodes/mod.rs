//! Concrete graph nodes.
//!
//! - [`LatencyNode`]: fixed delay, inserted by the graph for alignment
//! - [`SummingNode`]: mixes N latency-aligned inputs
//! - [`LiveMidiOutputNode`]: passthrough that reports MIDI over a bridge
//! - [`SharedLevelMeterNode`]: aliasing passthrough feeding a shared meter
//! - [`SineNode`], [`BufferNode`], [`MidiSequenceNode`]: sources

mod latency;
mod level_meter;
mod live_midi;
mod source;
mod summing;

pub use latency::LatencyNode;
pub use level_meter::SharedLevelMeterNode;
pub use live_midi::{LiveMidiEvent, LiveMidiOutputNode};
pub use source::{BufferNode, MidiSequenceNode, SineNode};
pub use summing::SummingNode;
