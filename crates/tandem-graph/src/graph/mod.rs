//! Block-based audio/MIDI processing graph.
//!
//! A graph is a DAG of [`Node`]s rendered one fixed-size block at a time.
//! Every node declares its direct inputs as [`Input`] edges, and every edge
//! carries an [`Ownership`] tag: each node has at most one owner, and nodes
//! nobody owns are the graph's roots (its outputs).
//!
//! # Lifecycle
//!
//! - **Build** on any non-real-time thread: [`NodeGraph::add()`] /
//!   [`NodeGraph::remove()`]. Inputs must exist before the nodes that consume
//!   them, so cycles cannot be expressed.
//! - **Prepare** once: [`NodeGraph::prepare()`] computes a [`LatencyPlan`],
//!   wraps every faster input of a summing node in a latency node, sorts the
//!   graph topologically, then prepares nodes bottom-up and allocates their
//!   buffers.
//! - **Process** on the audio thread: [`NodeGraph::process_block()`] runs each
//!   node exactly once per block as soon as its inputs are done.
//!
//! # Latency Compensation
//!
//! Each node reports `latency_samples` through its [`NodeProperties`]. Nodes
//! that return true from [`Node::aligns_input_latency()`] get their inputs
//! padded to the slowest input's latency, so parallel paths reconverge
//! sample-aligned. Both audio and MIDI are delayed.
//!
//! # Example
//!
//! ```rust
//! use tandem_graph::graph::{Input, NodeGraph, PlaybackInfo};
//! use tandem_graph::nodes::{LatencyNode, SineNode, SummingNode};
//!
//! let mut graph = NodeGraph::new();
//! let dry = graph.add(SineNode::new(440.0, 0.5, 2)).unwrap();
//! let tone = graph.add(SineNode::new(220.0, 0.5, 2)).unwrap();
//! let slow = graph.add(LatencyNode::new(Input::owned(tone), 64)).unwrap();
//! let mix = graph.add(SummingNode::owned(&[dry, slow])).unwrap();
//!
//! graph.prepare(PlaybackInfo::new(48000.0, 128)).unwrap();
//! graph.process_block();
//! assert_eq!(graph.properties(mix).unwrap().latency_samples, 64);
//! ```

pub mod buffer;
pub mod delay_line;
pub mod latency;
pub mod node;
mod processing;

pub use buffer::{
    AudioBlock, MIDI_BUFFER_CAPACITY, MidiBuffer, MidiEvent, MidiMessage, NodeBuffers,
};
pub use delay_line::DelayLine;
pub use latency::{LatencyPlan, Substitution};
pub use node::{
    Input, Node, NodeId, NodeOutput, NodeProperties, Optimisations, Ownership, PlaybackInfo,
    ProcessContext,
};
pub use processing::{GraphError, NodeGraph};
