//! The node contract every graph element implements.
//!
//! Nodes live in the [`NodeGraph`](super::NodeGraph) arena and refer to each
//! other through [`NodeId`] handles. A node's direct inputs are [`Input`]
//! edges, each tagged with an [`Ownership`]: the graph uses the tags to decide
//! lifetimes and to transfer ownership when the latency pass wraps an input.

use core::ops::Range;

use super::buffer::{AudioBlock, MIDI_BUFFER_CAPACITY, MidiBuffer, NodeBuffers};

/// Unique identifier for a node in the processing graph.
///
/// Node IDs are assigned sequentially and never reused within a graph instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Who is responsible for an input's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The consuming node is the sole owner of the input.
    Owned,
    /// The input is owned elsewhere and only referenced here.
    Shared,
}

/// A directed edge from an input node into the node that holds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Input {
    /// The node whose output is consumed.
    pub node: NodeId,
    /// Whether the consumer owns that node.
    pub ownership: Ownership,
}

impl Input {
    /// An owning edge to `node`.
    pub fn owned(node: NodeId) -> Self {
        Self {
            node,
            ownership: Ownership::Owned,
        }
    }

    /// A non-owning edge to `node`.
    pub fn shared(node: NodeId) -> Self {
        Self {
            node,
            ownership: Ownership::Shared,
        }
    }

    /// Returns true for an owning edge.
    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }
}

/// Summary of a node's subgraph.
///
/// Properties are computed on demand from the node's inputs and are only
/// valid at the point they are queried.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeProperties {
    /// The node produces audio.
    pub has_audio: bool,
    /// The node produces MIDI.
    pub has_midi: bool,
    /// Number of audio channels in the node's output.
    pub num_channels: usize,
    /// Delay the subgraph adds, in samples.
    pub latency_samples: usize,
    /// Caller-assigned identifier, 0 when unset.
    pub node_id: u64,
}

/// Playback parameters shared by every node at prepare time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackInfo {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Samples per processing block.
    pub block_size: usize,
}

impl PlaybackInfo {
    /// Creates playback info.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
        }
    }
}

/// Buffer handling a node asks of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Optimisations {
    /// Allocate a private audio output. When false the node's audio output
    /// aliases its first input's audio.
    pub allocate_audio_buffer: bool,
    /// Zero the node's output buffers before each `process` call.
    pub clear_buffers: bool,
}

impl Optimisations {
    /// Settings for a node that forwards its input audio untouched.
    pub fn passthrough() -> Self {
        Self {
            allocate_audio_buffer: false,
            clear_buffers: false,
        }
    }
}

impl Default for Optimisations {
    fn default() -> Self {
        Self {
            allocate_audio_buffer: true,
            clear_buffers: true,
        }
    }
}

/// Read-only view of a node's output for the current block.
#[derive(Clone, Copy)]
pub struct NodeOutput<'a> {
    /// Audio output.
    pub audio: &'a AudioBlock,
    /// MIDI output.
    pub midi: &'a MidiBuffer,
}

/// Everything a node sees during one `process` call.
///
/// The node writes into [`audio`](Self::audio) and [`midi`](Self::midi) and
/// reads its inputs through [`input()`](Self::input).
pub struct ProcessContext<'a> {
    /// This node's audio output.
    pub audio: &'a mut AudioBlock,
    /// This node's MIDI output.
    pub midi: &'a mut MidiBuffer,
    /// Timeline sample range covered by this block.
    pub reference_range: Range<i64>,
    pub(crate) outputs: &'a [NodeBuffers],
    pub(crate) audio_source: &'a [usize],
}

impl<'a> ProcessContext<'a> {
    /// Returns the current-block output of one of this node's inputs.
    ///
    /// The scheduler guarantees the input has already been processed. The
    /// returned view does not borrow the context, so a node can hold it while
    /// writing its own output.
    #[inline]
    pub fn input(&self, id: NodeId) -> NodeOutput<'a> {
        let idx = id.0 as usize;
        let outputs: &'a [NodeBuffers] = self.outputs;
        NodeOutput {
            audio: &outputs[self.audio_source[idx]].audio,
            midi: &outputs[idx].midi,
        }
    }

    /// Returns the number of samples in this block.
    #[inline]
    pub fn num_frames(&self) -> usize {
        (self.reference_range.end - self.reference_range.start) as usize
    }
}

/// A unit of the processing graph.
///
/// The graph calls [`prepare()`](Self::prepare) once before playback, then
/// [`prefetch_block()`](Self::prefetch_block) and [`process()`](Self::process)
/// once per block, the latter only when [`is_ready()`](Self::is_ready) holds.
///
/// `process` runs on the audio thread: it must not allocate, block, or take a
/// contended lock.
pub trait Node: Send {
    /// Short static name used in logs.
    fn name(&self) -> &'static str;

    /// Direct inputs, in order.
    fn inputs(&self) -> &[Input];

    /// Direct inputs, mutably. Only the graph's latency pass rewrites edges.
    fn inputs_mut(&mut self) -> &mut [Input];

    /// Computes this node's properties from its direct inputs' properties
    /// (same order as [`inputs()`](Self::inputs)).
    fn properties(&self, inputs: &[NodeProperties]) -> NodeProperties;

    /// True when every direct input has produced its current-block output.
    fn is_ready(&self, processed: &dyn Fn(NodeId) -> bool) -> bool {
        self.inputs().iter().all(|input| processed(input.node))
    }

    /// Sizes this node's MIDI output for one block.
    ///
    /// `inputs` holds the per-block MIDI capacity of each direct input, in
    /// [`inputs()`](Self::inputs) order. Called once during graph
    /// preparation, before [`prepare()`](Self::prepare); nodes that queue
    /// MIDI internally size their queues here. The default fits a node that
    /// forwards or generates at most one input's worth of events.
    fn midi_capacity(&mut self, inputs: &[usize]) -> usize {
        inputs
            .iter()
            .copied()
            .max()
            .unwrap_or(0)
            .max(MIDI_BUFFER_CAPACITY)
    }

    /// Allocates steady-state resources. `properties` are this node's own.
    fn prepare(&mut self, info: &PlaybackInfo, properties: &NodeProperties);

    /// Called for every node before any node processes the block.
    fn prefetch_block(&mut self, _reference_range: Range<i64>) {}

    /// Renders one block.
    fn process(&mut self, ctx: &mut ProcessContext<'_>);

    /// Buffer handling this node wants from the scheduler.
    fn optimisations(&self) -> Optimisations {
        Optimisations::default()
    }

    /// True for nodes whose inputs must be latency-aligned before processing.
    fn aligns_input_latency(&self) -> bool {
        false
    }
}
