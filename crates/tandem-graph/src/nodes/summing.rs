//! N-input mixer.

use crate::graph::{
    Input, MIDI_BUFFER_CAPACITY, Node, NodeId, NodeProperties, PlaybackInfo, ProcessContext,
};

/// Adds the audio of all inputs and concatenates their MIDI.
///
/// The output has as many channels as the widest input; each input only
/// contributes the channels it has. Inputs are latency-aligned by the graph
/// before playback, so the sum is sample-accurate across paths.
pub struct SummingNode {
    inputs: Vec<Input>,
}

impl SummingNode {
    /// Creates a summing node over the given edges.
    pub fn new(inputs: Vec<Input>) -> Self {
        Self { inputs }
    }

    /// Creates a summing node that owns every input.
    pub fn owned(nodes: &[NodeId]) -> Self {
        Self::new(nodes.iter().copied().map(Input::owned).collect())
    }

    /// Creates a summing node that only references its inputs.
    pub fn shared(nodes: &[NodeId]) -> Self {
        Self::new(nodes.iter().copied().map(Input::shared).collect())
    }
}

impl Node for SummingNode {
    fn name(&self) -> &'static str {
        "summing"
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    fn properties(&self, inputs: &[NodeProperties]) -> NodeProperties {
        inputs
            .iter()
            .fold(NodeProperties::default(), |acc, p| NodeProperties {
                has_audio: acc.has_audio | p.has_audio,
                has_midi: acc.has_midi | p.has_midi,
                num_channels: acc.num_channels.max(p.num_channels),
                latency_samples: acc.latency_samples.max(p.latency_samples),
                node_id: 0,
            })
    }

    /// Every input's events can land in the same block.
    fn midi_capacity(&mut self, inputs: &[usize]) -> usize {
        inputs.iter().sum::<usize>().max(MIDI_BUFFER_CAPACITY)
    }

    fn prepare(&mut self, _info: &PlaybackInfo, _properties: &NodeProperties) {}

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        for input in &self.inputs {
            let source = ctx.input(input.node);
            let channels = source.audio.num_channels().min(ctx.audio.num_channels());
            ctx.audio.add_from(source.audio, channels);
            ctx.midi.extend_from(source.midi);
        }
    }

    fn aligns_input_latency(&self) -> bool {
        true
    }
}
