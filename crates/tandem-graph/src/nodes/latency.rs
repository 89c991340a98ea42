//! Fixed delay on a single input.

use crate::graph::{
    DelayLine, Input, MIDI_BUFFER_CAPACITY, Node, NodeProperties, PlaybackInfo, ProcessContext,
};

/// Delays its input's audio and MIDI by a fixed number of samples.
///
/// The graph inserts these automatically to align summing inputs, but they
/// can also be added by hand to model a path with known latency.
pub struct LatencyNode {
    inputs: [Input; 1],
    delay_samples: usize,
    /// Most MIDI events the input delivers per block.
    input_midi_capacity: usize,
    delay_line: Option<DelayLine>,
}

impl LatencyNode {
    /// Wraps `input` with a delay of `delay_samples`.
    pub fn new(input: Input, delay_samples: usize) -> Self {
        Self {
            inputs: [input],
            delay_samples,
            input_midi_capacity: MIDI_BUFFER_CAPACITY,
            delay_line: None,
        }
    }

    /// Returns the delay this node adds.
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }
}

impl Node for LatencyNode {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    fn properties(&self, inputs: &[NodeProperties]) -> NodeProperties {
        let mut props = inputs.first().copied().unwrap_or_default();
        props.latency_samples += self.delay_samples;
        props
    }

    /// A released window straddles at most two input blocks.
    fn midi_capacity(&mut self, inputs: &[usize]) -> usize {
        self.input_midi_capacity = inputs
            .first()
            .copied()
            .unwrap_or(0)
            .max(MIDI_BUFFER_CAPACITY);
        2 * self.input_midi_capacity
    }

    fn prepare(&mut self, info: &PlaybackInfo, properties: &NodeProperties) {
        self.delay_line = Some(DelayLine::with_midi_per_block(
            properties.num_channels,
            self.delay_samples,
            info.block_size,
            self.input_midi_capacity,
        ));
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let Some(line) = self.delay_line.as_mut() else {
            debug_assert!(false, "latency node processed before prepare");
            return;
        };
        let input = ctx.input(self.inputs[0].node);

        line.write(input.audio);
        line.read(ctx.audio);

        line.push_midi(input.midi);
        line.release_midi(ctx.num_frames(), ctx.midi);
    }
}
