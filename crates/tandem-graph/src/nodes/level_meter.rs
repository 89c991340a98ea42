//! Passthrough that feeds a shared level meter.

use core::hash::Hash;
use core::ops::Range;

use crate::graph::{Input, Node, NodeProperties, Optimisations, PlaybackInfo, ProcessContext};
use crate::meter::SinkHandle;

/// Forwards its input by aliasing and adds the audio to a shared
/// [`LevelMeter`](crate::meter::LevelMeter).
///
/// The node allocates no audio buffer of its own: readers of its output see
/// its input's block directly. MIDI is copied.
pub struct SharedLevelMeterNode<K: Eq + Hash> {
    inputs: [Input; 1],
    meter: SinkHandle<K>,
}

impl<K: Eq + Hash> SharedLevelMeterNode<K> {
    /// Creates the node over `input`, feeding `meter`.
    pub fn new(input: Input, meter: SinkHandle<K>) -> Self {
        Self {
            inputs: [input],
            meter,
        }
    }
}

impl<K: Eq + Hash + Send> Node for SharedLevelMeterNode<K> {
    fn name(&self) -> &'static str {
        "shared_level_meter"
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    fn properties(&self, inputs: &[NodeProperties]) -> NodeProperties {
        inputs.first().copied().unwrap_or_default()
    }

    fn prepare(&mut self, info: &PlaybackInfo, properties: &NodeProperties) {
        self.meter.set_size(properties.num_channels, info.block_size);
    }

    fn prefetch_block(&mut self, reference_range: Range<i64>) {
        self.meter.start_next_block(reference_range.start);
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let input = ctx.input(self.inputs[0].node);
        ctx.midi.copy_from(input.midi);
        self.meter.add_buffer(input.audio);
    }

    fn optimisations(&self) -> Optimisations {
        Optimisations::passthrough()
    }
}
