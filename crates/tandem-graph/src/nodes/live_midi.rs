//! Passthrough that reports MIDI to the message thread.

use crate::bridge::BridgeSender;
use crate::graph::{Input, MidiMessage, Node, NodeProperties, PlaybackInfo, ProcessContext};

/// A MIDI message observed on the audio thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LiveMidiEvent {
    /// The message.
    pub message: MidiMessage,
    /// Timeline sample the message plays at.
    pub sample_position: i64,
}

/// Forwards its input unchanged and sends every MIDI event it sees to a
/// [`BridgeReceiver`](crate::bridge::BridgeReceiver).
pub struct LiveMidiOutputNode {
    inputs: [Input; 1],
    sender: BridgeSender<LiveMidiEvent>,
}

impl LiveMidiOutputNode {
    /// Creates the node over `input`, reporting through `sender`.
    pub fn new(input: Input, sender: BridgeSender<LiveMidiEvent>) -> Self {
        Self {
            inputs: [input],
            sender,
        }
    }
}

impl Node for LiveMidiOutputNode {
    fn name(&self) -> &'static str {
        "live_midi_output"
    }

    fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut self.inputs
    }

    fn properties(&self, inputs: &[NodeProperties]) -> NodeProperties {
        NodeProperties {
            node_id: 0,
            ..inputs.first().copied().unwrap_or_default()
        }
    }

    fn prepare(&mut self, _info: &PlaybackInfo, _properties: &NodeProperties) {}

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let input = ctx.input(self.inputs[0].node);
        ctx.audio.copy_from(input.audio);
        ctx.midi.copy_from(input.midi);

        if input.midi.is_empty() {
            return;
        }
        let start = ctx.reference_range.start;
        self.sender.send_all(input.midi.iter().map(|event| LiveMidiEvent {
            message: event.message,
            sample_position: start + i64::from(event.sample_offset),
        }));
    }
}
