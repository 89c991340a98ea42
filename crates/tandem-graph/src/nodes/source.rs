//! Leaf nodes that generate audio or MIDI.

use core::f32::consts::TAU;

use crate::graph::{
    Input, MIDI_BUFFER_CAPACITY, MidiEvent, MidiMessage, Node, NodeProperties, PlaybackInfo,
    ProcessContext,
};

/// Sine test tone, the same signal on every channel.
pub struct SineNode {
    frequency: f32,
    gain: f32,
    num_channels: usize,
    node_id: u64,
    phase: f32,
    phase_inc: f32,
}

impl SineNode {
    /// Creates a tone at `frequency` Hz with linear `gain`.
    pub fn new(frequency: f32, gain: f32, num_channels: usize) -> Self {
        Self {
            frequency,
            gain,
            num_channels,
            node_id: 0,
            phase: 0.0,
            phase_inc: 0.0,
        }
    }

    /// Tags the node's properties with a caller-chosen identifier.
    pub fn with_node_id(mut self, node_id: u64) -> Self {
        self.node_id = node_id;
        self
    }
}

impl Node for SineNode {
    fn name(&self) -> &'static str {
        "sine"
    }

    fn inputs(&self) -> &[Input] {
        &[]
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut []
    }

    fn properties(&self, _inputs: &[NodeProperties]) -> NodeProperties {
        NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: self.num_channels,
            latency_samples: 0,
            node_id: self.node_id,
        }
    }

    fn prepare(&mut self, info: &PlaybackInfo, _properties: &NodeProperties) {
        self.phase = 0.0;
        self.phase_inc = self.frequency / info.sample_rate;
    }

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let frames = ctx.num_frames();
        let mut phase = self.phase;
        for i in 0..frames {
            let sample = self.gain * (TAU * phase).sin();
            for ch in 0..ctx.audio.num_channels() {
                ctx.audio.channel_mut(ch)[i] = sample;
            }
            phase += self.phase_inc;
            if phase >= 1.0 {
                phase -= 1.0;
            }
        }
        self.phase = phase;
    }
}

/// Plays a pre-loaded multichannel buffer from timeline sample 0, then silence.
pub struct BufferNode {
    channels: Vec<Vec<f32>>,
    node_id: u64,
}

impl BufferNode {
    /// Creates a player over per-channel sample vectors.
    pub fn new(channels: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            node_id: 0,
        }
    }

    /// Tags the node's properties with a caller-chosen identifier.
    pub fn with_node_id(mut self, node_id: u64) -> Self {
        self.node_id = node_id;
        self
    }

    /// Returns the length of the longest channel.
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Returns true if there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Node for BufferNode {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn inputs(&self) -> &[Input] {
        &[]
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut []
    }

    fn properties(&self, _inputs: &[NodeProperties]) -> NodeProperties {
        NodeProperties {
            has_audio: true,
            has_midi: false,
            num_channels: self.channels.len(),
            latency_samples: 0,
            node_id: self.node_id,
        }
    }

    fn prepare(&mut self, _info: &PlaybackInfo, _properties: &NodeProperties) {}

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let start = ctx.reference_range.start;
        for (ch, samples) in self.channels.iter().enumerate() {
            let out = ctx.audio.channel_mut(ch);
            for (i, dst) in out.iter_mut().enumerate() {
                let t = start + i as i64;
                *dst = usize::try_from(t)
                    .ok()
                    .and_then(|t| samples.get(t))
                    .copied()
                    .unwrap_or(0.0);
            }
        }
    }
}

/// Emits a fixed list of MIDI messages at absolute timeline samples.
pub struct MidiSequenceNode {
    /// Sorted by time, stable for equal times.
    events: Vec<(i64, MidiMessage)>,
    node_id: u64,
}

impl MidiSequenceNode {
    /// Creates a sequence. Events are sorted by time; equal times keep their order.
    pub fn new(mut events: Vec<(i64, MidiMessage)>) -> Self {
        events.sort_by_key(|(time, _)| *time);
        Self { events, node_id: 0 }
    }

    /// Tags the node's properties with a caller-chosen identifier.
    pub fn with_node_id(mut self, node_id: u64) -> Self {
        self.node_id = node_id;
        self
    }

    /// Returns the number of events in the sequence.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the sequence has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Node for MidiSequenceNode {
    fn name(&self) -> &'static str {
        "midi_sequence"
    }

    fn inputs(&self) -> &[Input] {
        &[]
    }

    fn inputs_mut(&mut self) -> &mut [Input] {
        &mut []
    }

    fn properties(&self, _inputs: &[NodeProperties]) -> NodeProperties {
        NodeProperties {
            has_audio: false,
            has_midi: true,
            num_channels: 0,
            latency_samples: 0,
            node_id: self.node_id,
        }
    }

    fn midi_capacity(&mut self, _inputs: &[usize]) -> usize {
        self.events.len().max(MIDI_BUFFER_CAPACITY)
    }

    fn prepare(&mut self, _info: &PlaybackInfo, _properties: &NodeProperties) {}

    fn process(&mut self, ctx: &mut ProcessContext<'_>) {
        let range = ctx.reference_range.clone();
        let first = self.events.partition_point(|(t, _)| *t < range.start);
        for &(time, message) in self.events[first..]
            .iter()
            .take_while(|(t, _)| *t < range.end)
        {
            ctx.midi.push(MidiEvent::new((time - range.start) as u32, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_properties() {
        let sine = SineNode::new(440.0, 0.5, 2).with_node_id(9);
        let p = sine.properties(&[]);
        assert!(p.has_audio);
        assert!(!p.has_midi);
        assert_eq!(p.num_channels, 2);
        assert_eq!(p.node_id, 9);
    }

    #[test]
    fn test_buffer_node_length() {
        let node = BufferNode::new(vec![vec![1.0; 3], vec![1.0; 5]]);
        assert_eq!(node.len(), 5);
        assert!(!node.is_empty());
        assert_eq!(node.properties(&[]).num_channels, 2);
        assert!(BufferNode::new(Vec::new()).is_empty());
    }

    #[test]
    fn test_midi_sequence_sorted_stably() {
        let a = MidiMessage::note_on(0, 60, 1);
        let b = MidiMessage::note_on(0, 61, 1);
        let c = MidiMessage::note_on(0, 62, 1);
        let seq = MidiSequenceNode::new(vec![(10, a), (5, b), (10, c)]);
        let order: Vec<MidiMessage> = seq.events.iter().map(|(_, m)| *m).collect();
        assert_eq!(order, vec![b, a, c]);
        assert!(seq.properties(&[]).has_midi);
    }

    #[test]
    fn test_midi_sequence_capacity_covers_every_event() {
        let note = MidiMessage::note_on(0, 60, 1);
        let mut dense = MidiSequenceNode::new(vec![(0, note); 2000]);
        assert_eq!(dense.midi_capacity(&[]), 2000);
        let mut sparse = MidiSequenceNode::new(vec![(0, note)]);
        assert_eq!(sparse.midi_capacity(&[]), MIDI_BUFFER_CAPACITY);
    }
}
