//! Audio and MIDI block buffers for the processing graph.
//!
//! Every node writes one [`AudioBlock`] and one [`MidiBuffer`] per block. Both
//! are sized during [`NodeGraph::prepare()`](super::NodeGraph::prepare) and
//! never grow afterwards, so the audio thread only ever overwrites memory that
//! already exists.

/// Minimum number of MIDI events a node buffer holds without reallocating.
///
/// Nodes that merge several inputs reserve more; see
/// [`Node::midi_capacity()`](super::Node::midi_capacity).
pub const MIDI_BUFFER_CAPACITY: usize = 512;

/// A multichannel block of audio samples.
///
/// Channels are stored back to back in one allocation (`channel * frames +
/// frame`). The channel count and frame count are fixed when the block is
/// created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBlock {
    data: Vec<f32>,
    num_channels: usize,
    num_frames: usize,
}

impl AudioBlock {
    /// Creates a zeroed block with the given shape.
    pub fn new(num_channels: usize, num_frames: usize) -> Self {
        Self {
            data: vec![0.0; num_channels * num_frames],
            num_channels,
            num_frames,
        }
    }

    /// Builds a block from per-channel sample vectors.
    ///
    /// All channels are truncated to the shortest one.
    pub fn from_channels(channels: &[Vec<f32>]) -> Self {
        let num_frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut block = Self::new(channels.len(), num_frames);
        for (ch, samples) in channels.iter().enumerate() {
            block.channel_mut(ch).copy_from_slice(&samples[..num_frames]);
        }
        block
    }

    /// Returns the number of channels.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Returns the number of samples per channel.
    #[inline]
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    /// Returns true if the block holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns one channel's samples.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= num_channels()`.
    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        let start = ch * self.num_frames;
        &self.data[start..start + self.num_frames]
    }

    /// Returns one channel's samples mutably.
    ///
    /// # Panics
    ///
    /// Panics if `ch >= num_channels()`.
    #[inline]
    pub fn channel_mut(&mut self, ch: usize) -> &mut [f32] {
        let start = ch * self.num_frames;
        &mut self.data[start..start + self.num_frames]
    }

    /// Fills every channel with zeros.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Copies `other` into this block.
    ///
    /// Only the channels and frames both blocks have are copied; anything
    /// beyond that is left as it was.
    pub fn copy_from(&mut self, other: &AudioBlock) {
        let frames = self.num_frames.min(other.num_frames);
        for ch in 0..self.num_channels.min(other.num_channels) {
            self.channel_mut(ch)[..frames].copy_from_slice(&other.channel(ch)[..frames]);
        }
    }

    /// Adds the first `num_channels` channels of `other` into this block.
    ///
    /// Channels at or above `num_channels` are neither read nor written.
    pub fn add_from(&mut self, other: &AudioBlock, num_channels: usize) {
        debug_assert!(num_channels <= self.num_channels && num_channels <= other.num_channels);
        let frames = self.num_frames.min(other.num_frames);
        for ch in 0..num_channels {
            for (dst, src) in self.channel_mut(ch)[..frames]
                .iter_mut()
                .zip(&other.channel(ch)[..frames])
            {
                *dst += *src;
            }
        }
    }

    /// Returns a copy of each channel as its own vector.
    pub fn to_channels(&self) -> Vec<Vec<f32>> {
        (0..self.num_channels)
            .map(|ch| self.channel(ch).to_vec())
            .collect()
    }
}

/// A raw MIDI message of up to three bytes, stored inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MidiMessage {
    bytes: [u8; 3],
    len: u8,
}

impl MidiMessage {
    /// Creates a message from raw bytes. Anything past the third byte is ignored.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(3);
        let mut data = [0u8; 3];
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            bytes: data,
            len: len as u8,
        }
    }

    /// Note-on on the given channel (0-15).
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::from_bytes(&[0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f])
    }

    /// Note-off on the given channel (0-15).
    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::from_bytes(&[0x80 | (channel & 0x0f), note & 0x7f, 0])
    }

    /// Control change on the given channel (0-15).
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::from_bytes(&[0xb0 | (channel & 0x0f), controller & 0x7f, value & 0x7f])
    }

    /// Returns the message bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Returns the status byte, or 0 for an empty message.
    pub fn status(&self) -> u8 {
        if self.len == 0 { 0 } else { self.bytes[0] }
    }
}

/// A MIDI message positioned within a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    /// Offset of the event from the start of the block, in samples.
    pub sample_offset: u32,
    /// The message itself.
    pub message: MidiMessage,
}

impl MidiEvent {
    /// Creates an event at the given block offset.
    pub fn new(sample_offset: u32, message: MidiMessage) -> Self {
        Self {
            sample_offset,
            message,
        }
    }
}

/// Ordered list of MIDI events for one block.
///
/// Capacity is reserved up front; pushing past it is a sizing bug and is
/// caught by a debug assertion rather than silently dropping the event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

impl MidiBuffer {
    /// Creates an empty buffer with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    /// Appends one event.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) {
        debug_assert!(
            self.events.len() < self.events.capacity(),
            "MIDI buffer capacity {} exceeded",
            self.events.capacity()
        );
        self.events.push(event);
    }

    /// Appends every event of `other`, keeping their order.
    pub fn extend_from(&mut self, other: &MidiBuffer) {
        for event in &other.events {
            self.push(*event);
        }
    }

    /// Replaces the contents with those of `other`.
    pub fn copy_from(&mut self, other: &MidiBuffer) {
        self.events.clear();
        self.extend_from(other);
    }

    /// Removes all events, keeping the allocation.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if there are no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events the buffer holds without reallocating.
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    /// Iterates over the events in order.
    pub fn iter(&self) -> core::slice::Iter<'_, MidiEvent> {
        self.events.iter()
    }

    /// Returns the events as a slice.
    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }
}

impl<'a> IntoIterator for &'a MidiBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = core::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// The audio and MIDI output a node produces each block.
#[derive(Debug, Default)]
pub struct NodeBuffers {
    /// Audio output. Empty for nodes that alias their input's audio.
    pub audio: AudioBlock,
    /// MIDI output.
    pub midi: MidiBuffer,
}

impl NodeBuffers {
    /// Allocates buffers for one node.
    pub fn new(num_channels: usize, block_size: usize, midi_capacity: usize) -> Self {
        Self {
            audio: AudioBlock::new(num_channels, block_size),
            midi: MidiBuffer::with_capacity(midi_capacity),
        }
    }
}
