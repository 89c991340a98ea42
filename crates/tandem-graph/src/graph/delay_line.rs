//! Fixed-capacity delay line for latency compensation.
//!
//! A [`DelayLine`] is a multichannel audio FIFO plus a timestamped MIDI queue.
//! It is created with a fixed delay and block size and pre-filled with
//! `delay` samples of silence, so the first block read after creation always
//! succeeds. Each block writes exactly `block_size` samples and reads exactly
//! `block_size` samples, which keeps the backlog at `delay` forever.

use super::buffer::{AudioBlock, MIDI_BUFFER_CAPACITY, MidiBuffer, MidiEvent, MidiMessage};

/// A MIDI message waiting in the delay line.
#[derive(Clone, Copy, Debug)]
struct PendingMidi {
    /// Absolute sample (counted from the first processed block) the event is due at.
    due: u64,
    message: MidiMessage,
}

/// Multichannel audio ring buffer with a parallel MIDI queue.
///
/// The ring holds `delay + block_size + 1` samples per channel: one slot is
/// kept free so that a full buffer and an empty buffer are distinguishable.
pub struct DelayLine {
    samples: Vec<f32>,
    num_channels: usize,
    capacity: usize,
    read_pos: usize,
    write_pos: usize,
    num_ready: usize,
    delay_samples: usize,
    midi: Vec<PendingMidi>,
    /// Samples read so far; the start of the next block in absolute time.
    elapsed: u64,
}

impl DelayLine {
    /// Creates a delay line and pre-fills it with `delay_samples` of silence.
    ///
    /// The MIDI queue is sized for [`MIDI_BUFFER_CAPACITY`] events per block.
    pub fn new(num_channels: usize, delay_samples: usize, block_size: usize) -> Self {
        Self::with_midi_per_block(num_channels, delay_samples, block_size, MIDI_BUFFER_CAPACITY)
    }

    /// Creates a delay line whose MIDI queue holds `midi_per_block` incoming
    /// events for every block in flight.
    pub fn with_midi_per_block(
        num_channels: usize,
        delay_samples: usize,
        block_size: usize,
        midi_per_block: usize,
    ) -> Self {
        let capacity = delay_samples + block_size + 1;
        // Events can sit in the queue for `delay` samples plus one block.
        let blocks_in_flight = delay_samples / block_size.max(1) + 2;
        Self {
            samples: vec![0.0; num_channels * capacity],
            num_channels,
            capacity,
            read_pos: 0,
            write_pos: delay_samples % capacity,
            num_ready: delay_samples,
            delay_samples,
            midi: Vec::with_capacity(midi_per_block * blocks_in_flight),
            elapsed: 0,
        }
    }

    /// Returns the fixed delay in samples.
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Returns the number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Returns the ring size per channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of samples per channel ready to be read.
    pub fn num_ready(&self) -> usize {
        self.num_ready
    }

    /// Returns the number of samples per channel that can be written.
    pub fn free_space(&self) -> usize {
        self.capacity - 1 - self.num_ready
    }

    /// Returns the number of MIDI events waiting to be released.
    pub fn pending_midi(&self) -> usize {
        self.midi.len()
    }

    /// Returns the number of MIDI events the queue holds without reallocating.
    pub fn midi_queue_capacity(&self) -> usize {
        self.midi.capacity()
    }

    /// Appends a block of audio to the tail of the ring.
    pub fn write(&mut self, input: &AudioBlock) {
        let frames = input.num_frames();
        debug_assert_eq!(
            input.num_channels(),
            self.num_channels,
            "delay line channel count does not match its input"
        );
        debug_assert!(frames <= self.free_space(), "delay line overflow");

        for ch in 0..self.num_channels.min(input.num_channels()) {
            let ring = &mut self.samples[ch * self.capacity..(ch + 1) * self.capacity];
            let mut pos = self.write_pos;
            for &sample in input.channel(ch) {
                ring[pos] = sample;
                pos += 1;
                if pos == self.capacity {
                    pos = 0;
                }
            }
        }
        self.write_pos = (self.write_pos + frames) % self.capacity;
        self.num_ready += frames;
    }

    /// Reads `output.num_frames()` samples from the head of the ring into `output`.
    pub fn read(&mut self, output: &mut AudioBlock) {
        let frames = output.num_frames();
        debug_assert!(frames <= self.num_ready, "delay line underflow");

        for ch in 0..self.num_channels.min(output.num_channels()) {
            let ring = &self.samples[ch * self.capacity..(ch + 1) * self.capacity];
            let mut pos = self.read_pos;
            for out in output.channel_mut(ch) {
                *out = ring[pos];
                pos += 1;
                if pos == self.capacity {
                    pos = 0;
                }
            }
        }
        self.read_pos = (self.read_pos + frames) % self.capacity;
        self.num_ready -= frames;
    }

    /// Queues the events of the current input block, shifted by the delay.
    ///
    /// Must be called before [`release_midi()`](Self::release_midi) for the same block.
    pub fn push_midi(&mut self, events: &MidiBuffer) {
        for event in events {
            debug_assert!(self.midi.len() < self.midi.capacity(), "MIDI delay queue full");
            self.midi.push(PendingMidi {
                due: self.elapsed + u64::from(event.sample_offset) + self.delay_samples as u64,
                message: event.message,
            });
        }
    }

    /// Moves every queued event due inside the next `block_len` samples into
    /// `out`, in arrival order, and advances the block clock.
    pub fn release_midi(&mut self, block_len: usize, out: &mut MidiBuffer) {
        let start = self.elapsed;
        let end = start + block_len as u64;
        self.midi.retain(|pending| {
            if pending.due < end {
                out.push(MidiEvent::new((pending.due - start) as u32, pending.message));
                false
            } else {
                true
            }
        });
        self.elapsed = end;
    }

    /// Drops all audio and MIDI and restores the initial silence.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
        self.read_pos = 0;
        self.write_pos = self.delay_samples % self.capacity;
        self.num_ready = self.delay_samples;
        self.midi.clear();
        self.elapsed = 0;
    }
}
