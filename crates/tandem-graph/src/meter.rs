//! Shared level-measuring sink.
//!
//! Several render instances of the same source (for example, the same track
//! playing into two outputs) feed one [`LevelMeter`]. Each block is tagged
//! with its start sample: the first caller to announce a new start publishes
//! the previous block's levels and resets the accumulator, and every caller
//! then adds its audio, so concurrent renders of the same block sum together.
//!
//! Published levels are plain atomics, readable from any thread without
//! touching the accumulator lock.
//!
//! Meters are looked up by key in a [`SinkRegistry`]. The registry hands out
//! [`SinkHandle`]s and keeps an explicit holder count per key; the entry is
//! removed the moment the last handle for it is dropped.

use std::collections::HashMap;
use std::hash::Hash;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::graph::AudioBlock;

/// Maximum number of channels a meter publishes levels for.
pub const MAX_METER_CHANNELS: usize = 8;

/// Level floor for dB conversion.
const SILENCE_DB: f32 = -120.0;

/// A thread-safe level readout using bit-cast f32.
#[derive(Debug, Default)]
struct AtomicLevel(AtomicU32);

impl AtomicLevel {
    #[inline]
    fn set(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Release);
    }

    #[inline]
    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

#[derive(Debug, Default)]
struct MeterState {
    accum: AudioBlock,
    /// Frames accumulated into the current block.
    frames: usize,
    block_start: Option<i64>,
}

/// Peak and RMS meter fed by one or more passthrough nodes.
#[derive(Debug, Default)]
pub struct LevelMeter {
    state: Mutex<MeterState>,
    peak: [AtomicLevel; MAX_METER_CHANNELS],
    rms: [AtomicLevel; MAX_METER_CHANNELS],
}

impl LevelMeter {
    /// Creates an empty meter. Call [`set_size()`](Self::set_size) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the accumulator. Growing is allowed at any time; a meter never
    /// shrinks, so renders with fewer channels can share it.
    pub fn set_size(&self, num_channels: usize, block_size: usize) {
        let mut state = self.state.lock();
        let channels = state.accum.num_channels().max(num_channels);
        let frames = state.accum.num_frames().max(block_size);
        if channels != state.accum.num_channels() || frames != state.accum.num_frames() {
            state.accum = AudioBlock::new(channels, frames);
            state.frames = 0;
        }
    }

    /// Announces the block starting at `start`.
    ///
    /// The first call with a new start publishes the previous block and clears
    /// the accumulator. Later calls with the same start do nothing.
    pub fn start_next_block(&self, start: i64) {
        let mut state = self.state.lock();
        if state.block_start == Some(start) {
            return;
        }
        if state.block_start.is_some() {
            self.publish(&state);
        }
        state.accum.clear();
        state.frames = 0;
        state.block_start = Some(start);
    }

    /// Sums `block` into the current block's accumulator.
    pub fn add_buffer(&self, block: &AudioBlock) {
        let mut state = self.state.lock();
        let channels = block.num_channels().min(state.accum.num_channels());
        state.accum.add_from(block, channels);
        let frames = block.num_frames().min(state.accum.num_frames());
        state.frames = state.frames.max(frames);
    }

    /// Publishes whatever has been accumulated so far and starts over.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if state.block_start.take().is_some() {
            self.publish(&state);
        }
        state.accum.clear();
        state.frames = 0;
    }

    /// Returns the number of channels the accumulator holds.
    pub fn num_channels(&self) -> usize {
        self.state.lock().accum.num_channels()
    }

    /// Returns the start sample of the block being accumulated.
    pub fn current_block_start(&self) -> Option<i64> {
        self.state.lock().block_start
    }

    /// Peak absolute sample of the last published block (linear).
    pub fn peak(&self, channel: usize) -> f32 {
        self.peak.get(channel).map_or(0.0, AtomicLevel::get)
    }

    /// RMS of the last published block (linear).
    pub fn rms(&self, channel: usize) -> f32 {
        self.rms.get(channel).map_or(0.0, AtomicLevel::get)
    }

    /// Peak of the last published block in dBFS.
    pub fn peak_db(&self, channel: usize) -> f32 {
        linear_to_db(self.peak(channel))
    }

    /// RMS of the last published block in dBFS.
    pub fn rms_db(&self, channel: usize) -> f32 {
        linear_to_db(self.rms(channel))
    }

    fn publish(&self, state: &MeterState) {
        let frames = state.frames;
        for ch in 0..state.accum.num_channels().min(MAX_METER_CHANNELS) {
            let samples = &state.accum.channel(ch)[..frames];
            let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            let rms = if frames == 0 {
                0.0
            } else {
                (samples.iter().map(|s| s * s).sum::<f32>() / frames as f32).sqrt()
            };
            self.peak[ch].set(peak);
            self.rms[ch].set(rms);
        }
    }
}

fn linear_to_db(v: f32) -> f32 {
    if v <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * v.log10()).max(SILENCE_DB)
    }
}

struct Entry {
    meter: Arc<LevelMeter>,
    holders: usize,
}

type Entries<K> = Mutex<HashMap<K, Entry>>;

/// Keyed store of shared meters.
///
/// Cloning the registry shares the same store.
pub struct SinkRegistry<K> {
    entries: Arc<Entries<K>>,
}

impl<K> Clone for SinkRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: Eq + Hash + Clone + Send> Default for SinkRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + Send> SinkRegistry<K> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the meter for `key`, creating it if this is the first holder.
    pub fn acquire(&self, key: K) -> SinkHandle<K> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry {
            meter: Arc::new(LevelMeter::new()),
            holders: 0,
        });
        entry.holders += 1;
        SinkHandle {
            meter: Arc::clone(&entry.meter),
            key,
            registry: Arc::downgrade(&self.entries),
        }
    }

    /// Returns true if any handle for `key` is alive.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Returns the number of live holders for `key`.
    pub fn holders(&self, key: &K) -> usize {
        self.entries.lock().get(key).map_or(0, |e| e.holders)
    }

    /// Returns the number of keys with live handles.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no meter is held.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// A counted reference to a shared [`LevelMeter`].
///
/// Cloning adds a holder; dropping removes one, and the last drop removes
/// the registry entry.
pub struct SinkHandle<K: Eq + Hash> {
    meter: Arc<LevelMeter>,
    key: K,
    registry: Weak<Entries<K>>,
}

impl<K: Eq + Hash> SinkHandle<K> {
    /// Returns the key this handle was acquired with.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + Clone> Clone for SinkHandle<K> {
    fn clone(&self) -> Self {
        if let Some(entries) = self.registry.upgrade()
            && let Some(entry) = entries.lock().get_mut(&self.key)
        {
            entry.holders += 1;
        }
        Self {
            meter: Arc::clone(&self.meter),
            key: self.key.clone(),
            registry: Weak::clone(&self.registry),
        }
    }
}

impl<K: Eq + Hash> Drop for SinkHandle<K> {
    fn drop(&mut self) {
        let Some(entries) = self.registry.upgrade() else {
            return;
        };
        let mut entries = entries.lock();
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.holders -= 1;
            if entry.holders == 0 {
                entries.remove(&self.key);
            }
        }
    }
}

impl<K: Eq + Hash> Deref for SinkHandle<K> {
    type Target = LevelMeter;

    fn deref(&self) -> &LevelMeter {
        &self.meter
    }
}
