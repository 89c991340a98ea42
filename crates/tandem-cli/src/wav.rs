//! Multichannel WAV reading and writing.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Reads a WAV file into one `Vec` per channel. Returns the channels and the
/// file's sample rate.
pub fn read_channels(path: &Path) -> Result<(Vec<Vec<f32>>, u32), hound::Error> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let num_channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let frames = interleaved.len() / num_channels;
    let mut channels = vec![Vec::with_capacity(frames); num_channels];
    for frame in interleaved.chunks_exact(num_channels) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    Ok((channels, spec.sample_rate))
}

/// Writes interleaved samples. 32 bits writes floats, 16 and 24 write
/// clamped integers.
pub fn write_interleaved(
    path: &Path,
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: if bits_per_sample == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };
    let mut writer = WavWriter::create(path, spec)?;

    if bits_per_sample == 32 {
        for &sample in samples {
            writer.write_sample(sample)?;
        }
    } else {
        let max_val = (1i32 << (bits_per_sample - 1)) as f32;
        for &sample in samples {
            let int_sample = (sample * max_val).clamp(-max_val, max_val - 1.0) as i32;
            writer.write_sample(int_sample)?;
        }
    }

    writer.finalize()
}
