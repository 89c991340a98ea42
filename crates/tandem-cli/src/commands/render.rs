//! Graph rendering command.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tandem_graph::meter::MAX_METER_CHANNELS;
use tandem_graph::{LiveMidiEvent, PlaybackInfo, SinkHandle, SinkRegistry};

use crate::config::RenderConfig;
use crate::wav;

#[derive(Args)]
pub struct RenderArgs {
    /// Render description (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Override the duration in seconds
    #[arg(long)]
    duration: Option<f32>,

    /// Override the block size in samples
    #[arg(long)]
    block_size: Option<usize>,

    /// Output bit depth: 16, 24, or 32 (float)
    #[arg(long, default_value = "32", value_parser = parse_bit_depth)]
    bits: u16,

    /// Hide the progress bar
    #[arg(long, short)]
    quiet: bool,
}

fn parse_bit_depth(s: &str) -> Result<u16, String> {
    match s.parse::<u16>() {
        Ok(bits @ (16 | 24 | 32)) => Ok(bits),
        _ => Err(format!("unsupported bit depth '{s}' (expected 16, 24 or 32)")),
    }
}

/// Floor of the meter report, in dBFS.
const REPORT_FLOOR_DB: f32 = -120.0;

/// Loudest block seen by one meter, in dBFS.
struct MeterReport {
    name: String,
    peak: [f32; MAX_METER_CHANNELS],
    rms: [f32; MAX_METER_CHANNELS],
    channels: usize,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut config = RenderConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(duration) = args.duration {
        config.duration = duration;
    }
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    config.validate()?;

    let base_dir = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let registry = SinkRegistry::new();
    let mut built = config.build(&base_dir, &registry)?;
    built
        .graph
        .prepare(PlaybackInfo::new(config.sample_rate as f32, config.block_size))?;

    let properties = built.graph.properties(built.output)?;
    if !properties.has_audio || properties.num_channels == 0 {
        anyhow::bail!("output node '{}' produces no audio", config.output);
    }
    let channels = properties.num_channels;
    if properties.latency_samples > 0 {
        println!(
            "Output latency: {} samples ({:.2} ms)",
            properties.latency_samples,
            properties.latency_samples as f32 * 1000.0 / config.sample_rate as f32
        );
    }

    let midi_count = Arc::new(AtomicUsize::new(0));
    if let Some(receiver) = built.midi.as_mut() {
        let count = Arc::clone(&midi_count);
        receiver.add_listener(move |event: &LiveMidiEvent| {
            count.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                position = event.sample_position,
                bytes = ?event.message.bytes(),
                "midi out"
            );
        });
    }

    let mut reports: Vec<MeterReport> = built
        .meters
        .iter()
        .map(|(name, meter)| MeterReport {
            name: name.clone(),
            peak: [REPORT_FLOOR_DB; MAX_METER_CHANNELS],
            rms: [REPORT_FLOOR_DB; MAX_METER_CHANNELS],
            channels: meter.num_channels().min(MAX_METER_CHANNELS),
        })
        .collect();

    let total_frames = config.total_frames();
    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(total_frames as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("##-"),
    );

    let mut interleaved = Vec::with_capacity(total_frames * channels);
    let mut rendered = 0;
    while rendered < total_frames {
        built.graph.process_block();
        let frames = (total_frames - rendered).min(config.block_size);
        if let Some(out) = built.graph.output(built.output) {
            for i in 0..frames {
                for ch in 0..channels {
                    interleaved.push(out.audio.channel(ch)[i]);
                }
            }
        }
        if let Some(receiver) = built.midi.as_mut() {
            receiver.dispatch_pending();
        }
        collect_levels(&built.meters, &mut reports);
        rendered += frames;
        pb.set_position(rendered as u64);
    }
    pb.finish_and_clear();

    for meter in built.meters.values() {
        meter.flush();
    }
    collect_levels(&built.meters, &mut reports);

    let channel_count = u16::try_from(channels).context("too many output channels")?;
    wav::write_interleaved(
        &args.output,
        &interleaved,
        channel_count,
        config.sample_rate,
        args.bits,
    )
    .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Rendered {} frames x {} channels to {}",
        total_frames,
        channels,
        args.output.display()
    );
    for report in &reports {
        for ch in 0..report.channels {
            println!(
                "  meter {} ch{}: peak {:.1} dBFS, rms {:.1} dBFS",
                report.name,
                ch,
                report.peak[ch],
                report.rms[ch]
            );
        }
    }
    if let Some(receiver) = &built.midi {
        println!("  MIDI events: {}", midi_count.load(Ordering::Relaxed));
        let dropped = receiver.dropped();
        if dropped > 0 {
            tracing::warn!(dropped, "live MIDI bridge overflowed");
            println!("  MIDI events dropped: {dropped}");
        }
    }
    tracing::info!(frames = total_frames, channels, "render complete");
    Ok(())
}

/// Folds the levels published since the last call into `reports`.
fn collect_levels(meters: &BTreeMap<String, SinkHandle<String>>, reports: &mut [MeterReport]) {
    for (report, meter) in reports.iter_mut().zip(meters.values()) {
        report.channels = report.channels.max(meter.num_channels().min(MAX_METER_CHANNELS));
        for ch in 0..report.channels {
            report.peak[ch] = report.peak[ch].max(meter.peak_db(ch));
            report.rms[ch] = report.rms[ch].max(meter.rms_db(ch));
        }
    }
}
