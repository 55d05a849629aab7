//! Bandsplit Render - offline multiband render of a WAV file
//!
//! Usage:
//!
//! ```text
//! bandsplit-render <input.wav> <output.wav> [config.yaml] [--solo N]...
//! ```
//!
//! The crossover layout comes from the YAML config (defaults if omitted).
//! Each `--solo N` solos band N on top of the config's own solos. Output is
//! always 32-bit float at the input's sample rate.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use bandsplit_core::config::{load_config, CrossoverConfig};
use bandsplit_core::effect::CrossoverEngine;
use bandsplit_core::{AudioBuffer, MAX_CHANNELS};

struct Args {
    input: PathBuf,
    output: PathBuf,
    config: Option<PathBuf>,
    solo: Vec<usize>,
}

fn parse_args() -> Result<Args> {
    let mut positional = Vec::new();
    let mut solo = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--solo" {
            let value = args.next().context("--solo needs a band index")?;
            solo.push(
                value
                    .parse()
                    .with_context(|| format!("Invalid band index: {}", value))?,
            );
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    let mut positional = positional.into_iter();
    match (positional.next(), positional.next(), positional.next(), positional.next()) {
        (Some(input), Some(output), config, None) => Ok(Args {
            input,
            output,
            config,
            solo,
        }),
        _ => bail!("usage: bandsplit-render <input.wav> <output.wav> [config.yaml] [--solo N]..."),
    }
}

/// Read a WAV file as interleaved f32 samples
fn read_wav(path: &Path) -> Result<(WavSpec, Vec<f32>)> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open input WAV: {:?}", path))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to decode float samples")?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to decode integer samples")?
        }
    };
    Ok((spec, samples))
}

/// Drop a trailing partial frame left by a truncated file
fn whole_frames(mut samples: Vec<f32>, channels: usize) -> Vec<f32> {
    let partial = samples.len() % channels;
    if partial != 0 {
        log::warn!("Input ends with a partial frame, dropping {} sample(s)", partial);
        samples.truncate(samples.len() - partial);
    }
    samples
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let (spec, samples) = read_wav(&args.input)?;
    let channels = spec.channels as usize;
    if channels == 0 || channels > MAX_CHANNELS {
        bail!("Unsupported channel count {} (mono or stereo only)", channels);
    }
    let samples = whole_frames(samples, channels);

    let mut config: CrossoverConfig = match &args.config {
        Some(path) => load_config(path),
        None => CrossoverConfig::default(),
    };
    config.sample_rate = spec.sample_rate as f32;
    config.channels = channels;

    let mut engine = CrossoverEngine::from_config(&config);
    for &band in &args.solo {
        if band >= engine.num_bands() {
            log::warn!("--solo {}: only {} bands, ignored", band, engine.num_bands());
        }
        engine.set_is_soloed(band, true);
    }

    log::info!(
        "Rendering {:?}: {} Hz, {} channel(s), {} bands at {:?}",
        args.input,
        spec.sample_rate,
        channels,
        engine.num_bands(),
        engine.crossover_frequencies()
    );

    let block = config.max_block_size.max(1) * channels;
    let mut rendered = vec![0.0f32; samples.len()];
    for (input, output) in samples.chunks(block).zip(rendered.chunks_mut(block)) {
        let mut buffer = AudioBuffer::from_interleaved(input, channels);
        engine.process_block(&mut buffer, &[]);
        buffer.write_interleaved(output, channels);
    }

    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&args.output, out_spec)
        .with_context(|| format!("Failed to create output WAV: {:?}", args.output))?;
    for &sample in &rendered {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("Failed to finalize output WAV")?;

    log::info!("Wrote {} frames to {:?}", rendered.len() / channels, args.output);
    Ok(())
}
