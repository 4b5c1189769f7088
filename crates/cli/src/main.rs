//! Offline WAV renderer for the spectral engine.
//!
//! Usage: spektra-cli <input.wav> <output.wav> [params.json]
//!
//! Reads a WAV file, runs it through the engine in fixed-size blocks, then
//! drains the tail and trims the latency prefix so the output lines up with
//! the input.

use std::env;
use std::fs;
use std::io;

use anyhow::{ensure, Context};
use spektra_dsp::{ProcessBlock, ProcessContext, Processor, StreamConfig};
use spektra_engine::{EngineParams, SpectralEngine};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const BLOCK_FRAMES: usize = 512;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} <input.wav> <output.wav> [params.json]", args[0]);
        std::process::exit(1);
    }
    let input_path = &args[1];
    let output_path = &args[2];

    let params = match args.get(3) {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read params file {}", path))?;
            EngineParams::from_json(&json)
                .with_context(|| format!("invalid params file {}", path))?
        }
        None => EngineParams::default(),
    };

    let reader = hound::WavReader::open(input_path)
        .with_context(|| format!("failed to open {}", input_path))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;
    ensure!(channels > 0, "input has no channels");

    let samples = read_samples(reader).context("failed to decode input samples")?;
    ensure!(
        samples.len() % channels == 0,
        "sample count is not a whole number of frames"
    );
    let input_frames = samples.len() / channels;
    info!(
        input = %input_path,
        channels,
        sample_rate,
        frames = input_frames,
        "loaded input"
    );

    let mut engine = SpectralEngine::new();
    engine
        .prepare(&StreamConfig {
            sample_rate,
            max_block_size: BLOCK_FRAMES,
            channels,
        })
        .context("failed to prepare engine")?;
    for update in params.updates() {
        engine.update_parameter(update);
    }

    // drain enough silence to flush the latency plus any stretch overhang
    let latency = engine.latency_samples();
    let overhang = ((params.stretch_factor() - 1.0).max(0.0) * input_frames as f32).ceil() as usize;
    let drain_frames = 2 * latency + overhang;

    let mut rendered = Vec::with_capacity(samples.len() + drain_frames * channels);
    run_blocks(&mut engine, &samples, channels, sample_rate, &mut rendered);
    let silence = vec![0.0f32; drain_frames * channels];
    run_blocks(&mut engine, &silence, channels, sample_rate, &mut rendered);

    // drop the latency prefix, then the silent drain tail
    let rendered = &rendered[(latency * channels).min(rendered.len())..];
    let kept_frames = rendered
        .chunks(channels)
        .rposition(|frame| frame.iter().any(|v| v.abs() > 1.0e-6))
        .map_or(0, |last| last + 1);
    let rendered = &rendered[..kept_frames * channels];

    let out_spec = hound::WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output_path, out_spec)
        .with_context(|| format!("failed to create {}", output_path))?;
    for &sample in rendered {
        writer.write_sample(sample)?;
    }
    writer.finalize().context("failed to finalize output")?;

    info!(output = %output_path, frames = kept_frames, "rendered output");
    Ok(())
}

fn read_samples<R: io::Read>(reader: hound::WavReader<R>) -> anyhow::Result<Vec<f32>> {
    let spec = reader.spec();
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| Ok(s? as f32 * scale))
                .collect()
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().map(|s| Ok(s?)).collect(),
    }
}

fn run_blocks(
    engine: &mut SpectralEngine,
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    out: &mut Vec<f32>,
) {
    for chunk in samples.chunks(BLOCK_FRAMES * channels) {
        let mut buf = chunk.to_vec();
        let frame_count = buf.len() / channels;
        let context = ProcessContext {
            sample_rate,
            channels,
            frame_count,
        };
        let mut block = ProcessBlock::new(&mut buf, channels);
        engine.process(&mut block, &context);
        out.extend_from_slice(&buf);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
