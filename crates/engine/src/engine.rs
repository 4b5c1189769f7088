//! The spectral engine: framing, vocoder orchestration, warmup, and mix.

use std::sync::Arc;

use anyhow::ensure;
use spektra_dsp::{
    flush_denormal, sanitize_sample, ParameterPort, ParameterSlots, ParameterValue, ProcessBlock,
    ProcessContext, Processor, ProcessorMetadata, SmoothedParam, StreamConfig,
};
use tracing::{info, instrument, warn};

use crate::fft::FftTransform;
use crate::params::{self, ids, ENGINE_METADATA, SPECS};
use crate::rings::{InputRing, OutputRing};
use crate::spectral::ChainParams;
use crate::vocoder::{FrameParams, VocoderChannel};
use crate::window::WindowTable;

const OVERLAP_FACTOR: usize = 4;
const MIN_FFT_SIZE: usize = 1024;
const MAX_FFT_SIZE: usize = 8192;
const SMOOTHING_MS: f32 = 10.0;
const MAX_BACKLOG_SECONDS: usize = 8;

fn clamp_normalized(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    WarmingUp,
    Steady,
}

struct ChannelState {
    input: InputRing,
    output: OutputRing,
    vocoder: VocoderChannel,
}

/// Smoothed normalized values for every control. The mix ramps per output
/// frame; hop-scoped controls advance once per analysis event by a whole
/// hop, which keeps their trajectories independent of block partitioning.
struct Smoothers {
    time_stretch: SmoothedParam,
    pitch_shift: SmoothedParam,
    smear: SmoothedParam,
    gate: SmoothedParam,
    shift: SmoothedParam,
    resonance: SmoothedParam,
    density: SmoothedParam,
    mix: SmoothedParam,
    freeze: f32,
}

impl Smoothers {
    fn new(slots: &ParameterSlots, sample_rate: f32) -> Self {
        let seed = |id: &str, fallback: f32| {
            let value = clamp_normalized(slots.get(id).unwrap_or(fallback));
            SmoothedParam::new(value, SMOOTHING_MS, sample_rate)
        };
        Self {
            time_stretch: seed(ids::TIME_STRETCH, 0.5),
            pitch_shift: seed(ids::PITCH_SHIFT, 0.5),
            smear: seed(ids::SMEAR, 0.0),
            gate: seed(ids::GATE, 0.0),
            shift: seed(ids::SHIFT, 0.5),
            resonance: seed(ids::RESONANCE, 0.0),
            density: seed(ids::DENSITY, 1.0),
            mix: seed(ids::MIX, 1.0),
            freeze: clamp_normalized(slots.get(ids::FREEZE).unwrap_or(0.0)),
        }
    }

    /// Reads one pending target per parameter; last writer wins.
    fn load_targets(&mut self, slots: &ParameterSlots) {
        slots.for_each(|id, value| {
            let value = clamp_normalized(value);
            match id {
                ids::TIME_STRETCH => self.time_stretch.set_target(value),
                ids::PITCH_SHIFT => self.pitch_shift.set_target(value),
                ids::SMEAR => self.smear.set_target(value),
                ids::GATE => self.gate.set_target(value),
                ids::SHIFT => self.shift.set_target(value),
                ids::RESONANCE => self.resonance.set_target(value),
                ids::DENSITY => self.density.set_target(value),
                ids::FREEZE => self.freeze = value,
                ids::MIX => self.mix.set_target(value),
                _ => {}
            }
        });
    }

    fn snap_to_targets(&mut self) {
        for smoother in [
            &mut self.time_stretch,
            &mut self.pitch_shift,
            &mut self.smear,
            &mut self.gate,
            &mut self.shift,
            &mut self.resonance,
            &mut self.density,
            &mut self.mix,
        ] {
            let target = smoother.target();
            smoother.snap_to(target);
        }
    }
}

struct Prepared {
    fft: FftTransform,
    window: WindowTable,
    channels: Vec<ChannelState>,
    smoothers: Smoothers,
    fft_size: usize,
    hop: usize,
    latency: usize,
    state: EngineState,
    emitted: u64,
    stretch_carry: f32,
}

impl Prepared {
    fn run(&mut self, block: &mut ProcessBlock<'_>) {
        let channel_count = self.channels.len();
        let frames = block.frames();
        let data = block.data_mut();

        for frame in 0..frames {
            let base = frame * channel_count;
            for (ch, channel) in self.channels.iter_mut().enumerate() {
                channel.input.push(sanitize_sample(data[base + ch]));
            }

            while self.channels[0].input.frame_ready() {
                self.process_hop();
            }

            let mix = self.smoothers.mix.next();
            for (ch, channel) in self.channels.iter_mut().enumerate() {
                let wet = channel.output.read();
                data[base + ch] = match self.state {
                    EngineState::WarmingUp => 0.0,
                    EngineState::Steady => {
                        let dry = channel.input.delayed(self.latency);
                        flush_denormal(dry * (1.0 - mix) + wet * mix)
                    }
                };
            }

            self.emitted += 1;
            if self.state == EngineState::WarmingUp && self.emitted >= self.latency as u64 {
                self.state = EngineState::Steady;
            }
        }
    }

    /// One analysis event: advance hop-scoped parameters, resolve this
    /// hop's settings, and run every channel through the vocoder.
    fn process_hop(&mut self) {
        let hop = self.hop;
        let smoothers = &mut self.smoothers;
        let stretch = params::stretch_factor(smoothers.time_stretch.advance_by(hop));
        let pitch_ratio = params::pitch_ratio(smoothers.pitch_shift.advance_by(hop));
        let smear_radius = params::smear_radius(smoothers.smear.advance_by(hop));
        let gate_amount = smoothers.gate.advance_by(hop);
        let shift_bins = params::shift_bins(smoothers.shift.advance_by(hop), self.fft_size / 2);
        let resonance = smoothers.resonance.advance_by(hop);
        let density = smoothers.density.advance_by(hop);
        let freeze = params::freeze_engaged(smoothers.freeze);

        // fractional-hop carry keeps long-run duration on target
        let desired = hop as f32 * stretch + self.stretch_carry;
        let synth_hop = (desired.round() as isize).max(1) as usize;
        self.stretch_carry = desired - synth_hop as f32;

        let frame_params = FrameParams {
            pitch_ratio,
            synth_hop,
            freeze,
            chain: ChainParams {
                gate_amount,
                smear_radius,
                shift_bins,
                resonance,
                density,
            },
        };

        for channel in self.channels.iter_mut() {
            channel.input.copy_frame(channel.vocoder.frame_mut());
            let frame = channel
                .vocoder
                .process_frame(&mut self.fft, &self.window, &frame_params);
            channel.output.accumulate(frame, self.window.coeffs());
            channel.output.advance_synthesis(synth_hop);
            channel.input.advance();
        }
    }
}

/// STFT spectral processor: phase vocoder plus per-bin transform chain.
pub struct SpectralEngine {
    metadata: Arc<ProcessorMetadata>,
    slots: Arc<ParameterSlots>,
    prepared: Option<Prepared>,
}

impl SpectralEngine {
    pub fn new() -> Self {
        Self {
            metadata: Arc::clone(&ENGINE_METADATA),
            slots: ParameterSlots::from_specs(&SPECS),
            prepared: None,
        }
    }

    /// Wait-free control-side handle for parameter updates.
    pub fn parameter_port(&self) -> ParameterPort {
        self.slots.port()
    }
}

impl Default for SpectralEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for SpectralEngine {
    fn metadata(&self) -> &ProcessorMetadata {
        &self.metadata
    }

    fn prepare(&mut self, config: &StreamConfig) -> anyhow::Result<()> {
        ensure!(config.sample_rate > 0, "sample rate must be non-zero");
        ensure!(config.channels > 0, "channel count must be non-zero");
        ensure!(config.max_block_size > 0, "max block size must be non-zero");

        let fft_size = (config.sample_rate as usize / 24)
            .next_power_of_two()
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE);
        let hop = fft_size / OVERLAP_FACTOR;
        let latency = fft_size;
        let capacity = MAX_BACKLOG_SECONDS * config.sample_rate as usize
            + 2 * fft_size
            + config.max_block_size;

        let channels: Vec<ChannelState> = (0..config.channels)
            .map(|_| ChannelState {
                input: InputRing::new(fft_size, hop),
                output: OutputRing::new(capacity, fft_size as u64),
                vocoder: VocoderChannel::new(fft_size, hop, config.sample_rate as f32),
            })
            .collect();
        let smoothers = Smoothers::new(&self.slots, config.sample_rate as f32);

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            fft_size,
            hop,
            latency,
            "prepared spectral engine"
        );

        self.prepared = Some(Prepared {
            fft: FftTransform::new(fft_size),
            window: WindowTable::hann(fft_size),
            channels,
            smoothers,
            fft_size,
            hop,
            latency,
            state: EngineState::WarmingUp,
            emitted: 0,
            stretch_carry: 0.0,
        });
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(prepared) = self.prepared.as_mut() {
            for channel in prepared.channels.iter_mut() {
                channel.input.reset();
                channel.output.reset();
                channel.vocoder.reset();
            }
            prepared.smoothers.snap_to_targets();
            prepared.state = EngineState::WarmingUp;
            prepared.emitted = 0;
            prepared.stretch_carry = 0.0;
        }
    }

    #[instrument(skip_all, level = "trace")]
    fn process(&mut self, block: &mut ProcessBlock<'_>, _context: &ProcessContext) {
        let Some(prepared) = self.prepared.as_mut() else {
            return;
        };
        if block.channels() != prepared.channels.len() {
            warn!(
                "channel mismatch for {} processor (expected {}, got {}); skipping processing",
                self.metadata.id,
                prepared.channels.len(),
                block.channels()
            );
            return;
        }
        prepared.smoothers.load_targets(&self.slots);
        prepared.run(block);
    }

    fn update_parameter(&mut self, update: ParameterValue) {
        let value = clamp_normalized(update.value);
        if !self.slots.set(update.id, value) {
            warn!(
                "parameter `{}` not found for processor `{}`",
                update.id, self.metadata.id
            );
        }
    }

    fn latency_samples(&self) -> usize {
        self.prepared.as_ref().map_or(0, |p| p.latency)
    }
}
