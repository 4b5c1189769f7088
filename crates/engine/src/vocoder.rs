//! Phase vocoder core: per-bin phase tracking, pitch-scaled resynthesis,
//! peak-locked phases, and spectral freeze.

use std::f32::consts::PI;

use num_complex::Complex32;
use spektra_dsp::{sanitize_sample, Sample};

use crate::fft::FftTransform;
use crate::spectral::{ChainParams, SpectralChain};
use crate::window::WindowTable;
use crate::TWO_PI;

/// Bins quieter than this hold their phase state instead of tracking noise.
const MAG_EPSILON: f32 = 1.0e-6;
/// Magnitude decay per hop while a frozen spectrum is held.
const FREEZE_DECAY: f32 = 0.999;

/// Per-hop parameters resolved by the engine before channel processing.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    pub pitch_ratio: f32,
    pub synth_hop: usize,
    pub freeze: bool,
    pub chain: ChainParams,
}

#[inline]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * (phase / TWO_PI).round()
}

/// Per-channel vocoder state. Everything is sized at construction; frame
/// processing touches no allocator.
pub struct VocoderChannel {
    fft_size: usize,
    half: usize,
    analysis_hop: usize,
    sample_rate: f32,
    freq_per_bin: f32,
    frame: Vec<Sample>,
    out_frame: Vec<Sample>,
    fft_buffer: Vec<Complex32>,
    last_phase: Vec<Sample>,
    synth_phase: Vec<Sample>,
    ana_magn: Vec<Sample>,
    ana_phase: Vec<Sample>,
    ana_freq: Vec<Sample>,
    work_magn: Vec<Sample>,
    work_phase: Vec<Sample>,
    work_freq: Vec<Sample>,
    syn_magn: Vec<Sample>,
    syn_freq: Vec<Sample>,
    syn_weight: Vec<Sample>,
    frozen_magn: Vec<Sample>,
    frozen_phase: Vec<Sample>,
    frozen_freq: Vec<Sample>,
    frozen: bool,
    peaks: Vec<usize>,
    chain: SpectralChain,
}

impl VocoderChannel {
    pub fn new(fft_size: usize, analysis_hop: usize, sample_rate: f32) -> Self {
        let half = fft_size / 2;
        Self {
            fft_size,
            half,
            analysis_hop,
            sample_rate,
            freq_per_bin: sample_rate / fft_size as f32,
            frame: vec![0.0; fft_size],
            out_frame: vec![0.0; fft_size],
            fft_buffer: vec![Complex32::new(0.0, 0.0); fft_size],
            last_phase: vec![0.0; half + 1],
            synth_phase: vec![0.0; half + 1],
            ana_magn: vec![0.0; half + 1],
            ana_phase: vec![0.0; half + 1],
            ana_freq: vec![0.0; half + 1],
            work_magn: vec![0.0; half + 1],
            work_phase: vec![0.0; half + 1],
            work_freq: vec![0.0; half + 1],
            syn_magn: vec![0.0; half + 1],
            syn_freq: vec![0.0; half + 1],
            syn_weight: vec![0.0; half + 1],
            frozen_magn: vec![0.0; half + 1],
            frozen_phase: vec![0.0; half + 1],
            frozen_freq: vec![0.0; half + 1],
            frozen: false,
            peaks: Vec::with_capacity(half + 1),
            chain: SpectralChain::new(fft_size, analysis_hop, sample_rate),
        }
    }

    /// Analysis window destination, filled by the caller before each hop.
    pub fn frame_mut(&mut self) -> &mut [Sample] {
        &mut self.frame
    }

    pub fn reset(&mut self) {
        self.frame.fill(0.0);
        self.out_frame.fill(0.0);
        self.last_phase.fill(0.0);
        self.synth_phase.fill(0.0);
        self.ana_magn.fill(0.0);
        self.ana_phase.fill(0.0);
        self.ana_freq.fill(0.0);
        self.frozen = false;
        self.chain.reset();
    }

    /// Runs one full analysis/transform/resynthesis hop and returns the
    /// windowed synthesis frame for overlap-add.
    pub fn process_frame(
        &mut self,
        fft: &mut FftTransform,
        window: &WindowTable,
        params: &FrameParams,
    ) -> &[Sample] {
        self.analyze(fft, window);
        self.select_source(params.freeze);
        self.chain.apply(&mut self.work_magn, &params.chain);
        self.synthesize(fft, window, params);
        &self.out_frame
    }

    fn analyze(&mut self, fft: &mut FftTransform, window: &WindowTable) {
        for k in 0..self.fft_size {
            self.fft_buffer[k] = Complex32::new(self.frame[k] * window.coeffs()[k], 0.0);
        }
        fft.forward(&mut self.fft_buffer);

        let expct = TWO_PI * self.analysis_hop as f32 / self.fft_size as f32;
        for k in 0..=self.half {
            let bin = self.fft_buffer[k];
            let magn = (bin.re * bin.re + bin.im * bin.im).sqrt();
            self.ana_magn[k] = magn;
            if magn < MAG_EPSILON {
                // hold phase memory rather than tracking noise
                self.ana_phase[k] = self.last_phase[k];
                self.ana_freq[k] = k as f32 * self.freq_per_bin;
                continue;
            }
            let phase = bin.im.atan2(bin.re);
            let mut delta = phase - self.last_phase[k];
            self.last_phase[k] = phase;
            self.ana_phase[k] = phase;

            delta -= k as f32 * expct;
            let mut qpd = (delta / PI) as i32;
            if qpd >= 0 {
                qpd += qpd & 1;
            } else {
                qpd -= qpd & 1;
            }
            delta -= PI * qpd as f32;

            self.ana_freq[k] = k as f32 * self.freq_per_bin
                + delta * self.sample_rate / (TWO_PI * self.analysis_hop as f32);
        }
    }

    /// Chooses live or frozen analysis data for this hop. The frozen
    /// snapshot decays a little every hop so held spectra stay bounded;
    /// live analysis keeps running so phase memory is warm on release.
    fn select_source(&mut self, freeze: bool) {
        if freeze {
            if !self.frozen {
                self.frozen_magn.copy_from_slice(&self.ana_magn);
                self.frozen_phase.copy_from_slice(&self.ana_phase);
                self.frozen_freq.copy_from_slice(&self.ana_freq);
                self.frozen = true;
            }
            self.work_magn.copy_from_slice(&self.frozen_magn);
            self.work_phase.copy_from_slice(&self.frozen_phase);
            self.work_freq.copy_from_slice(&self.frozen_freq);
            for magn in self.frozen_magn.iter_mut() {
                *magn *= FREEZE_DECAY;
            }
        } else {
            self.frozen = false;
            self.work_magn.copy_from_slice(&self.ana_magn);
            self.work_phase.copy_from_slice(&self.ana_phase);
            self.work_freq.copy_from_slice(&self.ana_freq);
        }
    }

    fn synthesize(&mut self, fft: &mut FftTransform, window: &WindowTable, params: &FrameParams) {
        let ratio = params.pitch_ratio;

        self.syn_magn.fill(0.0);
        self.syn_freq.fill(0.0);
        self.syn_weight.fill(0.0);

        // remap magnitudes onto pitch-scaled bins, averaging the scaled
        // instantaneous frequencies by contribution weight
        for k in 0..=self.half {
            let magn = self.work_magn[k];
            if magn < MAG_EPSILON {
                continue;
            }
            let index = (k as f32 * ratio).round() as usize;
            if index > self.half {
                continue;
            }
            self.syn_magn[index] += magn;
            self.syn_freq[index] += magn * self.work_freq[k] * ratio;
            self.syn_weight[index] += magn;
        }
        for k in 0..=self.half {
            if self.syn_weight[k] > 0.0 {
                self.syn_freq[k] /= self.syn_weight[k];
            } else {
                self.syn_freq[k] = k as f32 * self.freq_per_bin;
            }
        }

        // advance phases at the scaled instantaneous rate; quiet bins hold
        let advance_scale = TWO_PI * params.synth_hop as f32 / self.sample_rate;
        for k in 0..=self.half {
            if self.syn_magn[k] < MAG_EPSILON {
                continue;
            }
            self.synth_phase[k] =
                wrap_phase(self.synth_phase[k] + self.syn_freq[k] * advance_scale);
        }

        self.lock_phases();

        for k in 0..=self.half {
            let magn = sanitize_sample(self.syn_magn[k]);
            let phase = self.synth_phase[k];
            let re = sanitize_sample(magn * phase.cos());
            let im = sanitize_sample(magn * phase.sin());
            if k == 0 || k == self.half {
                self.fft_buffer[k] = Complex32::new(re, 0.0);
            } else {
                self.fft_buffer[k] = Complex32::new(re, im);
                self.fft_buffer[self.fft_size - k] = Complex32::new(re, -im);
            }
        }

        fft.inverse(&mut self.fft_buffer);

        for k in 0..self.fft_size {
            self.out_frame[k] = self.fft_buffer[k].re * window.coeffs()[k];
        }
    }

    /// Ties every bin's phase to its nearest spectral peak so inter-bin
    /// phase relationships survive resynthesis. Regions split at the
    /// midpoint between consecutive maxima; ties go to the lower peak.
    fn lock_phases(&mut self) {
        self.peaks.clear();
        for k in 1..self.half {
            if self.syn_magn[k] >= MAG_EPSILON
                && self.syn_magn[k] > self.syn_magn[k - 1]
                && self.syn_magn[k] > self.syn_magn[k + 1]
            {
                self.peaks.push(k);
            }
        }
        if self.peaks.is_empty() {
            return;
        }
        let mut region = 0;
        for k in 0..=self.half {
            while region + 1 < self.peaks.len()
                && k > (self.peaks[region] + self.peaks[region + 1]) / 2
            {
                region += 1;
            }
            let peak = self.peaks[region];
            if k == peak {
                continue;
            }
            self.synth_phase[k] = wrap_phase(
                self.synth_phase[peak] + (self.work_phase[k] - self.work_phase[peak]),
            );
        }
    }
}
