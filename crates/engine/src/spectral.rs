//! Per-bin spectral transforms applied between analysis and resynthesis.
//!
//! The chain runs on magnitudes only, in a fixed documented order:
//! gate, smear, shift, resonance, density. Every stage is bypassed
//! exactly at its neutral setting; the gate's per-bin envelope is the
//! only state that persists across hops.

use spektra_dsp::{db_to_linear, Sample};

const GATE_ATTACK_MS: f32 = 5.0;
const GATE_RELEASE_MS: f32 = 60.0;
const GATE_RATIO: f32 = 2.0;
const RESONANCE_BOOST: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    Gate,
    Smear,
    Shift,
    Resonance,
    Density,
}

/// Fixed application order of the chain stages.
pub const CHAIN_STAGES: [TransformKind; 5] = [
    TransformKind::Gate,
    TransformKind::Smear,
    TransformKind::Shift,
    TransformKind::Resonance,
    TransformKind::Density,
];

/// Per-hop settings for the chain, already mapped out of normalized form.
#[derive(Clone, Copy, Debug)]
pub struct ChainParams {
    /// Gate depth in [0, 1]; 0 bypasses the stage.
    pub gate_amount: f32,
    /// Neighborhood radius in bins; 0 bypasses.
    pub smear_radius: usize,
    /// Whole-spectrum bin offset; 0 bypasses.
    pub shift_bins: isize,
    /// Peak boost depth in [0, 1]; 0 bypasses.
    pub resonance: f32,
    /// Fraction of bins kept by magnitude; >= 1 bypasses.
    pub density: f32,
}

impl ChainParams {
    pub const NEUTRAL: Self = Self {
        gate_amount: 0.0,
        smear_radius: 0,
        shift_bins: 0,
        resonance: 0.0,
        density: 1.0,
    };
}

/// Magnitude-domain effects chain with preallocated scratch.
#[derive(Debug)]
pub struct SpectralChain {
    gate_gain: Vec<Sample>,
    gate_attack: f32,
    gate_release: f32,
    reference: f32,
    scratch: Vec<Sample>,
    order: Vec<Sample>,
}

impl SpectralChain {
    pub fn new(fft_size: usize, hop: usize, sample_rate: f32) -> Self {
        let bins = fft_size / 2 + 1;
        let hop_rate = sample_rate / hop as f32;
        Self {
            gate_gain: vec![1.0; bins],
            gate_attack: (-1.0 / (GATE_ATTACK_MS * 0.001 * hop_rate)).exp(),
            gate_release: (-1.0 / (GATE_RELEASE_MS * 0.001 * hop_rate)).exp(),
            // peak bin magnitude of a full-scale windowed sine
            reference: fft_size as f32 / 4.0,
            scratch: vec![0.0; bins],
            order: vec![0.0; bins],
        }
    }

    pub fn reset(&mut self) {
        self.gate_gain.fill(1.0);
    }

    pub fn apply(&mut self, magnitudes: &mut [Sample], params: &ChainParams) {
        debug_assert_eq!(magnitudes.len(), self.gate_gain.len());
        for stage in CHAIN_STAGES {
            match stage {
                TransformKind::Gate => self.apply_gate(magnitudes, params.gate_amount),
                TransformKind::Smear => self.apply_smear(magnitudes, params.smear_radius),
                TransformKind::Shift => self.apply_shift(magnitudes, params.shift_bins),
                TransformKind::Resonance => self.apply_resonance(magnitudes, params.resonance),
                TransformKind::Density => self.apply_density(magnitudes, params.density),
            }
        }
    }

    /// Downward expansion below a level-mapped threshold, smoothed per bin
    /// at hop rate. Falling gains use the attack coefficient so the gate
    /// clamps quickly and reopens without flutter.
    fn apply_gate(&mut self, magnitudes: &mut [Sample], amount: f32) {
        if amount <= 0.0 {
            return;
        }
        let threshold = self.reference * db_to_linear(-72.0 + 66.0 * amount);
        for (gain, magnitude) in self.gate_gain.iter_mut().zip(magnitudes.iter_mut()) {
            let target = if *magnitude >= threshold {
                1.0
            } else {
                (*magnitude / threshold).powf(GATE_RATIO - 1.0).min(1.0)
            };
            let coef = if target < *gain {
                self.gate_attack
            } else {
                self.gate_release
            };
            *gain = target + coef * (*gain - target);
            *magnitude *= *gain;
        }
    }

    fn apply_smear(&mut self, magnitudes: &mut [Sample], radius: usize) {
        if radius == 0 {
            return;
        }
        let bins = magnitudes.len();
        self.scratch.copy_from_slice(magnitudes);
        for b in 0..bins {
            let lo = b.saturating_sub(radius);
            let hi = (b + radius).min(bins - 1);
            let mut sum = 0.0;
            for value in &self.scratch[lo..=hi] {
                sum += *value;
            }
            magnitudes[b] = sum / (hi - lo + 1) as f32;
        }
    }

    fn apply_shift(&mut self, magnitudes: &mut [Sample], offset: isize) {
        if offset == 0 {
            return;
        }
        let bins = magnitudes.len() as isize;
        self.scratch.copy_from_slice(magnitudes);
        for b in 0..bins {
            let src = b - offset;
            magnitudes[b as usize] = if (0..bins).contains(&src) {
                self.scratch[src as usize]
            } else {
                0.0
            };
        }
    }

    fn apply_resonance(&mut self, magnitudes: &mut [Sample], resonance: f32) {
        if resonance <= 0.0 {
            return;
        }
        let bins = magnitudes.len();
        if bins < 3 {
            return;
        }
        self.scratch.copy_from_slice(magnitudes);
        for b in 1..bins - 1 {
            if self.scratch[b] > self.scratch[b - 1] && self.scratch[b] > self.scratch[b + 1] {
                magnitudes[b] = self.scratch[b] * (1.0 + resonance * RESONANCE_BOOST);
            }
        }
    }

    /// Keeps the loudest `keep` fraction of bins and zeroes the rest.
    fn apply_density(&mut self, magnitudes: &mut [Sample], keep: f32) {
        if keep >= 1.0 {
            return;
        }
        let bins = magnitudes.len();
        let kept = (keep.max(0.0) * bins as f32).round() as usize;
        if kept >= bins {
            return;
        }
        if kept == 0 {
            magnitudes.fill(0.0);
            return;
        }
        self.order.copy_from_slice(magnitudes);
        let (_, nth, _) = self
            .order
            .select_nth_unstable_by(bins - kept, |a, b| a.total_cmp(b));
        let threshold = *nth;
        for magnitude in magnitudes.iter_mut() {
            if *magnitude < threshold {
                *magnitude = 0.0;
            }
        }
    }
}
