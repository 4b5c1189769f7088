//! Real-time STFT spectral processing engine.
//!
//! [`SpectralEngine`] combines a phase vocoder with decoupled time-stretch
//! and pitch-shift control and a fixed chain of per-bin spectral transforms
//! (gate, smear, shift, resonance, density) behind the
//! [`spektra_dsp::Processor`] contract. All state is sized in `prepare`;
//! the `process` path performs no allocation and never blocks.

mod engine;
mod fft;
mod params;
mod rings;
mod spectral;
mod vocoder;
mod window;

pub use engine::SpectralEngine;
pub use params::{ids, EngineParams, ENGINE_METADATA};

pub(crate) const TWO_PI: f32 = 2.0 * std::f32::consts::PI;
