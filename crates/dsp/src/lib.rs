//! Core DSP abstractions and utilities for the Spektra spectral engine.
//!
//! The crate provides the real-time processing seam shared by the engine
//! and its hosts: an interleaved block wrapper, parameter metadata,
//! wait-free control-to-audio parameter slots, and smoothing primitives.
//! Nothing here allocates on the audio thread.

use std::{borrow::Cow, sync::Arc};

use serde::{Deserialize, Serialize};

mod control;
mod smooth;
mod util;

pub use control::{ParameterPort, ParameterSlots};
pub use smooth::SmoothedParam;
pub use util::{db_to_linear, flush_denormal, linear_to_db, sanitize_sample};

/// Primary floating-point sample type used across the engine.
pub type Sample = f32;

/// Interleaved audio block wrapping a mutable slice of samples.
///
/// The block does not allocate and is suitable for use on the real-time thread.
pub struct ProcessBlock<'a> {
    data: &'a mut [Sample],
    channels: usize,
}

impl<'a> ProcessBlock<'a> {
    /// Creates a new process block from an interleaved buffer.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero or if the sample count is not divisible by `channels`.
    pub fn new(data: &'a mut [Sample], channels: usize) -> Self {
        assert!(channels > 0, "channels must be non-zero");
        assert!(
            data.len() % channels == 0,
            "buffer length {} must be divisible by channels {}",
            data.len(),
            channels
        );
        Self { data, channels }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline]
    pub fn data(&self) -> &[Sample] {
        self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [Sample] {
        self.data
    }
}

/// Processing configuration for a block.
#[derive(Clone, Debug)]
pub struct ProcessContext {
    pub sample_rate: u32,
    pub channels: usize,
    pub frame_count: usize,
}

/// Stream-level configuration handed to [`Processor::prepare`].
///
/// The channel count lives here because per-channel state must be sized
/// before the first real-time callback runs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub max_block_size: usize,
    pub channels: usize,
}

/// Metadata describing a parameter exposed by a processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub range: ParameterRange,
    pub default: f32,
    pub unit: ParameterUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ParameterUnit {
    Decibels,
    Ratio,
    Percent,
    Custom(Cow<'static, str>),
    None,
}

impl Default for ParameterUnit {
    fn default() -> Self {
        Self::None
    }
}

/// Lightweight value update used to avoid heap allocations on the audio thread.
#[derive(Debug, Clone, Copy)]
pub struct ParameterValue {
    pub id: &'static str,
    pub value: f32,
}

/// Shared metadata for a processor implementation.
#[derive(Debug, Clone)]
pub struct ProcessorMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub parameters: Arc<[ParameterSpec]>,
}

impl ProcessorMetadata {
    pub fn new(id: &'static str, name: &'static str, parameters: &[ParameterSpec]) -> Self {
        Self {
            id,
            name,
            parameters: Arc::from(parameters),
        }
    }
}

/// Trait implemented by block-based real-time processors.
///
/// `prepare` and `reset` must only run while the audio thread is idle;
/// `process`, `update_parameter`, and `latency_samples` are callback-safe.
pub trait Processor: Send {
    /// Returns processor metadata used by the host for introspection.
    fn metadata(&self) -> &ProcessorMetadata;

    /// Sizes all fixed state for the given stream. Idempotent and
    /// re-callable; the only operation allowed to allocate or fail.
    fn prepare(&mut self, config: &StreamConfig) -> anyhow::Result<()>;

    /// Clears phase, ring, and envelope state without reallocating.
    fn reset(&mut self);

    /// Processes an interleaved buffer in-place. The frame count may differ
    /// from call to call and from the prepared `max_block_size`.
    fn process(&mut self, block: &mut ProcessBlock<'_>, context: &ProcessContext);

    /// Applies a control parameter update. Unknown ids leave previous
    /// targets in place; values are clamped to the parameter range.
    fn update_parameter(&mut self, update: ParameterValue);

    /// Fixed processing delay in samples, valid after `prepare`.
    fn latency_samples(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gain {
        metadata: ProcessorMetadata,
        gain: Sample,
        prepared: bool,
    }

    impl Gain {
        fn new() -> Self {
            Self {
                metadata: ProcessorMetadata::new(
                    "gain",
                    "Unity Gain",
                    &[ParameterSpec {
                        id: "gain",
                        name: "Gain",
                        range: ParameterRange {
                            min: 0.0,
                            max: 2.0,
                            step: 0.01,
                        },
                        default: 1.0,
                        unit: ParameterUnit::Ratio,
                    }],
                ),
                gain: 1.0,
                prepared: false,
            }
        }
    }

    impl Processor for Gain {
        fn metadata(&self) -> &ProcessorMetadata {
            &self.metadata
        }

        fn prepare(&mut self, config: &StreamConfig) -> anyhow::Result<()> {
            anyhow::ensure!(config.sample_rate > 0, "sample rate must be non-zero");
            self.prepared = true;
            Ok(())
        }

        fn reset(&mut self) {
            self.gain = 1.0;
        }

        fn process(&mut self, block: &mut ProcessBlock<'_>, _context: &ProcessContext) {
            for sample in block.data_mut() {
                *sample *= self.gain;
            }
        }

        fn update_parameter(&mut self, update: ParameterValue) {
            if update.id == "gain" {
                self.gain = update.value.clamp(0.0, 2.0);
            }
        }

        fn latency_samples(&self) -> usize {
            0
        }
    }

    #[test]
    fn block_reports_frames_and_channels() {
        let mut samples = [0.0f32; 8];
        let block = ProcessBlock::new(&mut samples, 2);
        assert_eq!(block.channels(), 2);
        assert_eq!(block.frames(), 4);
    }

    #[test]
    #[should_panic(expected = "divisible")]
    fn block_rejects_ragged_buffers() {
        let mut samples = [0.0f32; 7];
        let _ = ProcessBlock::new(&mut samples, 2);
    }

    #[test]
    fn processor_contract_round_trip() {
        let mut gain = Gain::new();
        let config = StreamConfig {
            sample_rate: 48_000,
            max_block_size: 512,
            channels: 2,
        };
        gain.prepare(&config).unwrap();
        assert_eq!(gain.latency_samples(), 0);

        let mut samples = [1.0, -1.0, 0.5, -0.5];
        let ctx = ProcessContext {
            sample_rate: 48_000,
            channels: 2,
            frame_count: 2,
        };

        gain.update_parameter(ParameterValue {
            id: "gain",
            value: 0.5,
        });
        let mut block = ProcessBlock::new(&mut samples, 2);
        gain.process(&mut block, &ctx);
        assert_eq!(block.data(), &[0.5, -0.5, 0.25, -0.25]);

        gain.update_parameter(ParameterValue {
            id: "unknown",
            value: 3.0,
        });
        let mut block = ProcessBlock::new(&mut samples, 2);
        gain.process(&mut block, &ctx);
        assert_eq!(block.data(), &[0.25, -0.25, 0.125, -0.125]);
    }

    #[test]
    fn prepare_rejects_bad_config() {
        let mut gain = Gain::new();
        let config = StreamConfig {
            sample_rate: 0,
            max_block_size: 512,
            channels: 2,
        };
        assert!(gain.prepare(&config).is_err());
    }
}
