//! Parameter ids, normalized-value mappings, and preset loading.
//!
//! Every control is a normalized value in `[0, 1]`; the mappings here
//! turn those into engineering quantities. Midpoints are neutral where a
//! control is bidirectional (stretch, pitch, shift).

use std::borrow::Cow;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use spektra_dsp::{
    ParameterRange, ParameterSpec, ParameterUnit, ParameterValue, ProcessorMetadata,
};

pub mod ids {
    pub const TIME_STRETCH: &str = "time_stretch";
    pub const PITCH_SHIFT: &str = "pitch_shift";
    pub const SMEAR: &str = "smear";
    pub const GATE: &str = "gate";
    pub const SHIFT: &str = "shift";
    pub const RESONANCE: &str = "resonance";
    pub const DENSITY: &str = "density";
    pub const FREEZE: &str = "freeze";
    pub const MIX: &str = "mix";
}

/// Output-duration multiplier in [0.25, 4]; 0.5 maps to 1.0.
pub(crate) fn stretch_factor(value: f32) -> f32 {
    4.0f32.powf(2.0 * value - 1.0)
}

/// Pitch ratio over ±12 semitones; 0.5 maps to 1.0.
pub(crate) fn pitch_ratio(value: f32) -> f32 {
    2.0f32.powf(2.0 * value - 1.0)
}

/// Smear neighborhood radius, 0 to 6 bins.
pub(crate) fn smear_radius(value: f32) -> usize {
    (6.0 * value).round() as usize
}

/// Whole-spectrum offset, up to ±10% of the bin count.
pub(crate) fn shift_bins(value: f32, half: usize) -> isize {
    ((2.0 * value - 1.0) * 0.1 * half as f32).round() as isize
}

pub(crate) fn freeze_engaged(value: f32) -> bool {
    value >= 0.5
}

fn unit_range() -> ParameterRange {
    ParameterRange {
        min: 0.0,
        max: 1.0,
        step: 0.0,
    }
}

pub(crate) static SPECS: Lazy<Vec<ParameterSpec>> = Lazy::new(|| {
    vec![
        ParameterSpec {
            id: ids::TIME_STRETCH,
            name: "Time Stretch",
            range: unit_range(),
            default: 0.5,
            unit: ParameterUnit::Ratio,
        },
        ParameterSpec {
            id: ids::PITCH_SHIFT,
            name: "Pitch Shift",
            range: unit_range(),
            default: 0.5,
            unit: ParameterUnit::Custom(Cow::Borrowed("semitones")),
        },
        ParameterSpec {
            id: ids::SMEAR,
            name: "Smear",
            range: unit_range(),
            default: 0.0,
            unit: ParameterUnit::Custom(Cow::Borrowed("bins")),
        },
        ParameterSpec {
            id: ids::GATE,
            name: "Gate",
            range: unit_range(),
            default: 0.0,
            unit: ParameterUnit::Decibels,
        },
        ParameterSpec {
            id: ids::SHIFT,
            name: "Shift",
            range: unit_range(),
            default: 0.5,
            unit: ParameterUnit::Percent,
        },
        ParameterSpec {
            id: ids::RESONANCE,
            name: "Resonance",
            range: unit_range(),
            default: 0.0,
            unit: ParameterUnit::Percent,
        },
        ParameterSpec {
            id: ids::DENSITY,
            name: "Density",
            range: unit_range(),
            default: 1.0,
            unit: ParameterUnit::Percent,
        },
        ParameterSpec {
            id: ids::FREEZE,
            name: "Freeze",
            range: unit_range(),
            default: 0.0,
            unit: ParameterUnit::None,
        },
        ParameterSpec {
            id: ids::MIX,
            name: "Mix",
            range: unit_range(),
            default: 1.0,
            unit: ParameterUnit::Percent,
        },
    ]
});

pub static ENGINE_METADATA: Lazy<Arc<ProcessorMetadata>> = Lazy::new(|| {
    Arc::new(ProcessorMetadata::new(
        "spectral_engine",
        "Spectral Engine",
        &SPECS,
    ))
});

/// Normalized engine parameters as loaded from a preset file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineParams {
    pub time_stretch: f32,
    pub pitch_shift: f32,
    pub smear: f32,
    pub gate: f32,
    pub shift: f32,
    pub resonance: f32,
    pub density: f32,
    pub freeze: f32,
    pub mix: f32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            time_stretch: 0.5,
            pitch_shift: 0.5,
            smear: 0.0,
            gate: 0.0,
            shift: 0.5,
            resonance: 0.0,
            density: 1.0,
            freeze: 0.0,
            mix: 1.0,
        }
    }
}

impl EngineParams {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The mapped output-duration multiplier, for callers sizing output.
    pub fn stretch_factor(&self) -> f32 {
        stretch_factor(self.time_stretch.clamp(0.0, 1.0))
    }

    /// Parameter updates in declaration order.
    pub fn updates(&self) -> [ParameterValue; 9] {
        [
            ParameterValue {
                id: ids::TIME_STRETCH,
                value: self.time_stretch,
            },
            ParameterValue {
                id: ids::PITCH_SHIFT,
                value: self.pitch_shift,
            },
            ParameterValue {
                id: ids::SMEAR,
                value: self.smear,
            },
            ParameterValue {
                id: ids::GATE,
                value: self.gate,
            },
            ParameterValue {
                id: ids::SHIFT,
                value: self.shift,
            },
            ParameterValue {
                id: ids::RESONANCE,
                value: self.resonance,
            },
            ParameterValue {
                id: ids::DENSITY,
                value: self.density,
            },
            ParameterValue {
                id: ids::FREEZE,
                value: self.freeze,
            },
            ParameterValue {
                id: ids::MIX,
                value: self.mix,
            },
        ]
    }
}
