//! Small numeric helpers shared across the engine.

use crate::Sample;

/// Magnitudes below this are treated as silence when converting to decibels.
const DB_FLOOR: Sample = 1.0e-10;

/// Threshold under which feedback values are flushed to exactly zero.
const DENORMAL_THRESHOLD: Sample = 1.0e-20;

/// Converts decibels to a linear amplitude factor.
#[inline]
pub fn db_to_linear(db: Sample) -> Sample {
    10.0f32.powf(db / 20.0)
}

/// Converts a linear amplitude factor to decibels, clamped at -200 dB.
#[inline]
pub fn linear_to_db(linear: Sample) -> Sample {
    20.0 * linear.max(DB_FLOOR).log10()
}

/// Replaces non-finite input with silence.
#[inline]
pub fn sanitize_sample(x: Sample) -> Sample {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Flushes denormal-range values to zero so recursive paths cannot stall.
#[inline]
pub fn flush_denormal(x: Sample) -> Sample {
    if x.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        x
    }
}
