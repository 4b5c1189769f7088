//! Precomputed analysis/synthesis window table.

use spektra_dsp::Sample;

use crate::TWO_PI;

/// Periodic Hann window shared by analysis and synthesis.
///
/// The periodic form keeps the squared-window overlap sum exactly flat at
/// the engine's four-times overlap, so steady-state overlap-add
/// normalization is exact.
#[derive(Debug, Clone)]
pub struct WindowTable {
    coeffs: Vec<Sample>,
}

impl WindowTable {
    pub fn hann(size: usize) -> Self {
        assert!(size > 0, "window size must be non-zero");
        let coeffs = (0..size)
            .map(|i| 0.5 * (1.0 - (TWO_PI * i as f32 / size as f32).cos()))
            .collect();
        Self { coeffs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    #[inline]
    pub fn coeffs(&self) -> &[Sample] {
        &self.coeffs
    }

    /// Windows a time-domain frame in place.
    pub fn apply(&self, frame: &mut [Sample]) {
        for (sample, w) in frame.iter_mut().zip(self.coeffs.iter()) {
            *sample *= *w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_endpoints_and_midpoint() {
        let w = WindowTable::hann(1024);
        assert_eq!(w.len(), 1024);
        assert!(w.coeffs()[0].abs() < 1.0e-7);
        assert!((w.coeffs()[512] - 1.0).abs() < 1.0e-6);
    }

    #[test]
    fn squared_overlap_sum_is_flat_at_four_times_overlap() {
        let size = 2048;
        let hop = size / 4;
        let w = WindowTable::hann(size);
        for offset in 0..hop {
            let sum: f32 = (0..4).map(|k| w.coeffs()[offset + k * hop].powi(2)).sum();
            assert!((sum - 1.5).abs() < 1.0e-5, "offset {}: sum {}", offset, sum);
        }
    }

    #[test]
    fn apply_windows_in_place() {
        let w = WindowTable::hann(8);
        let mut frame = [1.0f32; 8];
        w.apply(&mut frame);
        assert_eq!(frame.to_vec(), w.coeffs().to_vec());
    }
}
