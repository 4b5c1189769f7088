//! Fixed-size forward/inverse FFT with plans and scratch owned per engine.

use std::sync::Arc;

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use spektra_dsp::flush_denormal;

/// Complex FFT pair planned once at prepare time.
///
/// The scratch buffer is preallocated so neither direction allocates on
/// the audio thread.
pub struct FftTransform {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl FftTransform {
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "fft size must be a power of two");
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            size,
            forward,
            inverse,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// In-place forward transform of a frame already packed into `buffer`.
    pub fn forward(&mut self, buffer: &mut [Complex32]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.forward.process_with_scratch(buffer, &mut self.scratch);
    }

    /// In-place inverse transform with 1/N scaling; subnormal results are
    /// flushed to zero so long quiet passages cannot stall the CPU.
    pub fn inverse(&mut self, buffer: &mut [Complex32]) {
        debug_assert_eq!(buffer.len(), self.size);
        self.inverse.process_with_scratch(buffer, &mut self.scratch);
        let scale = 1.0 / self.size as f32;
        for bin in buffer.iter_mut() {
            bin.re = flush_denormal(bin.re * scale);
            bin.im = flush_denormal(bin.im * scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut fft = FftTransform::new(64);
        let mut buffer = vec![Complex32::new(0.0, 0.0); 64];
        buffer[0] = Complex32::new(1.0, 0.0);
        fft.forward(&mut buffer);
        for bin in &buffer {
            assert!((bin.re - 1.0).abs() < 1.0e-5);
            assert!(bin.im.abs() < 1.0e-5);
        }
    }

    #[test]
    fn cosine_concentrates_in_one_bin() {
        let size = 256;
        let mut fft = FftTransform::new(size);
        let k = 5.0;
        let mut buffer: Vec<Complex32> = (0..size)
            .map(|i| {
                let phase = crate::TWO_PI * k * i as f32 / size as f32;
                Complex32::new(phase.cos(), 0.0)
            })
            .collect();
        fft.forward(&mut buffer);
        assert!((buffer[5].norm() - size as f32 / 2.0).abs() < 1.0e-2);
        for (b, bin) in buffer.iter().enumerate().take(size / 2) {
            if b != 5 {
                assert!(bin.norm() < 1.0e-2, "bin {} leaked {}", b, bin.norm());
            }
        }
    }

    #[test]
    fn round_trip_restores_the_frame() {
        let size = 512;
        let mut fft = FftTransform::new(size);
        let original: Vec<f32> = (0..size)
            .map(|i| (i as f32 * 0.127).sin() * 0.5 + (i as f32 * 0.011).cos() * 0.25)
            .collect();
        let mut buffer: Vec<Complex32> =
            original.iter().map(|x| Complex32::new(*x, 0.0)).collect();
        fft.forward(&mut buffer);
        fft.inverse(&mut buffer);
        for (x, bin) in original.iter().zip(buffer.iter()) {
            assert!((x - bin.re).abs() < 1.0e-5);
            assert!(bin.im.abs() < 1.0e-5);
        }
    }

    #[test]
    fn inverse_flushes_subnormal_output() {
        let size = 1024;
        let mut fft = FftTransform::new(size);
        let mut buffer = vec![Complex32::new(0.0, 0.0); size];
        buffer[3] = Complex32::new(1.0e-25, 0.0);
        fft.inverse(&mut buffer);
        for bin in &buffer {
            assert_eq!(bin.re, 0.0);
            assert_eq!(bin.im, 0.0);
        }
    }
}
