//! Circular input/output buffering around the fixed analysis hop.
//!
//! Both rings are fixed arenas indexed by absolute `u64` cursors, so the
//! host's per-call block size never has to match the hop size. The input
//! ring fires one analysis event per hop once a full FFT window of real
//! input has accumulated; the output ring overlap-adds synthesis frames
//! and normalizes by the running squared-window sum on the way out.

use spektra_dsp::Sample;

/// Input history ring driving the analysis cadence.
#[derive(Debug)]
pub struct InputRing {
    data: Vec<Sample>,
    mask: u64,
    write_pos: u64,
    next_frame_end: u64,
    fft_size: usize,
    hop: usize,
}

impl InputRing {
    pub fn new(fft_size: usize, hop: usize) -> Self {
        assert!(fft_size.is_power_of_two(), "fft size must be a power of two");
        assert!(hop > 0 && hop <= fft_size, "hop must divide into the window");
        let capacity = fft_size * 2;
        Self {
            data: vec![0.0; capacity],
            mask: capacity as u64 - 1,
            write_pos: 0,
            next_frame_end: fft_size as u64,
            fft_size,
            hop,
        }
    }

    #[inline]
    pub fn push(&mut self, sample: Sample) {
        self.data[(self.write_pos & self.mask) as usize] = sample;
        self.write_pos += 1;
    }

    /// True once the analysis window ending at the next frame boundary is
    /// fully populated with real input.
    #[inline]
    pub fn frame_ready(&self) -> bool {
        self.write_pos >= self.next_frame_end
    }

    /// Copies the pending analysis window into `frame` in stream order.
    pub fn copy_frame(&self, frame: &mut [Sample]) {
        debug_assert_eq!(frame.len(), self.fft_size);
        let start = self.next_frame_end - self.fft_size as u64;
        for (i, slot) in frame.iter_mut().enumerate() {
            *slot = self.data[((start + i as u64) & self.mask) as usize];
        }
    }

    /// Moves the frame boundary forward by one analysis hop.
    #[inline]
    pub fn advance(&mut self) {
        self.next_frame_end += self.hop as u64;
    }

    /// Sample `delay` positions behind the most recent push; zero until
    /// enough history exists. Serves the latency-aligned dry tap.
    #[inline]
    pub fn delayed(&self, delay: usize) -> Sample {
        if self.write_pos <= delay as u64 {
            return 0.0;
        }
        let pos = self.write_pos - 1 - delay as u64;
        self.data[(pos & self.mask) as usize]
    }

    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.write_pos = 0;
        self.next_frame_end = self.fft_size as u64;
    }
}

/// Overlap-add output arena with a parallel squared-window sum.
#[derive(Debug)]
pub struct OutputRing {
    data: Vec<Sample>,
    window_sum: Vec<Sample>,
    read_pos: u64,
    synth_pos: u64,
    synth_start: u64,
}

impl OutputRing {
    pub fn new(capacity: usize, synth_start: u64) -> Self {
        assert!(capacity > 0, "output capacity must be non-zero");
        Self {
            data: vec![0.0; capacity],
            window_sum: vec![0.0; capacity],
            read_pos: 0,
            synth_pos: synth_start,
            synth_start,
        }
    }

    /// Adds a windowed synthesis frame at the current synthesis position
    /// and tracks the squared window alongside. Contributions behind the
    /// read cursor or beyond the arena's write-ahead horizon are dropped.
    pub fn accumulate(&mut self, frame: &[Sample], window: &[Sample]) {
        debug_assert_eq!(frame.len(), window.len());
        let capacity = self.data.len() as u64;
        let horizon = self.read_pos + capacity;
        let skip = self
            .read_pos
            .saturating_sub(self.synth_pos)
            .min(frame.len() as u64) as usize;
        for i in skip..frame.len() {
            let pos = self.synth_pos + i as u64;
            if pos >= horizon {
                break;
            }
            let idx = (pos % capacity) as usize;
            self.data[idx] += frame[i];
            self.window_sum[idx] += window[i] * window[i];
        }
    }

    #[inline]
    pub fn advance_synthesis(&mut self, hop: usize) {
        self.synth_pos += hop as u64;
    }

    /// Pops one normalized sample and clears its slot. The unity floor on
    /// the divisor means partially covered positions only ever attenuate;
    /// unwritten positions read as silence.
    #[inline]
    pub fn read(&mut self) -> Sample {
        let idx = (self.read_pos % self.data.len() as u64) as usize;
        let value = self.data[idx];
        let weight = self.window_sum[idx];
        self.data[idx] = 0.0;
        self.window_sum[idx] = 0.0;
        self.read_pos += 1;
        value / weight.max(1.0)
    }

    pub fn reset(&mut self) {
        self.data.fill(0.0);
        self.window_sum.fill(0.0);
        self.read_pos = 0;
        self.synth_pos = self.synth_start;
    }
}
