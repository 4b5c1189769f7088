//! One-pole parameter smoothing.

use crate::Sample;

/// Once the distance to the target drops below this, the smoother snaps
/// so comparisons against the target become exact.
const SNAP_EPSILON: Sample = 1.0e-6;

fn smoothing_coeff(smoothing_ms: f32, sample_rate: f32) -> Sample {
    let samples = smoothing_ms * 1.0e-3 * sample_rate;
    if samples < 1.0 {
        1.0
    } else {
        1.0 - (-1.0 / samples).exp()
    }
}

/// Exponential one-pole ramp toward a target value.
///
/// The step rate is expressed in arbitrary ticks; the engine advances
/// some smoothers per output frame and others once per analysis hop.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: Sample,
    target: Sample,
    coeff: Sample,
}

impl SmoothedParam {
    pub fn new(initial: Sample, smoothing_ms: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: smoothing_coeff(smoothing_ms, sample_rate),
        }
    }

    /// Reconfigures the ramp time without disturbing the current value.
    pub fn set_time(&mut self, smoothing_ms: f32, sample_rate: f32) {
        self.coeff = smoothing_coeff(smoothing_ms, sample_rate);
    }

    #[inline]
    pub fn set_target(&mut self, target: Sample) {
        self.target = target;
    }

    /// Jumps both the current value and the target, bypassing the ramp.
    pub fn snap_to(&mut self, value: Sample) {
        self.current = value;
        self.target = value;
    }

    #[inline]
    pub fn value(&self) -> Sample {
        self.current
    }

    #[inline]
    pub fn target(&self) -> Sample {
        self.target
    }

    #[inline]
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Advances one tick and returns the new value.
    #[inline]
    pub fn next(&mut self) -> Sample {
        self.current += self.coeff * (self.target - self.current);
        self.maybe_snap();
        self.current
    }

    /// Advances `steps` ticks at once using the closed form; equivalent to
    /// calling [`next`](Self::next) `steps` times up to rounding.
    pub fn advance_by(&mut self, steps: usize) -> Sample {
        if steps > 0 && self.current != self.target {
            let keep = (1.0 - self.coeff).powi(steps.min(i32::MAX as usize) as i32);
            self.current = self.target + (self.current - self.target) * keep;
            self.maybe_snap();
        }
        self.current
    }

    #[inline]
    fn maybe_snap(&mut self) {
        if (self.target - self.current).abs() < SNAP_EPSILON {
            self.current = self.target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_converges_and_settles() {
        let mut p = SmoothedParam::new(0.0, 10.0, 48_000.0);
        p.set_target(1.0);
        for _ in 0..480 {
            p.next();
        }
        // One time constant of headroom past 5 tau.
        assert!((p.value() - 1.0).abs() < 1.0e-2);
        for _ in 0..48_000 {
            p.next();
        }
        assert!(p.is_settled());
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn ramp_is_monotonic() {
        let mut p = SmoothedParam::new(1.0, 5.0, 44_100.0);
        p.set_target(0.0);
        let mut prev = p.value();
        for _ in 0..2_000 {
            let v = p.next();
            assert!(v <= prev);
            prev = v;
        }
    }

    #[test]
    fn advance_by_matches_stepping() {
        let mut stepped = SmoothedParam::new(0.2, 20.0, 48_000.0);
        let mut jumped = stepped.clone();
        stepped.set_target(0.9);
        jumped.set_target(0.9);

        for _ in 0..512 {
            stepped.next();
        }
        jumped.advance_by(512);
        assert!((stepped.value() - jumped.value()).abs() < 1.0e-5);
    }

    #[test]
    fn advance_by_is_partition_independent() {
        let mut whole = SmoothedParam::new(0.0, 15.0, 44_100.0);
        let mut split = whole.clone();
        whole.set_target(1.0);
        split.set_target(1.0);

        whole.advance_by(700);
        split.advance_by(137);
        split.advance_by(400);
        split.advance_by(163);
        assert!((whole.value() - split.value()).abs() < 1.0e-6);
    }

    #[test]
    fn snap_to_bypasses_the_ramp() {
        let mut p = SmoothedParam::new(0.0, 10.0, 48_000.0);
        p.set_target(1.0);
        p.next();
        p.snap_to(0.5);
        assert!(p.is_settled());
        assert_eq!(p.value(), 0.5);
    }

    #[test]
    fn zero_time_is_instant() {
        let mut p = SmoothedParam::new(0.0, 0.0, 48_000.0);
        p.set_target(0.75);
        assert_eq!(p.next(), 0.75);
    }
}
