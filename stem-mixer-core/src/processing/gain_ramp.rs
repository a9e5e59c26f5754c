use std::time::Duration;

/// A gain parameter that moves linearly to its target instead of jumping.
///
/// Times are offsets on the engine's own clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    start_value: f64,
    target: f64,
    start: Duration,
    length: Duration,
}

impl GainRamp {
    pub fn new(value: f64) -> Self {
        Self {
            start_value: value,
            target: value,
            start: Duration::ZERO,
            length: Duration::ZERO,
        }
    }

    /// Begin a ramp from wherever the gain is at `now`.
    pub fn ramp_to(&mut self, target: f64, now: Duration, length: Duration) {
        self.start_value = self.value_at(now);
        self.target = target;
        self.start = now;
        self.length = length;
    }

    pub fn set_immediately(&mut self, value: f64) {
        *self = Self::new(value);
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn value_at(&self, now: Duration) -> f64 {
        if self.length.is_zero() || now >= self.start + self.length {
            return self.target;
        }
        if now <= self.start {
            return self.start_value;
        }
        let progress = (now - self.start).as_secs_f64() / self.length.as_secs_f64();
        self.start_value + (self.target - self.start_value) * progress
    }

    pub fn is_settled(&self, now: Duration) -> bool {
        self.length.is_zero() || now >= self.start + self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ramp_is_linear() {
        let mut gain = GainRamp::new(1.0);
        gain.ramp_to(0.0, Duration::from_millis(100), Duration::from_millis(50));

        assert_eq!(gain.value_at(Duration::from_millis(100)), 1.0);
        assert_abs_diff_eq!(gain.value_at(Duration::from_millis(125)), 0.5, epsilon = 1e-9);
        assert_eq!(gain.value_at(Duration::from_millis(150)), 0.0);
        assert!(gain.is_settled(Duration::from_millis(150)));
    }

    #[test]
    fn retarget_mid_ramp_starts_from_current_value() {
        let mut gain = GainRamp::new(0.0);
        gain.ramp_to(1.0, Duration::ZERO, Duration::from_millis(100));
        gain.ramp_to(0.0, Duration::from_millis(50), Duration::from_millis(100));

        assert_abs_diff_eq!(gain.value_at(Duration::from_millis(50)), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(gain.value_at(Duration::from_millis(100)), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn immediate_set_skips_ramp() {
        let mut gain = GainRamp::new(0.2);
        gain.set_immediately(0.8);
        assert_eq!(gain.value_at(Duration::ZERO), 0.8);
    }
}
