// DSP utilities - Output hygiene and parameter smoothing

/// Silence used for a gain of zero
pub const MIN_DB: f32 = -100.0;

/// Flush values below 1e-15 to zero (denormals are slow on some CPUs)
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// tanh saturation, keeps the output inside [-1, 1]
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// Linear gain to decibels, floored at [`MIN_DB`]
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    if gain <= 0.0 {
        return MIN_DB;
    }
    (20.0 * gain.log10()).max(MIN_DB)
}

/// Decibels to linear gain
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    if db <= MIN_DB {
        return 0.0;
    }
    10f32.powf(db / 20.0)
}

/// One-pole low-pass used to glide a parameter toward its target
///
/// y[n] = y[n-1] + a * (x[n] - y[n-1])
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// `time_constant_ms` is the time to cover ~63% of a step
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = time_constant_ms * 0.001 * sample_rate;
        let coefficient = if time_constant_samples > 1.0 {
            1.0 / time_constant_samples
        } else {
            1.0
        };

        Self {
            current: initial_value,
            coefficient,
        }
    }

    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    pub fn get(&self) -> f32 {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_denormals() {
        assert_eq!(flush_denormals_to_zero(1e-20), 0.0);
        assert_eq!(flush_denormals_to_zero(0.1), 0.1);
        assert_eq!(flush_denormals_to_zero(-0.1), -0.1);
    }

    #[test]
    fn test_soft_clip_bounds() {
        assert_eq!(soft_clip(0.0), 0.0);
        assert!(soft_clip(10.0) <= 1.0 && soft_clip(10.0) > 0.99);
        assert!(soft_clip(-10.0) >= -1.0 && soft_clip(-10.0) < -0.99);
    }

    #[test]
    fn test_gain_db_conversion() {
        assert_eq!(gain_to_db(1.0), 0.0);
        assert!((gain_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert_eq!(gain_to_db(0.0), MIN_DB);
        assert_eq!(db_to_gain(MIN_DB), 0.0);
        assert!((db_to_gain(gain_to_db(0.3)) - 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_smoother_converges_without_overshoot() {
        let mut smoother = OnePoleSmoother::new(0.0, 10.0, 48000.0);
        let mut value = 0.0;
        for _ in 0..4800 {
            value = smoother.process(1.0);
            assert!(value <= 1.0);
        }
        assert!((value - 1.0).abs() < 0.01);

        smoother.reset(0.2);
        assert_eq!(smoother.get(), 0.2);
    }
}
