use super::smoothing::ParamSmoother;
use super::AudioEffect;

/// Params: 0 threshold dB, 1 release ms, 2 ceiling (linear).
pub struct Limiter {
    threshold_db: ParamSmoother,
    release_ms: f32,
    ceiling: ParamSmoother,
    envelope: f32,
    last_gain_reduction_db: f32,
}

impl Limiter {
    pub fn new(sample_rate: f32) -> Self {
        Limiter {
            threshold_db: ParamSmoother::new(-1.0, sample_rate, 0.020),
            release_ms: 50.0,
            ceiling: ParamSmoother::new(0.98, sample_rate, 0.020),
            envelope: 0.0,
            last_gain_reduction_db: 0.0,
        }
    }
}

fn from_db(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

impl AudioEffect for Limiter {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], sr: f32) {
        let release_coeff = (-1.0 / (self.release_ms.max(0.01) / 1000.0 * sr)).exp();
        let mut worst = 0.0f32;
        for i in 0..in_l.len() {
            let threshold = from_db(self.threshold_db.tick());
            let ceiling = self.ceiling.tick();

            let peak = in_l[i].abs().max(in_r[i].abs());
            // Instant attack (brickwall), ballistic release.
            if peak > self.envelope {
                self.envelope = peak;
            } else {
                self.envelope = peak + (self.envelope - peak) * release_coeff;
            }

            let mut gain = if self.envelope > threshold {
                threshold / self.envelope.max(1e-9)
            } else {
                1.0
            };
            worst = worst.max(20.0 * (1.0 / gain.max(1e-9)).log10().max(0.0));

            let mut l = in_l[i] * gain;
            let mut r = in_r[i] * gain;
            // Hard ceiling as a final safety clamp.
            if l.abs() > ceiling {
                gain *= ceiling / l.abs();
                l = l.signum() * ceiling;
            }
            if r.abs() > ceiling {
                r = r.signum() * ceiling;
            }
            let _ = gain;
            out_l[i] = l;
            out_r[i] = r;
        }
        self.last_gain_reduction_db = worst;
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.threshold_db.set_target(value),
            1 => self.release_ms = value,
            2 => self.ceiling.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.last_gain_reduction_db = 0.0;
    }

    fn gain_reduction_db(&self) -> f32 {
        self.last_gain_reduction_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_to_ceiling() {
        let mut lim = Limiter::new(48_000.0);
        lim.set_param(2, 0.9);
        let input = vec![1.5f32; 512];
        let mut out_l = vec![0.0; 512];
        let mut out_r = vec![0.0; 512];
        lim.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!(out_l.iter().all(|s| s.abs() <= 0.9 + 1e-4));
    }
}
