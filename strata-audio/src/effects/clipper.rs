use super::smoothing::ParamSmoother;
use super::AudioEffect;

/// Params: 0 threshold (linear 0..1), 1 softness (0=hard, 1=soft tanh knee).
pub struct Clipper {
    threshold: ParamSmoother,
    softness: ParamSmoother,
}

impl Clipper {
    pub fn new(sample_rate: f32) -> Self {
        Clipper {
            threshold: ParamSmoother::new(0.9, sample_rate, 0.020),
            softness: ParamSmoother::new(0.2, sample_rate, 0.020),
        }
    }

    fn clip_sample(x: f32, threshold: f32, softness: f32) -> f32 {
        let threshold = threshold.max(1e-4);
        if softness <= 0.0 {
            return x.clamp(-threshold, threshold);
        }
        let normalized = x / threshold;
        threshold * (normalized / (1.0 + softness * normalized.abs())).clamp(-1.0, 1.0)
    }
}

impl AudioEffect for Clipper {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            let threshold = self.threshold.tick();
            let softness = self.softness.tick();
            out_l[i] = Self::clip_sample(in_l[i], threshold, softness);
            out_r[i] = Self::clip_sample(in_r[i], threshold, softness);
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.threshold.set_target(value),
            1 => self.softness.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_clip_never_exceeds_threshold() {
        let mut c = Clipper::new(48_000.0);
        c.set_param(0, 0.5);
        c.set_param(1, 0.0);
        let input = vec![2.0f32; 256];
        let mut out_l = vec![0.0; 256];
        let mut out_r = vec![0.0; 256];
        c.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!(out_l.iter().all(|s| (s.abs() - 0.5).abs() < 1e-4));
    }
}
