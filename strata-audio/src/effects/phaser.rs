use super::smoothing::ParamSmoother;
use super::AudioEffect;

#[derive(Debug, Clone, Copy, Default)]
struct AllpassStage {
    x1: f32,
    y1: f32,
}

impl AllpassStage {
    fn process(&mut self, x: f32, a: f32) -> f32 {
        let y = -a * x + self.x1 + a * self.y1;
        self.x1 = x;
        self.y1 = y;
        y
    }

    fn clear(&mut self) {
        *self = AllpassStage::default();
    }
}

const MAX_STAGES: usize = 8;
const MIN_SWEEP_HZ: f32 = 300.0;
const MAX_SWEEP_HZ: f32 = 3000.0;

/// Params: 0 rate (Hz), 1 depth (0..1), 2 feedback (0..0.95), 3 stages
/// (2..=8), 4 mix.
pub struct Phaser {
    sample_rate: f32,
    rate: ParamSmoother,
    depth: ParamSmoother,
    feedback: ParamSmoother,
    stages: usize,
    mix: ParamSmoother,
    phase: f32,
    stages_l: [AllpassStage; MAX_STAGES],
    stages_r: [AllpassStage; MAX_STAGES],
    feedback_state_l: f32,
    feedback_state_r: f32,
}

impl Phaser {
    pub fn new(sample_rate: f32) -> Self {
        Phaser {
            sample_rate,
            rate: ParamSmoother::new(0.5, sample_rate, 0.020),
            depth: ParamSmoother::new(0.7, sample_rate, 0.020),
            feedback: ParamSmoother::new(0.3, sample_rate, 0.020),
            stages: 4,
            mix: ParamSmoother::new(0.5, sample_rate, 0.020),
            phase: 0.0,
            stages_l: [AllpassStage::default(); MAX_STAGES],
            stages_r: [AllpassStage::default(); MAX_STAGES],
            feedback_state_l: 0.0,
            feedback_state_r: 0.0,
        }
    }

    fn coeff_from_freq(freq_hz: f32, sample_rate: f32) -> f32 {
        let tan_val = (std::f32::consts::PI * freq_hz / sample_rate).tan();
        (tan_val - 1.0) / (tan_val + 1.0)
    }
}

impl AudioEffect for Phaser {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            let rate = self.rate.tick().max(0.01);
            let depth = self.depth.tick().clamp(0.0, 1.0);
            let feedback = self.feedback.tick().clamp(0.0, 0.95);
            let mix = self.mix.tick().clamp(0.0, 1.0);

            self.phase += rate / self.sample_rate;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            let lfo = 0.5 + 0.5 * (self.phase * std::f32::consts::TAU).sin();
            let freq = MIN_SWEEP_HZ + lfo * depth * (MAX_SWEEP_HZ - MIN_SWEEP_HZ);
            let a = Self::coeff_from_freq(freq, self.sample_rate);

            let mut l = in_l[i] + self.feedback_state_l * feedback;
            let mut r = in_r[i] + self.feedback_state_r * feedback;
            for stage in self.stages_l.iter_mut().take(self.stages) {
                l = stage.process(l, a);
            }
            for stage in self.stages_r.iter_mut().take(self.stages) {
                r = stage.process(r, a);
            }
            self.feedback_state_l = l;
            self.feedback_state_r = r;

            out_l[i] = in_l[i] * (1.0 - mix) + l * mix;
            out_r[i] = in_r[i] * (1.0 - mix) + r * mix;
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.rate.set_target(value),
            1 => self.depth.set_target(value),
            2 => self.feedback.set_target(value),
            3 => self.stages = (value.round() as usize).clamp(2, MAX_STAGES),
            4 => self.mix.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.stages_l.iter_mut().for_each(AllpassStage::clear);
        self.stages_r.iter_mut().for_each(AllpassStage::clear);
        self.feedback_state_l = 0.0;
        self.feedback_state_r = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mix_is_dry() {
        let mut p = Phaser::new(48_000.0);
        p.set_param(4, 0.0);
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut out_l = vec![0.0; 256];
        let mut out_r = vec![0.0; 256];
        p.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!((out_l[255] - input[255]).abs() < 0.01);
    }

    #[test]
    fn stages_param_clamped() {
        let mut p = Phaser::new(48_000.0);
        p.set_param(3, 99.0);
        assert_eq!(p.stages, MAX_STAGES);
        p.set_param(3, 0.0);
        assert_eq!(p.stages, 2);
    }
}
