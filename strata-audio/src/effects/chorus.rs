use super::delay::DelayLine;
use super::smoothing::ParamSmoother;
use super::AudioEffect;

const BASE_DELAY_MS: f32 = 7.0;
const MAX_SWEEP_MS: f32 = 6.0;

/// Params: 0 rate (Hz), 1 depth (0..1), 2 mix.
pub struct Chorus {
    sample_rate: f32,
    rate: ParamSmoother,
    depth: ParamSmoother,
    mix: ParamSmoother,
    phase: f32,
    line_l: DelayLine,
    line_r: DelayLine,
}

impl Chorus {
    pub fn new(sample_rate: f32) -> Self {
        let max_samples = ((BASE_DELAY_MS + MAX_SWEEP_MS) / 1000.0 * sample_rate) as usize + 8;
        Chorus {
            sample_rate,
            rate: ParamSmoother::new(0.8, sample_rate, 0.020),
            depth: ParamSmoother::new(0.5, sample_rate, 0.020),
            mix: ParamSmoother::new(0.35, sample_rate, 0.020),
            phase: 0.0,
            line_l: DelayLine::new(max_samples),
            line_r: DelayLine::new(max_samples),
        }
    }
}

impl AudioEffect for Chorus {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            let rate = self.rate.tick().max(0.01);
            let depth = self.depth.tick().clamp(0.0, 1.0);
            let mix = self.mix.tick().clamp(0.0, 1.0);

            self.phase += rate / self.sample_rate;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            let lfo = (self.phase * std::f32::consts::TAU).sin();
            let lfo_r = (self.phase * std::f32::consts::TAU + std::f32::consts::FRAC_PI_2).sin();

            let delay_ms_l = BASE_DELAY_MS + lfo * depth * MAX_SWEEP_MS;
            let delay_ms_r = BASE_DELAY_MS + lfo_r * depth * MAX_SWEEP_MS;
            let delay_samples_l = delay_ms_l.max(0.1) / 1000.0 * self.sample_rate;
            let delay_samples_r = delay_ms_r.max(0.1) / 1000.0 * self.sample_rate;

            let wet_l = self.line_l.read(delay_samples_l);
            let wet_r = self.line_r.read(delay_samples_r);
            self.line_l.write(in_l[i]);
            self.line_r.write(in_r[i]);

            out_l[i] = in_l[i] * (1.0 - mix) + wet_l * mix;
            out_r[i] = in_r[i] * (1.0 - mix) + wet_r * mix;
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.rate.set_target(value),
            1 => self.depth.set_target(value),
            2 => self.mix.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.line_l.clear();
        self.line_r.clear();
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mix_is_dry() {
        let mut c = Chorus::new(48_000.0);
        c.set_param(2, 0.0);
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        let mut out_l = vec![0.0; 256];
        let mut out_r = vec![0.0; 256];
        c.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!((out_l[255] - input[255]).abs() < 0.01);
    }
}
