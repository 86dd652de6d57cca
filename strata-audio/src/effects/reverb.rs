use super::delay::DelayLine;
use super::smoothing::ParamSmoother;
use super::AudioEffect;

struct Comb {
    line: DelayLine,
    delay_samples: f32,
    feedback: f32,
    damping: f32,
    last_out: f32,
}

impl Comb {
    fn new(delay_samples: f32, max_samples: usize) -> Self {
        Comb {
            line: DelayLine::new(max_samples),
            delay_samples,
            feedback: 0.5,
            damping: 0.3,
            last_out: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read(self.delay_samples);
        self.last_out = delayed * (1.0 - self.damping) + self.last_out * self.damping;
        self.line.write(input + self.last_out * self.feedback);
        delayed
    }

    fn clear(&mut self) {
        self.line.clear();
        self.last_out = 0.0;
    }
}

struct Allpass {
    line: DelayLine,
    delay_samples: f32,
    gain: f32,
}

impl Allpass {
    fn new(delay_samples: f32, max_samples: usize) -> Self {
        Allpass {
            line: DelayLine::new(max_samples),
            delay_samples,
            gain: 0.5,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let delayed = self.line.read(self.delay_samples);
        let out = -input * self.gain + delayed;
        self.line.write(input + delayed * self.gain);
        out
    }

    fn clear(&mut self) {
        self.line.clear();
    }
}

/// Schroeder-topology reverb: four parallel combs per channel summed into
/// two cascaded allpasses. Params: 0 size (0..1), 1 damping (0..1), 2 mix.
pub struct Reverb {
    size: ParamSmoother,
    damping: ParamSmoother,
    mix: ParamSmoother,
    combs_l: Vec<Comb>,
    combs_r: Vec<Comb>,
    allpass_l: Vec<Allpass>,
    allpass_r: Vec<Allpass>,
}

const COMB_TUNINGS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_TUNINGS_MS: [f32; 2] = [5.0, 1.7];

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        let to_samples = |ms: f32| ms / 1000.0 * sample_rate;
        let combs_l = COMB_TUNINGS_MS
            .iter()
            .map(|ms| Comb::new(to_samples(*ms), to_samples(*ms) as usize + 8))
            .collect();
        let combs_r = COMB_TUNINGS_MS
            .iter()
            .map(|ms| Comb::new(to_samples(*ms) * 1.05, (to_samples(*ms) * 1.05) as usize + 8))
            .collect();
        let allpass_l = ALLPASS_TUNINGS_MS
            .iter()
            .map(|ms| Allpass::new(to_samples(*ms), to_samples(*ms) as usize + 8))
            .collect();
        let allpass_r = ALLPASS_TUNINGS_MS
            .iter()
            .map(|ms| Allpass::new(to_samples(*ms) * 1.05, (to_samples(*ms) * 1.05) as usize + 8))
            .collect();
        Reverb {
            size: ParamSmoother::new(0.5, sample_rate, 0.020),
            damping: ParamSmoother::new(0.3, sample_rate, 0.020),
            mix: ParamSmoother::new(0.25, sample_rate, 0.020),
            combs_l,
            combs_r,
            allpass_l,
            allpass_r,
        }
    }
}

impl AudioEffect for Reverb {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            let size = self.size.tick().clamp(0.0, 1.0);
            let damping = self.damping.tick().clamp(0.0, 1.0);
            let mix = self.mix.tick().clamp(0.0, 1.0);
            for c in self.combs_l.iter_mut() {
                c.feedback = 0.7 + size * 0.28;
                c.damping = damping;
            }
            for c in self.combs_r.iter_mut() {
                c.feedback = 0.7 + size * 0.28;
                c.damping = damping;
            }

            let mut wet_l: f32 = self.combs_l.iter_mut().map(|c| c.process(in_l[i])).sum();
            let mut wet_r: f32 = self.combs_r.iter_mut().map(|c| c.process(in_r[i])).sum();
            wet_l /= self.combs_l.len() as f32;
            wet_r /= self.combs_r.len() as f32;
            for ap in self.allpass_l.iter_mut() {
                wet_l = ap.process(wet_l);
            }
            for ap in self.allpass_r.iter_mut() {
                wet_r = ap.process(wet_r);
            }

            out_l[i] = in_l[i] * (1.0 - mix) + wet_l * mix;
            out_r[i] = in_r[i] * (1.0 - mix) + wet_r * mix;
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.size.set_target(value),
            1 => self.damping.set_target(value),
            2 => self.mix.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.combs_l.iter_mut().for_each(Comb::clear);
        self.combs_r.iter_mut().for_each(Comb::clear);
        self.allpass_l.iter_mut().for_each(Allpass::clear);
        self.allpass_r.iter_mut().for_each(Allpass::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mix_passes_dry_signal() {
        let mut rv = Reverb::new(48_000.0);
        rv.set_param(2, 0.0);
        let input = vec![0.4f32; 128];
        let mut out_l = vec![0.0; 128];
        let mut out_r = vec![0.0; 128];
        rv.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!((out_l[127] - 0.4).abs() < 0.01);
    }

    #[test]
    fn produces_finite_output_on_impulse() {
        let mut rv = Reverb::new(48_000.0);
        let mut input = vec![0.0f32; 4096];
        input[0] = 1.0;
        let mut out_l = vec![0.0; 4096];
        let mut out_r = vec![0.0; 4096];
        rv.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!(out_l.iter().all(|s| s.is_finite()));
    }
}
