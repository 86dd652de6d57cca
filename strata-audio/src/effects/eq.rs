use super::biquad::{Biquad, BiquadKind};
use super::smoothing::ParamSmoother;
use super::AudioEffect;

/// Parameter indices: 0 low gain dB, 1 low freq, 2 mid gain dB, 3 mid freq,
/// 4 mid Q, 5 high gain dB, 6 high freq.
pub struct ThreeBandEq {
    sample_rate: f32,
    low_gain: ParamSmoother,
    low_freq: f32,
    mid_gain: ParamSmoother,
    mid_freq: f32,
    mid_q: f32,
    high_gain: ParamSmoother,
    high_freq: f32,
    low_l: Biquad,
    low_r: Biquad,
    mid_l: Biquad,
    mid_r: Biquad,
    high_l: Biquad,
    high_r: Biquad,
    dirty: bool,
}

impl ThreeBandEq {
    pub fn new(sample_rate: f32) -> Self {
        let low_freq = 150.0;
        let mid_freq = 1000.0;
        let mid_q = 0.9;
        let high_freq = 6000.0;
        ThreeBandEq {
            sample_rate,
            low_gain: ParamSmoother::new(0.0, sample_rate, 0.020),
            low_freq,
            mid_gain: ParamSmoother::new(0.0, sample_rate, 0.020),
            mid_freq,
            mid_q,
            high_gain: ParamSmoother::new(0.0, sample_rate, 0.020),
            high_freq,
            low_l: Biquad::new(BiquadKind::LowShelf, low_freq, 0.707, 0.0, sample_rate),
            low_r: Biquad::new(BiquadKind::LowShelf, low_freq, 0.707, 0.0, sample_rate),
            mid_l: Biquad::new(BiquadKind::Peaking, mid_freq, mid_q, 0.0, sample_rate),
            mid_r: Biquad::new(BiquadKind::Peaking, mid_freq, mid_q, 0.0, sample_rate),
            high_l: Biquad::new(BiquadKind::HighShelf, high_freq, 0.707, 0.0, sample_rate),
            high_r: Biquad::new(BiquadKind::HighShelf, high_freq, 0.707, 0.0, sample_rate),
            dirty: false,
        }
    }

    fn refresh_coeffs_if_dirty(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        let lg = self.low_gain.current();
        let mg = self.mid_gain.current();
        let hg = self.high_gain.current();
        self.low_l.set_coeffs(BiquadKind::LowShelf, self.low_freq, 0.707, lg, self.sample_rate);
        self.low_r.set_coeffs(BiquadKind::LowShelf, self.low_freq, 0.707, lg, self.sample_rate);
        self.mid_l.set_coeffs(BiquadKind::Peaking, self.mid_freq, self.mid_q, mg, self.sample_rate);
        self.mid_r.set_coeffs(BiquadKind::Peaking, self.mid_freq, self.mid_q, mg, self.sample_rate);
        self.high_l.set_coeffs(BiquadKind::HighShelf, self.high_freq, 0.707, hg, self.sample_rate);
        self.high_r.set_coeffs(BiquadKind::HighShelf, self.high_freq, 0.707, hg, self.sample_rate);
    }
}

impl AudioEffect for ThreeBandEq {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            self.low_gain.tick();
            self.mid_gain.tick();
            self.high_gain.tick();
            self.dirty = true;
            self.refresh_coeffs_if_dirty();
            let l = self.high_l.process(self.mid_l.process(self.low_l.process(in_l[i])));
            let r = self.high_r.process(self.mid_r.process(self.low_r.process(in_r[i])));
            out_l[i] = l;
            out_r[i] = r;
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.low_gain.set_target(value),
            1 => self.low_freq = value,
            2 => self.mid_gain.set_target(value),
            3 => self.mid_freq = value,
            4 => self.mid_q = value,
            5 => self.high_gain.set_target(value),
            6 => self.high_freq = value,
            _ => {}
        }
        self.dirty = true;
    }

    fn reset(&mut self) {
        self.low_l.reset();
        self.low_r.reset();
        self.mid_l.reset();
        self.mid_r.reset();
        self.high_l.reset();
        self.high_r.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bypassed_behavior_unity_gain_passes_through_unchanged_shape() {
        let mut eq = ThreeBandEq::new(48_000.0);
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut out_l = vec![0.0; 64];
        let mut out_r = vec![0.0; 64];
        eq.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        // With all gains at 0dB, output should track input closely.
        for (a, b) in input.iter().zip(out_l.iter()) {
            assert!((a - b).abs() < 0.05);
        }
    }
}
