use super::smoothing::ParamSmoother;
use super::AudioEffect;

/// Params: 0 pan (-1..1), 1 width (0..2, 1 = unchanged), 2 LFO rate (Hz),
/// 3 LFO depth (0..1, modulates pan).
pub struct StereoPanner {
    sample_rate: f32,
    pan: ParamSmoother,
    width: ParamSmoother,
    lfo_rate: ParamSmoother,
    lfo_depth: ParamSmoother,
    phase: f32,
}

impl StereoPanner {
    pub fn new(sample_rate: f32) -> Self {
        StereoPanner {
            sample_rate,
            pan: ParamSmoother::new(0.0, sample_rate, 0.020),
            width: ParamSmoother::new(1.0, sample_rate, 0.020),
            lfo_rate: ParamSmoother::new(0.0, sample_rate, 0.020),
            lfo_depth: ParamSmoother::new(0.0, sample_rate, 0.020),
            phase: 0.0,
        }
    }

    /// Equal-power pan law: angle in [0, pi/2] maps pan [-1, 1].
    fn equal_power_gains(pan: f32) -> (f32, f32) {
        let pan = pan.clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        (angle.cos(), angle.sin())
    }
}

impl AudioEffect for StereoPanner {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], _sr: f32) {
        for i in 0..in_l.len() {
            let pan = self.pan.tick();
            let width = self.width.tick().clamp(0.0, 2.0);
            let lfo_rate = self.lfo_rate.tick().max(0.0);
            let lfo_depth = self.lfo_depth.tick().clamp(0.0, 1.0);

            self.phase += lfo_rate / self.sample_rate;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            let lfo = (self.phase * std::f32::consts::TAU).sin();
            let effective_pan = (pan + lfo * lfo_depth).clamp(-1.0, 1.0);

            // Mid/side width control ahead of the pan gains.
            let mid = (in_l[i] + in_r[i]) * 0.5;
            let side = (in_l[i] - in_r[i]) * 0.5 * width;
            let widened_l = mid + side;
            let widened_r = mid - side;

            let (gain_l, gain_r) = Self::equal_power_gains(effective_pan);
            out_l[i] = widened_l * gain_l;
            out_r[i] = widened_r * gain_r;
        }
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.pan.set_target(value),
            1 => self.width.set_target(value),
            2 => self.lfo_rate.set_target(value),
            3 => self.lfo_depth.set_target(value),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_pan_is_equal_power() {
        let (l, r) = StereoPanner::equal_power_gains(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hard_left_silences_right() {
        let (l, r) = StereoPanner::equal_power_gains(-1.0);
        assert!(l > 0.99);
        assert!(r < 1e-3);
    }
}
