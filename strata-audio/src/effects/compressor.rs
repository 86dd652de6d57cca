use super::smoothing::ParamSmoother;
use super::AudioEffect;

/// Feed-forward envelope follower with independent attack/release
/// ballistics, driving a soft-knee gain computer (spec §4.6 Compressor).
pub struct Compressor {
    sample_rate: f32,
    threshold_db: ParamSmoother,
    ratio: ParamSmoother,
    attack_ms: f32,
    release_ms: f32,
    knee_db: ParamSmoother,
    makeup_db: ParamSmoother,
    envelope: f32,
    last_gain_reduction_db: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        Compressor {
            sample_rate,
            threshold_db: ParamSmoother::new(-18.0, sample_rate, 0.020),
            ratio: ParamSmoother::new(4.0, sample_rate, 0.020),
            attack_ms: 10.0,
            release_ms: 100.0,
            knee_db: ParamSmoother::new(6.0, sample_rate, 0.020),
            makeup_db: ParamSmoother::new(0.0, sample_rate, 0.020),
            envelope: 0.0,
            last_gain_reduction_db: 0.0,
        }
    }

    fn gain_function(level_db: f32, threshold_db: f32, ratio: f32, knee_db: f32) -> f32 {
        let half_knee = knee_db / 2.0;
        if level_db < threshold_db - half_knee {
            level_db
        } else if level_db > threshold_db + half_knee {
            threshold_db + (level_db - threshold_db) / ratio
        } else {
            let x = level_db - threshold_db + half_knee;
            level_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee_db.max(1e-6))
        }
    }

    fn coeff(time_ms: f32, sample_rate: f32) -> f32 {
        (-1.0 / (time_ms.max(0.01) / 1000.0 * sample_rate)).exp()
    }
}

fn to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-9).log10()
}

fn from_db(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

impl AudioEffect for Compressor {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], sr: f32) {
        let attack_coeff = Self::coeff(self.attack_ms, sr);
        let release_coeff = Self::coeff(self.release_ms, sr);
        let mut worst_reduction = 0.0f32;

        for i in 0..in_l.len() {
            let threshold = self.threshold_db.tick();
            let ratio = self.ratio.tick().max(1.0);
            let knee = self.knee_db.tick().max(0.0);
            let makeup = from_db(self.makeup_db.tick());

            let rectified = in_l[i].abs().max(in_r[i].abs());
            let coeff = if rectified > self.envelope { attack_coeff } else { release_coeff };
            self.envelope = rectified + (self.envelope - rectified) * coeff;

            let level_db = to_db(self.envelope);
            let shaped_db = Self::gain_function(level_db, threshold, ratio, knee);
            let reduction_db = level_db - shaped_db;
            worst_reduction = worst_reduction.max(reduction_db);
            let gain = from_db(-reduction_db) * makeup;

            out_l[i] = in_l[i] * gain;
            out_r[i] = in_r[i] * gain;
        }
        self.last_gain_reduction_db = worst_reduction;
    }

    fn set_param(&mut self, index: u32, value: f32) {
        match index {
            0 => self.threshold_db.set_target(value),
            1 => self.ratio.set_target(value),
            2 => self.attack_ms = value,
            3 => self.release_ms = value,
            4 => self.knee_db.set_target(value),
            5 => self.makeup_db.set_target(value),
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
    fn hard_knee_high_ratio_reduces_gain_above_threshold() {
        let mut comp = Compressor::new(48_000.0);
        comp.set_param(0, -60.0); // threshold
        comp.set_param(1, 20.0); // ratio near-limiting
        comp.set_param(4, 0.0); // knee
        let input = vec![0.9f32; 2048];
        let mut out_l = vec![0.0; 2048];
        let mut out_r = vec![0.0; 2048];
        comp.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!(comp.gain_reduction_db() > 0.0);
        assert!(out_l.last().unwrap().abs() < input[0]);
    }

    #[test]
    fn below_threshold_passes_near_unity() {
        let mut comp = Compressor::new(48_000.0);
        comp.set_param(0, 0.0);
        let input = vec![0.01f32; 512];
        let mut out_l = vec![0.0; 512];
        let mut out_r = vec![0.0; 512];
        comp.process(&input, &input, &mut out_l, &mut out_r, 48_000.0);
        assert!((out_l[511] - input[511]).abs() < 0.005);
    }
}
