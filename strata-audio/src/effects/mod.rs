//! The effect chain (spec §4.6). Every effect implements the same
//! `process`/`set_param`/`reset` contract; the registry maps a tagged
//! `EffectKind` to a constructor returning a boxed trait object, per the
//! "dynamic effect instantiation" redesign flag (spec §9) — a closed,
//! in-process table rather than a name-keyed registry of constructor
//! functions.

pub mod biquad;
pub mod chorus;
pub mod clipper;
pub mod compressor;
pub mod delay;
pub mod eq;
pub mod limiter;
pub mod phaser;
pub mod reverb;
pub mod saturator;
pub mod smoothing;
pub mod stereo_panner;

use strata_types::EffectKind;

/// Per-block stereo processing contract. Implementations own all DSP
/// memory (delay lines, filter history, envelope followers) — never the
/// control thread.
pub trait AudioEffect: Send {
    fn process(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32], sample_rate: f32);

    /// `index` is the effect-kind-specific parameter index from the
    /// registry's metadata table. Values are smoothed internally.
    fn set_param(&mut self, index: u32, value: f32);

    /// Clears DSP memory (delay lines, biquad/envelope history).
    fn reset(&mut self);

    /// Current gain reduction in dB, for metering. `0.0` for effects that
    /// don't reduce gain.
    fn gain_reduction_db(&self) -> f32 {
        0.0
    }
}

pub fn create_effect(kind: EffectKind, sample_rate: f32) -> Box<dyn AudioEffect> {
    match kind {
        EffectKind::ThreeBandEq => Box::new(eq::ThreeBandEq::new(sample_rate)),
        EffectKind::Compressor => Box::new(compressor::Compressor::new(sample_rate)),
        EffectKind::Saturator => Box::new(saturator::Saturator::new(sample_rate)),
        EffectKind::Limiter => Box::new(limiter::Limiter::new(sample_rate)),
        EffectKind::Clipper => Box::new(clipper::Clipper::new(sample_rate)),
        EffectKind::Reverb => Box::new(reverb::Reverb::new(sample_rate)),
        EffectKind::Delay => Box::new(delay::Delay::new(sample_rate)),
        EffectKind::Chorus => Box::new(chorus::Chorus::new(sample_rate)),
        EffectKind::Phaser => Box::new(phaser::Phaser::new(sample_rate)),
        EffectKind::StereoPanner => Box::new(stereo_panner::StereoPanner::new(sample_rate)),
    }
}

/// Runs NaN/Inf detection over a just-processed block (spec §7
/// `NumericFault`); returns `true` if a fault was found.
pub fn has_numeric_fault(buf_l: &[f32], buf_r: &[f32]) -> bool {
    buf_l.iter().chain(buf_r.iter()).any(|s| !s.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_constructs_every_kind() {
        for kind in EffectKind::ALL {
            let mut effect = create_effect(kind, 48_000.0);
            let in_l = [0.0f32; 8];
            let in_r = [0.0f32; 8];
            let mut out_l = [0.0f32; 8];
            let mut out_r = [0.0f32; 8];
            effect.process(&in_l, &in_r, &mut out_l, &mut out_r, 48_000.0);
            effect.reset();
        }
    }

    #[test]
    fn numeric_fault_detected() {
        assert!(has_numeric_fault(&[0.0, f32::NAN], &[0.0, 0.0]));
        assert!(!has_numeric_fault(&[0.0, 1.0], &[0.0, -1.0]));
    }
}
