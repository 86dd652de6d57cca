use strata_types::Envelope as EnvelopeParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

const FINISHED_FLOOR_DB: f32 = -96.0;

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeState {
    stage: EnvelopeStage,
    level: f32,
    params: EnvelopeParams,
    sample_rate: f32,
}

impl EnvelopeState {
    pub fn new(params: EnvelopeParams, sample_rate: f32) -> Self {
        EnvelopeState {
            stage: EnvelopeStage::Attack,
            level: 0.0,
            params,
            sample_rate,
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn note_off(&mut self) {
        if self.stage != EnvelopeStage::Finished {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Advance by one sample, returning the current amplitude multiplier.
    pub fn tick(&mut self) -> f32 {
        let sr = self.sample_rate.max(1.0);
        match self.stage {
            EnvelopeStage::Attack => {
                let rate = if self.params.attack_secs > 0.0 {
                    1.0 / (self.params.attack_secs * sr)
                } else {
                    1.0
                };
                self.level += rate;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let target = self.params.sustain_level;
                let rate = if self.params.decay_secs > 0.0 {
                    (1.0 - target) / (self.params.decay_secs * sr)
                } else {
                    1.0
                };
                self.level -= rate;
                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.level = self.params.sustain_level;
            }
            EnvelopeStage::Release => {
                let rate = if self.params.release_secs > 0.0 {
                    self.level / (self.params.release_secs * sr)
                } else {
                    self.level
                };
                self.level -= rate.max(1e-6);
                if self.level <= 0.0 || db(self.level) < FINISHED_FLOOR_DB {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Finished;
                }
            }
            EnvelopeStage::Finished => {
                self.level = 0.0;
            }
        }
        self.level
    }

    pub fn is_finished(&self) -> bool {
        self.stage == EnvelopeStage::Finished
    }
}

fn db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_attack_at_zero() {
        let env = EnvelopeState::new(EnvelopeParams::default(), 48_000.0);
        assert_eq!(env.stage(), EnvelopeStage::Attack);
        assert_eq!(env.level(), 0.0);
    }

    #[test]
    fn reaches_sustain_eventually() {
        let mut env = EnvelopeState::new(
            EnvelopeParams {
                attack_secs: 0.001,
                decay_secs: 0.001,
                sustain_level: 0.5,
                release_secs: 0.1,
                enabled: true,
            },
            48_000.0,
        );
        for _ in 0..1000 {
            env.tick();
        }
        assert_eq!(env.stage(), EnvelopeStage::Sustain);
        assert!((env.level() - 0.5).abs() < 1e-3);
    }

    #[test]
    fn release_eventually_finishes() {
        let mut env = EnvelopeState::new(
            EnvelopeParams {
                attack_secs: 0.0,
                decay_secs: 0.0,
                sustain_level: 1.0,
                release_secs: 0.01,
                enabled: true,
            },
            48_000.0,
        );
        env.tick();
        env.note_off();
        for _ in 0..48_000 {
            env.tick();
            if env.is_finished() {
                break;
            }
        }
        assert!(env.is_finished());
    }

    #[test]
    fn disabled_envelope_declicks_with_short_release() {
        let params = EnvelopeParams::disabled();
        assert_eq!(params.attack_secs, 0.0);
        assert!(params.release_secs > 0.0);
    }
}
