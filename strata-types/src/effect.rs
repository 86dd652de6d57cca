use crate::ids::EffectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    ThreeBandEq,
    Compressor,
    Saturator,
    Limiter,
    Clipper,
    Reverb,
    Delay,
    Chorus,
    Phaser,
    StereoPanner,
}

impl EffectKind {
    pub const ALL: [EffectKind; 10] = [
        EffectKind::ThreeBandEq,
        EffectKind::Compressor,
        EffectKind::Saturator,
        EffectKind::Limiter,
        EffectKind::Clipper,
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Chorus,
        EffectKind::Phaser,
        EffectKind::StereoPanner,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::ThreeBandEq => "3-Band EQ",
            EffectKind::Compressor => "Compressor",
            EffectKind::Saturator => "Saturator",
            EffectKind::Limiter => "Limiter",
            EffectKind::Clipper => "Clipper",
            EffectKind::Reverb => "Reverb",
            EffectKind::Delay => "Delay",
            EffectKind::Chorus => "Chorus",
            EffectKind::Phaser => "Phaser",
            EffectKind::StereoPanner => "Stereo Panner",
        }
    }
}

/// A parameter descriptor in the effect registry's metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamMeta {
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

/// Descriptor for an inserted effect: identity plus the raw parameter
/// vector the control thread mutates. DSP memory (delay lines, filter
/// history) is not part of this type — it lives exclusively on the audio
/// thread, owned by the running effect instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub id: EffectId,
    pub kind: EffectKind,
    pub bypassed: bool,
    pub params: Vec<f32>,
}

impl EffectDescriptor {
    pub fn new(id: EffectId, kind: EffectKind, params: Vec<f32>) -> Self {
        EffectDescriptor {
            id,
            kind,
            bypassed: false,
            params,
        }
    }
}
