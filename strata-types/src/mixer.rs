use crate::effect::EffectDescriptor;
use crate::ids::ChannelId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    Track,
    Bus,
    Master,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Send {
    pub target: ChannelId,
    pub level: f32,
    pub pre_fader: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerChannel {
    pub id: ChannelId,
    pub kind: ChannelKind,
    pub label: String,
    pub gain_db: f32,
    pub pan: f32,
    pub muted: bool,
    pub soloed: bool,
    pub mono: bool,
    pub inserts: Vec<EffectDescriptor>,
    pub sends: Vec<Send>,
    pub output_target: Option<ChannelId>,
}

impl MixerChannel {
    pub fn new(id: ChannelId, kind: ChannelKind, label: impl Into<String>) -> Self {
        MixerChannel {
            id,
            kind,
            label: label.into(),
            gain_db: 0.0,
            pan: 0.0,
            muted: false,
            soloed: false,
            mono: false,
            inserts: Vec::new(),
            sends: Vec::new(),
            output_target: if kind == ChannelKind::Master {
                None
            } else {
                Some(ChannelId::MASTER)
            },
        }
    }

    pub fn master(label: impl Into<String>) -> Self {
        MixerChannel::new(ChannelId::MASTER, ChannelKind::Master, label)
    }

    pub fn linear_gain(&self) -> f32 {
        10f32.powf(self.gain_db / 20.0)
    }
}
