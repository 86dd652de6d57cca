use crate::ids::{ChannelId, InstrumentId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    Sampler,
    Synth,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub attack_secs: f32,
    pub decay_secs: f32,
    pub sustain_level: f32,
    pub release_secs: f32,
    pub enabled: bool,
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope {
            attack_secs: 0.005,
            decay_secs: 0.08,
            sustain_level: 0.8,
            release_secs: 0.15,
            enabled: true,
        }
    }
}

impl Envelope {
    /// Declicked envelope for `enabled = false`: no attack, a short release
    /// so a disabled envelope still doesn't produce a hard edge.
    pub fn disabled() -> Self {
        Envelope {
            attack_secs: 0.0,
            decay_secs: 0.0,
            sustain_level: 1.0,
            release_secs: 0.010,
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceFilter {
    pub filter_type: FilterType,
    pub cutoff_hz: f32,
    pub q: f32,
    pub enabled: bool,
}

impl Default for VoiceFilter {
    fn default() -> Self {
        VoiceFilter {
            filter_type: FilterType::LowPass,
            cutoff_hz: 20_000.0,
            q: 0.707,
            enabled: false,
        }
    }
}

/// Shared-immutable sample buffer. The audio thread only ever reads through
/// an `Arc` clone; replacing an instrument's buffer is a pointer swap
/// delivered via command, and the old `Arc` drops once the last voice
/// referencing it releases (reference counting stands in for explicit
/// epoch-based reclamation of the buffer bytes themselves).
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub channels: u16,
    pub sample_rate: f32,
    pub frames: Arc<Vec<f32>>,
}

impl SampleBuffer {
    pub fn len_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.frames.len() / self.channels as usize
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    pub base_midi: u8,
    pub sample_start: f32,
    pub sample_end: f32,
    pub envelope: Envelope,
    pub filter: VoiceFilter,
    pub bass_boost: f32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        SamplerParams {
            base_midi: 60,
            sample_start: 0.0,
            sample_end: 1.0,
            envelope: Envelope::default(),
            filter: VoiceFilter::default(),
            bass_boost: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Instrument {
    pub id: InstrumentId,
    pub kind: InstrumentKind,
    pub mixer_channel_id: ChannelId,
    pub muted: bool,
    pub pitch_offset: i32,
    /// Stop prior voices of this instrument (short linear fade) on re-trigger.
    pub cut_itself: bool,
    pub sampler: SamplerParams,
    pub buffer: Option<SampleBuffer>,
}

impl Instrument {
    pub fn new(id: InstrumentId, kind: InstrumentKind, mixer_channel_id: ChannelId) -> Self {
        Instrument {
            id,
            kind,
            mixer_channel_id,
            muted: false,
            pitch_offset: 0,
            cut_itself: false,
            sampler: SamplerParams::default(),
            buffer: None,
        }
    }
}
