//! Control -> audio command set. Dispatched over two channels — priority
//! and normal — so time-critical transport/voice/param messages never sit
//! behind a bulk routing rebuild (spec §4.1, §7 `ResourceExhausted`).

use std::sync::Arc;
use strata_types::{
    ChannelId, EffectDescriptor, EffectId, EffectKind, InstrumentId, MixerChannel, NoteId,
    PlayState, Send as MixerSend, SampleBuffer,
};

#[derive(Debug, Clone)]
pub enum AudioCmd {
    // Transport
    SetPlayState { state: PlayState, from: Option<i64> },
    SeekTicks(i64),
    SetBpm(f32),
    SetTimeSignature { num: u32, den: u32 },
    SetLoop { start_tick: i64, end_tick: i64, enabled: bool },

    // Instruments
    CreateInstrument(strata_types::Instrument),
    RemoveInstrument(InstrumentId),
    SetInstrumentMuted(InstrumentId, bool),
    SetInstrumentPitchOffset(InstrumentId, i32),
    SetCutItself(InstrumentId, bool),
    AttachBuffer(InstrumentId, Arc<SampleBuffer>),

    // Voices (time-critical)
    SpawnVoice { instrument: InstrumentId, note_id: NoteId, pitch: u8, velocity: f32 },
    ReleaseVoice { instrument: InstrumentId, note_id: NoteId },
    ReleaseAllVoices,
    AuditionOn { instrument: InstrumentId, pitch: u8, velocity: f32 },
    AuditionOff { instrument: InstrumentId, pitch: u8 },

    // Mixer graph
    CreateChannel(MixerChannel),
    RemoveChannel(ChannelId),
    RouteInstrumentToChannel(InstrumentId, ChannelId),
    SetChannelGain(ChannelId, f32),
    SetChannelPan(ChannelId, f32),
    SetChannelMute(ChannelId, bool),
    SetChannelSolo(ChannelId, bool),
    SetChannelMono(ChannelId, bool),
    SetMasterVolume(f32),
    CreateSend { src: ChannelId, send: MixerSend },
    RemoveSend { src: ChannelId, dst: ChannelId },
    RebuildRouting(Vec<MixerChannel>),

    // Effects
    AddEffect { channel: ChannelId, kind: EffectKind, params: Vec<f32>, effect_id: EffectId },
    RemoveEffect { channel: ChannelId, effect_id: EffectId },
    ToggleBypass { channel: ChannelId, effect_id: EffectId },
    SetEffectParam { channel: ChannelId, effect_id: EffectId, param_index: u32, value: f32 },
    ReorderEffect { channel: ChannelId, src_idx: usize, dst_idx: usize },

    // Scheduling (produced by the scheduler, consumed by the audio thread)
    PushEvents(Vec<strata_types::ScheduledEvent>),
    CancelAllEvents,
    BumpEpoch,

    Shutdown,
}

impl AudioCmd {
    /// Bulk/structural commands (routing rebuilds, full effect lists) are
    /// NOT priority: they can tolerate the back-pressure of waiting behind
    /// already-queued time-critical messages, and marking them priority
    /// would let a large rebuild starve voice spawn/release on the same
    /// channel.
    pub fn is_priority(&self) -> bool {
        matches!(
            self,
            AudioCmd::SetPlayState { .. }
                | AudioCmd::SeekTicks(_)
                | AudioCmd::SetBpm(_)
                | AudioCmd::SetLoop { .. }
                | AudioCmd::SpawnVoice { .. }
                | AudioCmd::ReleaseVoice { .. }
                | AudioCmd::ReleaseAllVoices
                | AudioCmd::AuditionOn { .. }
                | AudioCmd::AuditionOff { .. }
                | AudioCmd::SetChannelGain(..)
                | AudioCmd::SetChannelPan(..)
                | AudioCmd::SetChannelMute(..)
                | AudioCmd::SetChannelSolo(..)
                | AudioCmd::SetEffectParam { .. }
                | AudioCmd::ToggleBypass { .. }
                | AudioCmd::PushEvents(_)
                | AudioCmd::CancelAllEvents
                | AudioCmd::BumpEpoch
                | AudioCmd::Shutdown
        )
    }
}

/// Feedback sent from the audio thread back to the control thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFeedback {
    Fault(crate::error::EngineFault),
    VoiceFinished { instrument: InstrumentId, note_id: NoteId },
    GraphRejected { reason: String },
}
