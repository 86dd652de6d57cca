//! Control-thread-facing API. Grounded on the teacher's `handle.rs`: a thin
//! struct wrapping the command channels plus whatever state the control
//! side needs to answer synchronously (here: a shadow mixer topology, so a
//! send/route that would cycle is rejected before it ever reaches the
//! audio thread, and the Scheduler, which always runs here).

use crate::commands::{AudioCmd, AudioFeedback};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::metering::{MeterFrame, MeterReader};
use crate::scheduler::{adaptive_horizon_secs, NoteMutation, Scheduler};
use crate::shared_state::{PositionSnapshot, SharedStateControl};
use crossbeam_channel::{Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use strata_types::{
    ArrangementClip, ChannelId, EffectId, EffectKind, Instrument, InstrumentId, MixerChannel,
    Note, NoteId, Pattern, PatternId, PlaybackMode, PlayState, Send as MixerSend, SampleBuffer,
    TimeGrid,
};

struct ShadowTopology {
    channels: HashMap<ChannelId, MixerChannel>,
}

impl ShadowTopology {
    fn new() -> Self {
        let mut channels = HashMap::new();
        channels.insert(ChannelId::MASTER, MixerChannel::master("Master"));
        ShadowTopology { channels }
    }

    fn edges(&self) -> HashMap<ChannelId, Vec<ChannelId>> {
        let mut adj: HashMap<ChannelId, Vec<ChannelId>> = HashMap::new();
        for (id, ch) in &self.channels {
            let mut targets = Vec::new();
            if let Some(out) = ch.output_target {
                targets.push(out);
            }
            targets.extend(ch.sends.iter().map(|s| s.target));
            adj.insert(*id, targets);
        }
        adj
    }

    fn would_cycle(&self, from: ChannelId, to: ChannelId) -> bool {
        let mut adj = self.edges();
        adj.entry(from).or_default().push(to);

        fn dfs(node: ChannelId, adj: &HashMap<ChannelId, Vec<ChannelId>>, visiting: &mut HashSet<ChannelId>, visited: &mut HashSet<ChannelId>) -> bool {
            if visiting.contains(&node) {
                return true;
            }
            if visited.contains(&node) {
                return false;
            }
            visiting.insert(node);
            if let Some(targets) = adj.get(&node) {
                for t in targets {
                    if dfs(*t, adj, visiting, visited) {
                        return true;
                    }
                }
            }
            visiting.remove(&node);
            visited.insert(node);
            false
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let keys: Vec<ChannelId> = adj.keys().copied().collect();
        keys.into_iter().any(|k| dfs(k, &adj, &mut visiting, &mut visited))
    }
}

pub struct AudioHandle {
    priority_tx: Sender<AudioCmd>,
    normal_tx: Sender<AudioCmd>,
    feedback_rx: Receiver<AudioFeedback>,
    meter: MeterReader,
    shared: SharedStateControl,
    scheduler: Scheduler,
    topology: ShadowTopology,
    grid: TimeGrid,
    config: EngineConfig,
    next_effect_id: EffectId,
}

impl AudioHandle {
    pub fn new(
        priority_tx: Sender<AudioCmd>,
        normal_tx: Sender<AudioCmd>,
        feedback_rx: Receiver<AudioFeedback>,
        meter: MeterReader,
        shared: SharedStateControl,
        scheduler: Scheduler,
        grid: TimeGrid,
        config: EngineConfig,
    ) -> Self {
        AudioHandle {
            priority_tx,
            normal_tx,
            feedback_rx,
            meter,
            shared,
            scheduler,
            topology: ShadowTopology::new(),
            grid,
            config,
            next_effect_id: 1,
        }
    }

    fn send_priority(&self, cmd: AudioCmd) -> EngineResult<()> {
        self.priority_tx
            .try_send(cmd)
            .map_err(|_| EngineError::ResourceExhausted("priority command ring full".into()))
    }

    fn send_normal(&self, cmd: AudioCmd) -> EngineResult<()> {
        self.normal_tx
            .try_send(cmd)
            .map_err(|_| EngineError::ResourceExhausted("command ring full".into()))
    }

    // --- Transport ---

    /// Starts playback. `from` resumes at that tick when given; otherwise a
    /// paused transport keeps its tick and a stopped one starts at the loop
    /// region's start tick (spec §4.2, §6).
    pub fn play(&self, from: Option<i64>) -> EngineResult<()> {
        self.shared.set_play_state(PlayState::Playing);
        self.send_priority(AudioCmd::SetPlayState { state: PlayState::Playing, from })
    }

    /// Stops playback and flushes every scheduled event so nothing from
    /// before the stop can re-fire once a later play resumes the clock
    /// (spec §4.2).
    pub fn stop(&mut self) -> EngineResult<()> {
        self.shared.set_play_state(PlayState::Stopped);
        self.scheduler.cancel_all();
        self.send_priority(AudioCmd::SetPlayState { state: PlayState::Stopped, from: None })?;
        self.send_priority(AudioCmd::CancelAllEvents)
    }

    pub fn pause(&self) -> EngineResult<()> {
        self.shared.set_play_state(PlayState::Paused);
        self.send_priority(AudioCmd::SetPlayState { state: PlayState::Paused, from: None })
    }

    pub fn seek_ticks(&self, tick: i64) -> EngineResult<()> {
        self.send_priority(AudioCmd::SeekTicks(tick))
    }

    pub fn set_bpm(&mut self, bpm: f32) -> EngineResult<()> {
        self.grid.bpm = bpm;
        self.shared.set_bpm(bpm);
        self.send_priority(AudioCmd::SetBpm(bpm))
    }

    pub fn set_time_signature(&mut self, num: u32, den: u32) -> EngineResult<()> {
        self.grid.time_signature_num = num;
        self.grid.time_signature_den = den;
        self.send_normal(AudioCmd::SetTimeSignature { num, den })
    }

    pub fn set_loop(&self, start_tick: i64, end_tick: i64, enabled: bool) -> EngineResult<()> {
        if end_tick <= start_tick {
            return Err(EngineError::InvalidArgument("loop end must be after start".into()));
        }
        self.shared.set_loop(start_tick as i32, end_tick as i32, enabled);
        self.send_priority(AudioCmd::SetLoop { start_tick, end_tick, enabled })
    }

    pub fn position(&self) -> PositionSnapshot {
        self.shared.position()
    }

    pub fn play_state(&self) -> PlayState {
        self.shared.play_state()
    }

    // --- Instruments ---

    pub fn create_instrument(&self, instrument: Instrument) -> EngineResult<()> {
        self.send_normal(AudioCmd::CreateInstrument(instrument))
    }

    pub fn remove_instrument(&self, id: InstrumentId) -> EngineResult<()> {
        self.send_normal(AudioCmd::RemoveInstrument(id))
    }

    pub fn set_instrument_muted(&self, id: InstrumentId, muted: bool) -> EngineResult<()> {
        self.send_normal(AudioCmd::SetInstrumentMuted(id, muted))
    }

    pub fn set_instrument_pitch_offset(&self, id: InstrumentId, offset: i32) -> EngineResult<()> {
        self.send_normal(AudioCmd::SetInstrumentPitchOffset(id, offset))
    }

    pub fn set_cut_itself(&self, id: InstrumentId, cut_itself: bool) -> EngineResult<()> {
        self.send_normal(AudioCmd::SetCutItself(id, cut_itself))
    }

    pub fn attach_buffer(&self, id: InstrumentId, buffer: Arc<SampleBuffer>) -> EngineResult<()> {
        self.send_normal(AudioCmd::AttachBuffer(id, buffer))
    }

    // --- Voices ---

    pub fn spawn_voice(&self, instrument: InstrumentId, note_id: NoteId, pitch: u8, velocity: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::SpawnVoice { instrument, note_id, pitch, velocity })
    }

    pub fn release_voice(&self, instrument: InstrumentId, note_id: NoteId) -> EngineResult<()> {
        self.send_priority(AudioCmd::ReleaseVoice { instrument, note_id })
    }

    pub fn release_all_voices(&self) -> EngineResult<()> {
        self.send_priority(AudioCmd::ReleaseAllVoices)
    }

    pub fn audition_on(&self, instrument: InstrumentId, pitch: u8, velocity: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::AuditionOn { instrument, pitch, velocity })
    }

    pub fn audition_off(&self, instrument: InstrumentId, pitch: u8) -> EngineResult<()> {
        self.send_priority(AudioCmd::AuditionOff { instrument, pitch })
    }

    // --- Mixer graph ---

    pub fn create_channel(&mut self, descriptor: MixerChannel) -> EngineResult<()> {
        if self.topology.channels.contains_key(&descriptor.id) {
            return Err(EngineError::InvalidArgument(format!("channel {} already exists", descriptor.id)));
        }
        self.topology.channels.insert(descriptor.id, descriptor.clone());
        self.send_normal(AudioCmd::CreateChannel(descriptor))
    }

    pub fn remove_channel(&mut self, id: ChannelId) -> EngineResult<()> {
        if id.is_master() {
            return Err(EngineError::GraphError("cannot remove the Master channel".into()));
        }
        self.topology.channels.remove(&id);
        self.send_normal(AudioCmd::RemoveChannel(id))
    }

    pub fn set_channel_gain(&self, id: ChannelId, gain_db: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetChannelGain(id, gain_db))
    }

    pub fn set_channel_pan(&self, id: ChannelId, pan: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetChannelPan(id, pan.clamp(-1.0, 1.0)))
    }

    pub fn set_channel_mute(&self, id: ChannelId, muted: bool) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetChannelMute(id, muted))
    }

    pub fn set_channel_solo(&self, id: ChannelId, soloed: bool) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetChannelSolo(id, soloed))
    }

    pub fn set_channel_mono(&self, id: ChannelId, mono: bool) -> EngineResult<()> {
        self.send_normal(AudioCmd::SetChannelMono(id, mono))
    }

    pub fn set_master_volume(&self, gain_db: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetMasterVolume(gain_db))
    }

    pub fn create_send(&mut self, src: ChannelId, send: MixerSend) -> EngineResult<()> {
        if self.topology.would_cycle(src, send.target) {
            return Err(EngineError::GraphError(format!("send {src} -> {} would cycle", send.target)));
        }
        if let Some(ch) = self.topology.channels.get_mut(&src) {
            ch.sends.push(send);
        }
        self.send_normal(AudioCmd::CreateSend { src, send })
    }

    pub fn remove_send(&mut self, src: ChannelId, dst: ChannelId) -> EngineResult<()> {
        if let Some(ch) = self.topology.channels.get_mut(&src) {
            ch.sends.retain(|s| s.target != dst);
        }
        self.send_normal(AudioCmd::RemoveSend { src, dst })
    }

    pub fn route_instrument_to_channel(&self, instrument: InstrumentId, channel: ChannelId) -> EngineResult<()> {
        self.send_normal(AudioCmd::RouteInstrumentToChannel(instrument, channel))
    }

    // --- Effects ---

    pub fn add_effect(&mut self, channel: ChannelId, kind: EffectKind, params: Vec<f32>) -> EngineResult<EffectId> {
        let effect_id = self.next_effect_id;
        self.next_effect_id += 1;
        self.send_normal(AudioCmd::AddEffect { channel, kind, params, effect_id })?;
        Ok(effect_id)
    }

    pub fn remove_effect(&self, channel: ChannelId, effect_id: EffectId) -> EngineResult<()> {
        self.send_normal(AudioCmd::RemoveEffect { channel, effect_id })
    }

    pub fn toggle_bypass(&self, channel: ChannelId, effect_id: EffectId) -> EngineResult<()> {
        self.send_priority(AudioCmd::ToggleBypass { channel, effect_id })
    }

    pub fn set_effect_param(&self, channel: ChannelId, effect_id: EffectId, param_index: u32, value: f32) -> EngineResult<()> {
        self.send_priority(AudioCmd::SetEffectParam { channel, effect_id, param_index, value })
    }

    pub fn reorder_effect(&self, channel: ChannelId, src_idx: usize, dst_idx: usize) -> EngineResult<()> {
        self.send_normal(AudioCmd::ReorderEffect { channel, src_idx, dst_idx })
    }

    // --- Scheduling ---

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.scheduler.set_playback_mode(mode);
    }

    pub fn set_active_pattern(&mut self, pattern_id: PatternId) {
        self.scheduler.set_active_pattern(pattern_id);
    }

    pub fn note_mutated(&mut self, instrument: InstrumentId, note_id: NoteId, kind: NoteMutation) {
        self.scheduler.on_note_mutation(instrument, note_id, kind);
    }

    pub fn cancel_all_events(&mut self) -> EngineResult<()> {
        self.scheduler.cancel_all();
        self.send_priority(AudioCmd::CancelAllEvents)
    }

    /// Drives the pattern-mode scheduler horizon from the current, audio
    /// thread-reported transport position. Call this regularly (e.g. once
    /// per UI frame) while in `PlaybackMode::Pattern`.
    pub fn tick_pattern_scheduler(
        &mut self,
        pattern: &Pattern,
        loop_start_tick: i64,
        loop_len_ticks: i64,
        max_plugin_latency_secs: f32,
    ) -> EngineResult<()> {
        let now_ticks = self.shared.position().position_ticks;
        let horizon = adaptive_horizon_secs(self.grid.bpm, self.config.min_horizon_secs, self.config.max_horizon_secs);
        let events = self.scheduler.schedule_pattern_mode(
            pattern,
            &self.grid,
            now_ticks,
            loop_start_tick,
            loop_len_ticks,
            horizon,
            max_plugin_latency_secs,
            self.config.min_pre_delay_secs,
        );
        if events.is_empty() {
            return Ok(());
        }
        self.send_priority(AudioCmd::PushEvents(events))
    }

    pub fn tick_song_scheduler(
        &mut self,
        clips: &[ArrangementClip],
        patterns: &HashMap<PatternId, Pattern>,
        max_plugin_latency_secs: f32,
    ) -> EngineResult<()> {
        let now_ticks = self.shared.position().position_ticks;
        let horizon = adaptive_horizon_secs(self.grid.bpm, self.config.min_horizon_secs, self.config.max_horizon_secs);
        let events = self.scheduler.schedule_song_mode(
            clips,
            patterns,
            &self.grid,
            now_ticks,
            horizon,
            max_plugin_latency_secs,
            self.config.min_pre_delay_secs,
        );
        if events.is_empty() {
            return Ok(());
        }
        self.send_priority(AudioCmd::PushEvents(events))
    }

    pub fn schedule_live_note(&mut self, instrument: InstrumentId, note: &Note) -> EngineResult<()> {
        let snapshot = self.shared.position();
        let now_secs = snapshot.position_ticks * self.grid.seconds_per_tick();
        let horizon = adaptive_horizon_secs(self.grid.bpm, self.config.min_horizon_secs, self.config.max_horizon_secs);
        if let Some(event) = self
            .scheduler
            .schedule_live_added_note(instrument, note, &self.grid, now_secs, now_secs + horizon as f64)
        {
            return self.send_priority(AudioCmd::PushEvents(vec![event]));
        }
        Ok(())
    }

    // --- Observation ---

    pub fn poll_feedback(&self) -> Vec<AudioFeedback> {
        self.feedback_rx.try_iter().collect()
    }

    pub fn poll_meters(&self) -> Vec<MeterFrame> {
        self.meter.drain_latest()
    }

    pub fn shutdown(&self) -> EngineResult<()> {
        self.send_priority(AudioCmd::Shutdown)
    }
}
