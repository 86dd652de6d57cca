//! Translates pattern/arrangement data plus Transport state into a
//! time-ordered horizon of `NoteOn`/`NoteOff` events (spec §4.3). Runs on
//! the control thread; the Scheduler is a pure function of
//! `(data, transport state)` — it never advances time itself (spec §9).

use std::collections::HashMap;
use strata_types::{
    ArrangementClip, EventPayload, EventPriority, InstrumentId, NoteId, Pattern, PlaybackMode,
    ScheduledEvent, TimeGrid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMutation {
    Added,
    Removed,
    Modified,
}

/// Adaptive lookahead window: smaller at high tempo, larger when event
/// density is low. `bpm_reference` is the tempo at which `max` applies;
/// above it the horizon shrinks linearly down to `min`.
pub fn adaptive_horizon_secs(bpm: f32, min: f32, max: f32) -> f32 {
    let bpm_reference = 60.0_f32;
    if bpm <= bpm_reference {
        max
    } else {
        let t = ((bpm - bpm_reference) / (200.0 - bpm_reference)).clamp(0.0, 1.0);
        max - t * (max - min)
    }
}

pub struct Scheduler {
    epoch: u64,
    playback_mode: PlaybackMode,
    active_pattern: Option<u32>,
    next_onset_by_note: HashMap<(InstrumentId, NoteId), f64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            epoch: 0,
            playback_mode: PlaybackMode::Pattern,
            active_pattern: None,
            next_onset_by_note: HashMap::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn set_playback_mode(&mut self, mode: PlaybackMode) {
        self.playback_mode = mode;
    }

    pub fn set_active_pattern(&mut self, pattern_id: u32) {
        self.active_pattern = Some(pattern_id);
    }

    /// Cancels all pending events via an epoch bump; the audio thread drops
    /// any event tagged with an older epoch (spec §4.3 Cancellation).
    pub fn cancel_all(&mut self) {
        self.epoch += 1;
        self.next_onset_by_note.clear();
    }

    pub fn on_note_mutation(&mut self, instrument: InstrumentId, note_id: NoteId, kind: NoteMutation) {
        match kind {
            NoteMutation::Removed | NoteMutation::Modified => {
                self.next_onset_by_note.remove(&(instrument, note_id));
            }
            NoteMutation::Added => {}
        }
    }

    /// Produces the events due in `[now_secs + delta, now_secs + delta + horizon]`
    /// in pattern mode, where `now_ticks` is the transport's current tick.
    pub fn schedule_pattern_mode(
        &mut self,
        pattern: &Pattern,
        grid: &TimeGrid,
        now_ticks: f64,
        loop_start_tick: i64,
        loop_len_ticks: i64,
        horizon_secs: f32,
        max_plugin_latency_secs: f32,
        min_pre_delay_secs: f32,
    ) -> Vec<ScheduledEvent> {
        let delta = min_pre_delay_secs.max(max_plugin_latency_secs + min_pre_delay_secs);
        let seconds_per_tick = grid.seconds_per_tick();
        let now_secs = now_ticks * seconds_per_tick;
        let window_start = now_secs + delta as f64;
        let window_end = window_start + horizon_secs as f64;
        let loop_len = loop_len_ticks.max(1);

        let mut events = Vec::new();
        for (&instrument, notes) in pattern.notes.iter() {
            for note in notes {
                let note_tick = note.step_start as i64 * grid.ticks_per_step() as i64;
                // Next onset: loopStart + ((noteTick - loopStart) mod loopLen) + k*loopLen
                let phase = ((note_tick - loop_start_tick).rem_euclid(loop_len)) as f64;
                let base_onset_tick = loop_start_tick as f64 + phase;
                let base_onset_secs = base_onset_tick * seconds_per_tick;
                let loop_len_secs = loop_len as f64 * seconds_per_tick;

                let mut onset_secs = base_onset_secs;
                if onset_secs < window_start {
                    let k = ((window_start - onset_secs) / loop_len_secs).ceil();
                    onset_secs += k * loop_len_secs;
                }

                while onset_secs <= window_end {
                    events.push(ScheduledEvent {
                        time_secs: onset_secs,
                        target_instrument: instrument,
                        priority: EventPriority::NoteOn,
                        payload: EventPayload::NoteOn {
                            note_id: note.id,
                            pitch: note.pitch,
                            velocity: note.velocity,
                        },
                        epoch: self.epoch,
                    });
                    if note.duration_steps > 0 {
                        let duration_secs =
                            note.duration_steps as f64 * grid.ticks_per_step() as f64 * seconds_per_tick;
                        events.push(ScheduledEvent {
                            time_secs: onset_secs + duration_secs,
                            target_instrument: instrument,
                            priority: EventPriority::NoteOff,
                            payload: EventPayload::NoteOff { note_id: note.id },
                            epoch: self.epoch,
                        });
                    }
                    onset_secs += loop_len_secs;
                }
            }
        }
        events.sort();
        events
    }

    /// Song mode: iterate clips whose span intersects the horizon window,
    /// offsetting pattern notes by clip start/offset.
    pub fn schedule_song_mode(
        &mut self,
        clips: &[ArrangementClip],
        patterns: &HashMap<u32, Pattern>,
        grid: &TimeGrid,
        now_ticks: f64,
        horizon_secs: f32,
        max_plugin_latency_secs: f32,
        min_pre_delay_secs: f32,
    ) -> Vec<ScheduledEvent> {
        let delta = min_pre_delay_secs.max(max_plugin_latency_secs + min_pre_delay_secs);
        let seconds_per_tick = grid.seconds_per_tick();
        let now_secs = now_ticks * seconds_per_tick;
        let window_start_secs = now_secs + delta as f64;
        let window_end_secs = window_start_secs + horizon_secs as f64;
        let window_start_step = (window_start_secs / grid.seconds_per_step()) as u32;
        let window_end_step = (window_end_secs / grid.seconds_per_step()).ceil() as u32;

        let mut events = Vec::new();
        for clip in clips {
            if !clip.intersects(window_start_step, window_end_step) {
                continue;
            }
            let Some(pattern) = patterns.get(&clip.pattern_id) else {
                log::warn!(target: "audio::scheduler", "song mode: missing pattern {}", clip.pattern_id);
                continue;
            };
            for (&instrument, notes) in pattern.notes.iter() {
                for note in notes {
                    let clip_local_step = note.step_start.wrapping_sub(clip.offset_steps);
                    if clip_local_step >= clip.length_steps {
                        continue;
                    }
                    let absolute_step = clip.start_step + clip_local_step;
                    let onset_secs = absolute_step as f64 * grid.seconds_per_step();
                    if onset_secs < window_start_secs || onset_secs > window_end_secs {
                        continue;
                    }
                    events.push(ScheduledEvent {
                        time_secs: onset_secs,
                        target_instrument: instrument,
                        priority: EventPriority::NoteOn,
                        payload: EventPayload::NoteOn {
                            note_id: note.id,
                            pitch: note.pitch,
                            velocity: note.velocity,
                        },
                        epoch: self.epoch,
                    });
                    if note.duration_steps > 0 {
                        let duration_secs = note.duration_steps as f64 * grid.seconds_per_step();
                        events.push(ScheduledEvent {
                            time_secs: onset_secs + duration_secs,
                            target_instrument: instrument,
                            priority: EventPriority::NoteOff,
                            payload: EventPayload::NoteOff { note_id: note.id },
                            epoch: self.epoch,
                        });
                    }
                }
            }
        }
        events.sort();
        events
    }

    /// A note added during playback: schedule immediately if its next onset
    /// falls inside the horizon; skip (not retro-trigger) if it's already
    /// in the past relative to `now_secs`.
    pub fn schedule_live_added_note(
        &self,
        instrument: InstrumentId,
        note: &strata_types::Note,
        grid: &TimeGrid,
        now_secs: f64,
        horizon_end_secs: f64,
    ) -> Option<ScheduledEvent> {
        let onset_secs = note.step_start as f64 * grid.seconds_per_step();
        if onset_secs < now_secs || onset_secs > horizon_end_secs {
            return None;
        }
        Some(ScheduledEvent {
            time_secs: onset_secs,
            target_instrument: instrument,
            priority: EventPriority::NoteOn,
            payload: EventPayload::NoteOn {
                note_id: note.id,
                pitch: note.pitch,
                velocity: note.velocity,
            },
            epoch: self.epoch,
        })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::Note;

    fn grid() -> TimeGrid {
        TimeGrid::default().with_bpm(120.0)
    }

    #[test]
    fn pattern_mode_basic_loop_scenario() {
        // BPM=120, loop 0..16 steps, instrument K note at step 0 dur 1 step.
        let mut pattern = Pattern::new(1, 16);
        pattern.add_note(
            7,
            Note {
                id: 1,
                step_start: 0,
                duration_steps: 1,
                pitch: 60,
                velocity: 1.0,
            },
        );
        let grid = grid();
        let mut sched = Scheduler::new();
        let loop_len_ticks = 16 * grid.ticks_per_step() as i64;
        let events = sched.schedule_pattern_mode(&pattern, &grid, 0.0, 0, loop_len_ticks, 0.150, 0.0, 0.010);
        let onsets: Vec<f64> = events
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::NoteOn { .. }))
            .map(|e| e.time_secs)
            .collect();
        assert!(!onsets.is_empty());
        assert!(onsets[0] >= 0.010);
    }

    #[test]
    fn adaptive_horizon_shrinks_at_high_tempo() {
        let low = adaptive_horizon_secs(60.0, 0.050, 0.200);
        let high = adaptive_horizon_secs(200.0, 0.050, 0.200);
        assert_eq!(low, 0.200);
        assert_eq!(high, 0.050);
    }

    #[test]
    fn live_added_note_in_future_schedules() {
        let sched = Scheduler::new();
        let grid = grid();
        let note = Note {
            id: 5,
            step_start: 10,
            duration_steps: 1,
            pitch: 64,
            velocity: 0.8,
        };
        let now_secs = 0.0;
        let horizon_end = now_secs + 0.200;
        let result = sched.schedule_live_added_note(1, &note, &grid, now_secs, horizon_end);
        assert!(result.is_some());
    }

    #[test]
    fn live_added_note_in_past_is_skipped() {
        let sched = Scheduler::new();
        let grid = grid();
        let note = Note {
            id: 5,
            step_start: 0,
            duration_steps: 1,
            pitch: 64,
            velocity: 0.8,
        };
        // 5ms in the past of current position.
        let now_secs = 0.010;
        let result = sched.schedule_live_added_note(1, &note, &grid, now_secs, now_secs + 0.200);
        assert!(result.is_none());
    }

    #[test]
    fn cancel_all_bumps_epoch() {
        let mut sched = Scheduler::new();
        let before = sched.epoch();
        sched.cancel_all();
        assert_eq!(sched.epoch(), before + 1);
    }
}
