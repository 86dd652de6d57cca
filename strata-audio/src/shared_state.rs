//! The single shared-memory region crossing the control/audio boundary
//! (spec §4.1). Integer cells use sequentially-consistent atomics; float
//! cells are bit-punned into `AtomicU32` since stable Rust has no atomic
//! f32. Torn reads on the float cells are tolerable — they're continuously
//! republished every block, so a stale half-write is overwritten within a
//! block or two.

use crate::triple_buffer::{triple_buffer, TripleBufferHandle, TripleBufferWriter};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use strata_types::PlayState;

fn play_state_to_i32(s: PlayState) -> i32 {
    match s {
        PlayState::Stopped => 0,
        PlayState::Playing => 1,
        PlayState::Paused => 2,
    }
}

fn play_state_from_i32(v: i32) -> PlayState {
    match v {
        1 => PlayState::Playing,
        2 => PlayState::Paused,
        _ => PlayState::Stopped,
    }
}

/// Richer position readout published once per block by the audio thread,
/// consumed through the triple buffer by the Observations poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSnapshot {
    pub position_samples: f64,
    pub position_ticks: f64,
    pub active_voices: u32,
    pub cpu_load: f32,
}

struct Inner {
    play_state: AtomicI32,
    msg_counter: AtomicI32,
    bpm_bits: AtomicU32,
    loop_start_tick: AtomicI32,
    loop_end_tick: AtomicI32,
    loop_enabled: AtomicI32,
    sample_rate_bits: AtomicU32,
}

/// Control-side endpoint: writer of play state/bpm/loop, reader of position.
pub struct SharedStateControl {
    inner: Arc<Inner>,
    position: TripleBufferHandle<PositionSnapshot>,
}

/// Audio-side endpoint: reader of play state/bpm/loop, sole writer of position.
pub struct SharedStateAudio {
    inner: Arc<Inner>,
    position: TripleBufferWriter<PositionSnapshot>,
}

pub fn shared_state(sample_rate: f32, bpm: f32) -> (SharedStateControl, SharedStateAudio) {
    let inner = Arc::new(Inner {
        play_state: AtomicI32::new(play_state_to_i32(PlayState::Stopped)),
        msg_counter: AtomicI32::new(0),
        bpm_bits: AtomicU32::new(bpm.to_bits()),
        loop_start_tick: AtomicI32::new(0),
        loop_end_tick: AtomicI32::new(384 * 4),
        loop_enabled: AtomicI32::new(1),
        sample_rate_bits: AtomicU32::new(sample_rate.to_bits()),
    });
    let (position_writer, position_reader) = triple_buffer::<PositionSnapshot>();
    (
        SharedStateControl {
            inner: inner.clone(),
            position: position_reader.handle(),
        },
        SharedStateAudio {
            inner,
            position: position_writer,
        },
    )
}

impl SharedStateControl {
    pub fn set_play_state(&self, state: PlayState) {
        self.inner
            .play_state
            .store(play_state_to_i32(state), Ordering::SeqCst);
        self.bump_msg_counter();
    }

    pub fn play_state(&self) -> PlayState {
        play_state_from_i32(self.inner.play_state.load(Ordering::SeqCst))
    }

    pub fn set_bpm(&self, bpm: f32) {
        self.inner.bpm_bits.store(bpm.to_bits(), Ordering::Release);
        self.bump_msg_counter();
    }

    pub fn set_loop(&self, start_tick: i32, end_tick: i32, enabled: bool) {
        self.inner.loop_start_tick.store(start_tick, Ordering::SeqCst);
        self.inner.loop_end_tick.store(end_tick, Ordering::SeqCst);
        self.inner
            .loop_enabled
            .store(enabled as i32, Ordering::SeqCst);
        self.bump_msg_counter();
    }

    pub fn msg_counter(&self) -> i32 {
        self.inner.msg_counter.load(Ordering::SeqCst)
    }

    fn bump_msg_counter(&self) {
        self.inner.msg_counter.fetch_add(1, Ordering::SeqCst);
    }

    /// One-block-stale position snapshot for UI polling. Never busy-waits.
    pub fn position(&self) -> PositionSnapshot {
        self.position.read()
    }
}

impl SharedStateAudio {
    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.inner.bpm_bits.load(Ordering::Acquire))
    }

    pub fn loop_region(&self) -> (i32, i32, bool) {
        (
            self.inner.loop_start_tick.load(Ordering::SeqCst),
            self.inner.loop_end_tick.load(Ordering::SeqCst),
            self.inner.loop_enabled.load(Ordering::SeqCst) != 0,
        )
    }

    pub fn play_state(&self) -> PlayState {
        play_state_from_i32(self.inner.play_state.load(Ordering::SeqCst))
    }

    pub fn sample_rate(&self) -> f32 {
        f32::from_bits(self.inner.sample_rate_bits.load(Ordering::Acquire))
    }

    pub fn set_sample_rate(&self, sr: f32) {
        self.inner.sample_rate_bits.store(sr.to_bits(), Ordering::Release);
    }

    pub fn publish_position(&self, snapshot: PositionSnapshot) {
        self.position.write(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_roundtrips_through_bit_pun() {
        let (control, audio) = shared_state(48_000.0, 120.0);
        assert_eq!(audio.bpm(), 120.0);
        control.set_bpm(140.0);
        assert_eq!(audio.bpm(), 140.0);
    }

    #[test]
    fn play_state_roundtrips() {
        let (control, audio) = shared_state(48_000.0, 120.0);
        assert_eq!(audio.play_state(), PlayState::Stopped);
        control.set_play_state(PlayState::Playing);
        assert_eq!(audio.play_state(), PlayState::Playing);
    }

    #[test]
    fn position_is_audio_to_control_only() {
        let (control, audio) = shared_state(48_000.0, 120.0);
        audio.publish_position(PositionSnapshot {
            position_samples: 4800.0,
            position_ticks: 96.0,
            active_voices: 3,
            cpu_load: 0.1,
        });
        let snap = control.position();
        assert_eq!(snap.active_voices, 3);
        assert_eq!(snap.position_ticks, 96.0);
    }

    #[test]
    fn msg_counter_bumps_on_every_control_write() {
        let (control, _audio) = shared_state(48_000.0, 120.0);
        let before = control.msg_counter();
        control.set_bpm(100.0);
        control.set_loop(0, 16, true);
        assert_eq!(control.msg_counter(), before + 2);
    }
}
