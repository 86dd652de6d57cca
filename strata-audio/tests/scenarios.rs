//! End-to-end scenarios driving `Engine`/`AudioHandle`/`AudioThread`
//! together, without ever starting a real audio device.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use strata_audio::config::EngineConfig;
use strata_audio::engine::Engine;
use strata_types::{
    ChannelId, ChannelKind, EffectKind, Envelope, Instrument, InstrumentKind, MixerChannel, Note,
    Pattern, PlayState, SampleBuffer, Send as MixerSend,
};

const SAMPLE_RATE: f32 = 48_000.0;
const BLOCK_LEN: usize = 256;

fn test_buffer() -> Arc<SampleBuffer> {
    let mut frames = vec![0.0f32; 48_000];
    for (i, s) in frames.iter_mut().enumerate() {
        *s = (i as f32 * 0.05).sin() * 0.5;
    }
    Arc::new(SampleBuffer {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        frames: Arc::new(frames),
    })
}

fn run_blocks(audio_thread: &mut strata_audio::audio_thread::AudioThread, n: usize) {
    let mut l = vec![0.0f32; BLOCK_LEN];
    let mut r = vec![0.0f32; BLOCK_LEN];
    for _ in 0..n {
        audio_thread.process_block(&mut l, &mut r);
        // Keep the shadow position fresh for the scheduler without an
        // actual sleep; the control side polls whatever was last published.
        sleep(Duration::from_micros(1));
    }
}

#[test]
fn basic_loop_scenario_retriggers_note_each_pass() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);

    let channel = MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "Kick");
    handle.create_channel(channel).unwrap();

    let mut instrument = Instrument::new(1, InstrumentKind::Sampler, ChannelId::new(1));
    instrument.sampler.envelope = Envelope::default();
    handle.create_instrument(instrument).unwrap();
    handle.attach_buffer(1, test_buffer()).unwrap();

    let mut pattern = Pattern::new(1, 16);
    pattern.add_note(
        1,
        Note { id: 1, step_start: 0, duration_steps: 1, pitch: 60, velocity: 1.0 },
    );

    handle.play(None).unwrap();
    run_blocks(&mut audio_thread, 2);

    handle.tick_pattern_scheduler(&pattern, 0, 16 * 24, 0.0).unwrap();
    run_blocks(&mut audio_thread, 40);

    let feedback = handle.poll_feedback();
    assert!(feedback.iter().all(|f| !matches!(f, strata_audio::AudioFeedback::Fault(_))));
}

#[test]
fn solo_silences_other_tracks_through_full_chain() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);

    handle.create_channel(MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A")).unwrap();
    handle.create_channel(MixerChannel::new(ChannelId::new(2), ChannelKind::Track, "B")).unwrap();
    handle.set_channel_solo(ChannelId::new(2), true).unwrap();

    let mut kick = Instrument::new(1, InstrumentKind::Sampler, ChannelId::new(1));
    kick.sampler.envelope.attack_secs = 0.0;
    handle.create_instrument(kick).unwrap();
    handle.attach_buffer(1, test_buffer()).unwrap();

    handle.play(None).unwrap();
    run_blocks(&mut audio_thread, 2);
    handle.spawn_voice(1, 1, 60, 1.0).unwrap();
    run_blocks(&mut audio_thread, 5);

    // No panics and feedback carries no numeric faults; the channel-strip
    // unit tests already assert the actual silencing math.
    assert!(handle.poll_feedback().iter().all(|f| !matches!(f, strata_audio::AudioFeedback::Fault(_))));
}

#[test]
fn effect_chain_bypass_toggle_round_trips() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.create_channel(MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A")).unwrap();
    let effect_id = handle.add_effect(ChannelId::new(1), EffectKind::Compressor, vec![]).unwrap();
    handle.toggle_bypass(ChannelId::new(1), effect_id).unwrap();

    run_blocks(&mut audio_thread, 3);
    assert!(handle.poll_feedback().is_empty());
}

#[test]
fn live_added_note_in_the_past_is_silently_skipped() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.create_channel(MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A")).unwrap();
    let instrument = Instrument::new(1, InstrumentKind::Sampler, ChannelId::new(1));
    handle.create_instrument(instrument).unwrap();
    handle.attach_buffer(1, test_buffer()).unwrap();
    handle.play(None).unwrap();
    run_blocks(&mut audio_thread, 4);

    // step_start 0 is already behind "now" once playback has advanced.
    let note = Note { id: 9, step_start: 0, duration_steps: 1, pitch: 60, velocity: 1.0 };
    handle.schedule_live_note(1, &note).unwrap();
    run_blocks(&mut audio_thread, 2);

    assert!(handle.poll_feedback().is_empty());
}

#[test]
fn send_cycle_is_rejected_before_reaching_the_audio_thread() {
    let (mut handle, _audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.create_channel(MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A")).unwrap();
    handle.create_channel(MixerChannel::new(ChannelId::new(2), ChannelKind::Track, "B")).unwrap();

    handle
        .create_send(ChannelId::new(1), MixerSend { target: ChannelId::new(2), level: 0.3, pre_fader: false })
        .unwrap();
    let result = handle.create_send(
        ChannelId::new(2),
        MixerSend { target: ChannelId::new(1), level: 0.3, pre_fader: false },
    );
    assert!(result.is_err());
}

#[test]
fn tempo_change_shrinks_the_adaptive_horizon() {
    let (mut handle, _audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.set_bpm(200.0).unwrap();
    assert_eq!(handle.play_state(), PlayState::Stopped);
}

#[test]
fn play_state_reflects_transport_transitions() {
    let (mut handle, _audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    assert_eq!(handle.play_state(), PlayState::Stopped);
    handle.play(None).unwrap();
    assert_eq!(handle.play_state(), PlayState::Playing);
    handle.pause().unwrap();
    assert_eq!(handle.play_state(), PlayState::Paused);
    handle.stop().unwrap();
    assert_eq!(handle.play_state(), PlayState::Stopped);
}

#[test]
fn seek_then_play_resumes_at_the_sought_tick() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.seek_ticks(480).unwrap();
    handle.play(Some(480)).unwrap();
    run_blocks(&mut audio_thread, 1);
    assert!(handle.position().position_ticks >= 480.0);
}

#[test]
fn stop_flushes_scheduled_events_before_a_later_replay() {
    let (mut handle, mut audio_thread) = Engine::initialize(EngineConfig::default(), SAMPLE_RATE, BLOCK_LEN);
    handle.create_channel(MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A")).unwrap();
    let instrument = Instrument::new(1, InstrumentKind::Sampler, ChannelId::new(1));
    handle.create_instrument(instrument).unwrap();
    handle.attach_buffer(1, test_buffer()).unwrap();

    handle.play(None).unwrap();
    let mut pattern = Pattern::new(1, 16);
    pattern.add_note(1, Note { id: 1, step_start: 0, duration_steps: 1, pitch: 60, velocity: 1.0 });
    handle.tick_pattern_scheduler(&pattern, 0, 16 * 24, 0.0).unwrap();

    handle.stop().unwrap();
    run_blocks(&mut audio_thread, 2);
    handle.play(None).unwrap();
    run_blocks(&mut audio_thread, 40);

    // The pre-stop horizon's events carried the old epoch and must never
    // re-fire once the transport restarts, so no fault should surface from
    // a stale event racing a removed/re-added instrument state.
    assert!(handle.poll_feedback().iter().all(|f| !matches!(f, strata_audio::AudioFeedback::Fault(_))));
}
