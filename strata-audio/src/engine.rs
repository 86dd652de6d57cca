//! Top-level construction (spec §9 redesign flag: no global singleton — an
//! explicit `Engine` value is built by `initialize()` and owns every
//! channel and buffer the control/audio boundary needs).

use crate::audio_thread::AudioThread;
use crate::commands::{AudioCmd, AudioFeedback};
use crate::config::EngineConfig;
use crate::handle::AudioHandle;
use crate::metering::metering_channel;
use crate::mixer::MixerGraph;
use crate::scheduler::Scheduler;
use crate::shared_state::shared_state;
use crate::transport::Transport;
use crate::voice::VoicePool;
use crossbeam_channel::bounded;
use strata_types::TimeGrid;

/// Constructed once per session. `AudioHandle` is the control-thread-facing
/// half; `AudioThread` is driven by the render callback (directly in tests,
/// or via the cpal stream under the `device` feature).
pub struct Engine;

impl Engine {
    pub fn initialize(config: EngineConfig, sample_rate: f32, block_len: usize) -> (AudioHandle, AudioThread) {
        let grid = TimeGrid {
            bpm: config.default_bpm,
            time_signature_num: 4,
            time_signature_den: 4,
            ppq: config.ppq,
        };

        let (priority_tx, priority_rx) = bounded::<AudioCmd>(config.command_ring_capacity);
        let (normal_tx, normal_rx) = bounded::<AudioCmd>(config.command_ring_capacity);
        let (feedback_tx, feedback_rx) = bounded::<AudioFeedback>(config.feedback_ring_capacity);
        let (meter_writer, meter_reader) = metering_channel(config.feedback_ring_capacity);
        let (shared_control, shared_audio) = shared_state(sample_rate, config.default_bpm);

        let transport = Transport::new(grid);
        let voices = VoicePool::new(config.max_voices_per_instrument * 8, config.max_voices_per_instrument, block_len);
        let graph = MixerGraph::new(sample_rate, block_len);

        let audio_thread = AudioThread::new(
            transport,
            voices,
            graph,
            shared_audio,
            priority_rx,
            normal_rx,
            feedback_tx,
            meter_writer,
            block_len,
            config.min_horizon_secs,
            config.max_horizon_secs,
        );

        let handle = AudioHandle::new(
            priority_tx,
            normal_tx,
            feedback_rx,
            meter_reader,
            shared_control,
            Scheduler::new(),
            grid,
            config,
        );

        (handle, audio_thread)
    }
}
