//! cpal-backed output stream (ambient I/O; gated behind the `device`
//! feature so the engine itself stays hosting-agnostic — grounded on the
//! teacher's `devices.rs` and the Zamua cpal wiring pattern in the pack's
//! other_examples/).

#![cfg(feature = "device")]

use crate::audio_thread::AudioThread;
use crate::error::{EngineError, EngineResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

pub struct AudioOutput {
    stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioOutput {
    /// Opens the host's default output device and spins up a stream that
    /// drives `audio_thread` directly from the hardware callback.
    pub fn open_default(mut audio_thread: AudioThread, block_len: usize) -> EngineResult<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::BufferUnavailable("no default output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| EngineError::BufferUnavailable(format!("no supported output config: {e}")))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let mut scratch_l = vec![0.0f32; block_len];
        let mut scratch_r = vec![0.0f32; block_len];

        let build = |data_fn_channels: u16| {
            move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = out.len() / data_fn_channels.max(1) as usize;
                if frames > scratch_l.len() {
                    scratch_l.resize(frames, 0.0);
                    scratch_r.resize(frames, 0.0);
                }
                let keep_running = audio_thread.process_block(&mut scratch_l[..frames], &mut scratch_r[..frames]);
                for (i, frame) in out.chunks_mut(data_fn_channels.max(1) as usize).enumerate() {
                    let l = scratch_l.get(i).copied().unwrap_or(0.0);
                    let r = scratch_r.get(i).copied().unwrap_or(l);
                    if let Some(sample) = frame.first_mut() {
                        *sample = l;
                    }
                    if frame.len() > 1 {
                        frame[1] = r;
                    }
                    if !keep_running {
                        frame.iter_mut().for_each(|s| *s = 0.0);
                    }
                }
            }
        };

        let err_fn = |err| log::error!(target: "audio::device", "output stream error: {err}");

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_output_stream(&config, build(channels), err_fn, None)
                .map_err(|e| EngineError::BufferUnavailable(format!("failed to build stream: {e}")))?,
            other => {
                return Err(EngineError::BufferUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| EngineError::BufferUnavailable(format!("failed to start stream: {e}")))?;

        Ok(AudioOutput { stream, sample_rate, channels })
    }

    pub fn pause(&self) -> EngineResult<()> {
        self.stream
            .pause()
            .map_err(|e| EngineError::BufferUnavailable(format!("failed to pause stream: {e}")))
    }

    pub fn resume(&self) -> EngineResult<()> {
        self.stream
            .play()
            .map_err(|e| EngineError::BufferUnavailable(format!("failed to resume stream: {e}")))
    }
}
