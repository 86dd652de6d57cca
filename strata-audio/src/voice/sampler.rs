//! Sampler voice rendering (spec §4.4): pitched buffer playback with linear
//! interpolation, ADSR envelope, optional biquad filter, and the
//! `cutItself` anti-click fade.

use crate::effects::biquad::{Biquad, BiquadKind};
use crate::voice::envelope::{EnvelopeStage, EnvelopeState};
use std::sync::Arc;
use strata_types::{FilterType, Instrument, InstrumentId, NoteId, SampleBuffer};

/// Fixed per spec §4.4/§9 Open Questions: `cutItself` fade is 2ms linear,
/// not a tunable — the source's ad-hoc constants are resolved to this one
/// value.
pub const CUT_ITSELF_FADE_SECS: f32 = 0.002;

#[derive(Debug, Clone, Copy)]
struct CutFade {
    gain: f32,
    decrement: f32,
}

pub struct SamplerVoice {
    pub instrument: InstrumentId,
    pub note_id: NoteId,
    buffer: Arc<SampleBuffer>,
    pitch_ratio: f64,
    velocity: f32,
    cursor: f64,
    start_index: f64,
    end_index: f64,
    envelope: EnvelopeState,
    filter_l: Biquad,
    filter_r: Biquad,
    filter_enabled: bool,
    cut_fade: Option<CutFade>,
}

fn biquad_kind(filter_type: FilterType) -> BiquadKind {
    match filter_type {
        FilterType::LowPass => BiquadKind::LowPass,
        FilterType::HighPass => BiquadKind::HighPass,
        FilterType::BandPass => BiquadKind::Peaking,
    }
}

impl SamplerVoice {
    pub fn spawn(
        instrument: &Instrument,
        buffer: Arc<SampleBuffer>,
        note_id: NoteId,
        pitch: u8,
        velocity: f32,
        device_sample_rate: f32,
    ) -> Self {
        let params = &instrument.sampler;
        let semitones = pitch as f32 - params.base_midi as f32 + instrument.pitch_offset as f32;
        let pitch_ratio = 2f64.powf(semitones as f64 / 12.0)
            * (buffer.sample_rate as f64 / device_sample_rate as f64);

        let len = buffer.len_frames() as f64;
        let start_index = (params.sample_start as f64 * len).clamp(0.0, len);
        let end_index = (params.sample_end as f64 * len).clamp(start_index, len);

        let envelope_params = if params.envelope.enabled {
            params.envelope
        } else {
            strata_types::Envelope::disabled()
        };

        let filter = &params.filter;
        let kind = biquad_kind(filter.filter_type);

        SamplerVoice {
            instrument: instrument.id,
            note_id,
            buffer,
            pitch_ratio,
            velocity,
            cursor: start_index,
            start_index,
            end_index,
            envelope: EnvelopeState::new(envelope_params, device_sample_rate),
            filter_l: Biquad::new(kind, filter.cutoff_hz, filter.q, 0.0, device_sample_rate),
            filter_r: Biquad::new(kind, filter.cutoff_hz, filter.q, 0.0, device_sample_rate),
            filter_enabled: filter.enabled,
            cut_fade: None,
        }
    }

    pub fn note_off(&mut self) {
        self.envelope.note_off();
    }

    /// Forces this voice into a short linear fade-out, used by `cutItself`
    /// when a new NoteOn re-triggers the same instrument.
    pub fn force_cut(&mut self, sample_rate: f32) {
        if self.cut_fade.is_none() {
            let decrement = 1.0 / (CUT_ITSELF_FADE_SECS * sample_rate).max(1.0);
            self.cut_fade = Some(CutFade { gain: 1.0, decrement });
        }
    }

    pub fn is_finished(&self) -> bool {
        if let Some(fade) = self.cut_fade {
            fade.gain <= 0.0
        } else {
            self.envelope.is_finished() || self.cursor >= self.end_index
        }
    }

    pub fn envelope_stage(&self) -> EnvelopeStage {
        self.envelope.stage()
    }

    fn interpolated_sample(&self, channel: usize, channels: usize, index: f64) -> f32 {
        let len = self.buffer.len_frames();
        if len == 0 {
            return 0.0;
        }
        let i0 = index.floor() as usize;
        let i1 = (i0 + 1).min(len - 1);
        let i0 = i0.min(len - 1);
        let frac = (index - i0 as f64) as f32;
        let frames = &self.buffer.frames;
        let s0 = frames[i0 * channels + channel.min(channels - 1)];
        let s1 = frames[i1 * channels + channel.min(channels - 1)];
        s0 * (1.0 - frac) + s1 * frac
    }

    /// Renders `out_l`/`out_r` (overwritten, not accumulated — the voice
    /// pool sums voices into the instrument bus).
    pub fn render(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let channels = self.buffer.channels.max(1) as usize;
        for i in 0..out_l.len() {
            if self.cursor >= self.end_index {
                out_l[i] = 0.0;
                out_r[i] = 0.0;
                continue;
            }

            let raw_l = self.interpolated_sample(0, channels, self.cursor);
            let raw_r = if channels > 1 {
                self.interpolated_sample(1, channels, self.cursor)
            } else {
                raw_l
            };

            let env = self.envelope.tick();
            let cut_gain = if let Some(fade) = self.cut_fade.as_mut() {
                let g = fade.gain;
                fade.gain = (fade.gain - fade.decrement).max(0.0);
                g
            } else {
                1.0
            };
            let gain = env * self.velocity * cut_gain;

            let (mut l, mut r) = (raw_l * gain, raw_r * gain);
            if self.filter_enabled {
                l = self.filter_l.process(l);
                r = self.filter_r.process(r);
            }
            out_l[i] = l;
            out_r[i] = r;

            self.cursor += self.pitch_ratio;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{ChannelId, Instrument, InstrumentKind};

    fn test_instrument() -> Instrument {
        Instrument::new(1, InstrumentKind::Sampler, ChannelId::new(1))
    }

    fn test_buffer() -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer {
            channels: 1,
            sample_rate: 48_000.0,
            frames: Arc::new(vec![1.0; 4800]),
        })
    }

    #[test]
    fn same_pitch_as_base_midi_has_unity_ratio_at_matching_rates() {
        let instrument = test_instrument();
        let voice = SamplerVoice::spawn(&instrument, test_buffer(), 1, 60, 1.0, 48_000.0);
        assert!((voice.pitch_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn octave_up_doubles_pitch_ratio() {
        let instrument = test_instrument();
        let voice = SamplerVoice::spawn(&instrument, test_buffer(), 1, 72, 1.0, 48_000.0);
        assert!((voice.pitch_ratio - 2.0).abs() < 1e-6);
    }

    #[test]
    fn renders_without_nan() {
        let instrument = test_instrument();
        let mut voice = SamplerVoice::spawn(&instrument, test_buffer(), 1, 60, 1.0, 48_000.0);
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        voice.render(&mut l, &mut r);
        assert!(l.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn force_cut_eventually_finishes_voice() {
        let instrument = test_instrument();
        let mut voice = SamplerVoice::spawn(&instrument, test_buffer(), 1, 60, 1.0, 48_000.0);
        voice.force_cut(48_000.0);
        let mut l = vec![0.0; 4096];
        let mut r = vec![0.0; 4096];
        voice.render(&mut l, &mut r);
        assert!(voice.is_finished());
    }

    #[test]
    fn reaching_end_index_finishes_voice() {
        let instrument = test_instrument();
        let mut voice = SamplerVoice::spawn(&instrument, test_buffer(), 1, 60, 1.0, 48_000.0);
        let mut l = vec![0.0; 4800 * 2];
        let mut r = vec![0.0; 4800 * 2];
        voice.render(&mut l, &mut r);
        assert!(voice.is_finished());
    }
}
