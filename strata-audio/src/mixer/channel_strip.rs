use crate::effects::{create_effect, AudioEffect};
use strata_types::{ChannelKind, EffectId, EffectKind, MixerChannel};

pub struct ChannelStrip {
    pub descriptor: MixerChannel,
    pub inserts: Vec<(EffectId, Box<dyn AudioEffect>)>,
    pub input_l: Vec<f32>,
    pub input_r: Vec<f32>,
    pub output_l: Vec<f32>,
    pub output_r: Vec<f32>,
    /// Ping-pong buffers for the insert chain: each effect writes here and
    /// the buffer is then swapped with `input_{l,r}`, so the chain never
    /// allocates once sized (spec §5/§8: no allocation on the audio block).
    scratch_l: Vec<f32>,
    scratch_r: Vec<f32>,
}

impl ChannelStrip {
    pub fn new(descriptor: MixerChannel, block_len: usize, sample_rate: f32) -> Self {
        let inserts = descriptor
            .inserts
            .iter()
            .map(|e| (e.id, create_effect(e.kind, sample_rate)))
            .collect();
        ChannelStrip {
            descriptor,
            inserts,
            input_l: vec![0.0; block_len],
            input_r: vec![0.0; block_len],
            output_l: vec![0.0; block_len],
            output_r: vec![0.0; block_len],
            scratch_l: vec![0.0; block_len],
            scratch_r: vec![0.0; block_len],
        }
    }

    pub fn resize(&mut self, block_len: usize) {
        self.input_l.resize(block_len, 0.0);
        self.input_r.resize(block_len, 0.0);
        self.output_l.resize(block_len, 0.0);
        self.output_r.resize(block_len, 0.0);
        self.scratch_l.resize(block_len, 0.0);
        self.scratch_r.resize(block_len, 0.0);
    }

    pub fn clear_input(&mut self) {
        self.input_l.iter_mut().for_each(|s| *s = 0.0);
        self.input_r.iter_mut().for_each(|s| *s = 0.0);
    }

    pub fn add_effect(&mut self, id: EffectId, kind: EffectKind, sample_rate: f32) {
        self.inserts.push((id, create_effect(kind, sample_rate)));
    }

    pub fn remove_effect(&mut self, id: EffectId) {
        self.inserts.retain(|(existing, _)| *existing != id);
    }

    pub fn reorder_effect(&mut self, src_idx: usize, dst_idx: usize) {
        if src_idx < self.inserts.len() && dst_idx < self.inserts.len() {
            let item = self.inserts.remove(src_idx);
            self.inserts.insert(dst_idx, item);
        }
    }

    /// Runs the insert chain in place over `input_{l,r}`, ping-ponging
    /// against the pre-sized scratch buffers instead of allocating per
    /// effect. A faulting effect (NaN/Inf) is bypassed for the remainder of
    /// this block and flagged (spec §4.5 failure model).
    pub fn run_inserts(&mut self, sample_rate: f32) -> Vec<EffectId> {
        let mut faulted = Vec::new();
        for (id, effect) in self.inserts.iter_mut() {
            let bypassed = self
                .descriptor
                .inserts
                .iter()
                .find(|e| e.id == *id)
                .map(|e| e.bypassed)
                .unwrap_or(false);
            if bypassed {
                continue;
            }
            self.scratch_l.iter_mut().for_each(|s| *s = 0.0);
            self.scratch_r.iter_mut().for_each(|s| *s = 0.0);
            effect.process(&self.input_l, &self.input_r, &mut self.scratch_l, &mut self.scratch_r, sample_rate);
            if crate::effects::has_numeric_fault(&self.scratch_l, &self.scratch_r) {
                faulted.push(*id);
                effect.reset();
                continue;
            }
            std::mem::swap(&mut self.input_l, &mut self.scratch_l);
            std::mem::swap(&mut self.input_r, &mut self.scratch_r);
        }
        faulted
    }

    fn linear_gain(&self) -> f32 {
        self.descriptor.linear_gain()
    }

    /// Equal-power pan + fader + mute/solo + mono down-mix, applied to
    /// `input_{l,r}` in place, producing `output_{l,r}`.
    pub fn apply_pan_fader(&mut self, any_track_soloed: bool) {
        let muted = self.descriptor.muted;
        let solo_silenced = self.descriptor.kind == ChannelKind::Track
            && any_track_soloed
            && !self.descriptor.soloed;
        let gain = if muted || solo_silenced {
            0.0
        } else {
            self.linear_gain()
        };

        let pan = self.descriptor.pan.clamp(-1.0, 1.0);
        let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
        let (pan_l, pan_r) = (angle.cos(), angle.sin());

        for i in 0..self.input_l.len() {
            let (mut l, mut r) = (self.input_l[i], self.input_r[i]);
            if self.descriptor.mono {
                let mono = (l + r) * 0.5;
                l = mono;
                r = mono;
            }
            self.output_l[i] = l * pan_l * gain;
            self.output_r[i] = r * pan_r * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ChannelId;

    #[test]
    fn bypassed_effect_passes_input_unchanged() {
        let mut descriptor = MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A");
        descriptor.inserts.push(strata_types::EffectDescriptor {
            id: 1,
            kind: EffectKind::Compressor,
            bypassed: true,
            params: vec![],
        });
        let mut strip = ChannelStrip::new(descriptor, 8, 48_000.0);
        strip.input_l = vec![0.25; 8];
        strip.input_r = vec![-0.25; 8];
        strip.run_inserts(48_000.0);
        assert!(strip.input_l.iter().all(|s| (*s - 0.25).abs() < 1e-6));
        assert!(strip.input_r.iter().all(|s| (*s + 0.25).abs() < 1e-6));
    }

    #[test]
    fn mute_zeroes_output() {
        let mut descriptor = MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A");
        descriptor.muted = true;
        let mut strip = ChannelStrip::new(descriptor, 8, 48_000.0);
        strip.input_l = vec![1.0; 8];
        strip.input_r = vec![1.0; 8];
        strip.apply_pan_fader(false);
        assert!(strip.output_l.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn solo_silences_non_soloed_tracks() {
        let descriptor = MixerChannel::new(ChannelId::new(1), ChannelKind::Track, "A");
        let mut strip = ChannelStrip::new(descriptor, 8, 48_000.0);
        strip.input_l = vec![1.0; 8];
        strip.input_r = vec![1.0; 8];
        strip.apply_pan_fader(true);
        assert!(strip.output_l.iter().all(|s| *s == 0.0));
        assert!(strip.output_r.iter().all(|s| *s == 0.0));
    }
}
