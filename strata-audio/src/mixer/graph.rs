//! Fixed-topology mixer graph (spec §4.5). Topology mutations (channel
//! creation/removal, sends, routing) are applied at block boundaries by the
//! audio thread as it drains the command ring; each mutation validates the
//! send-graph acyclicity invariant before taking effect, leaving the live
//! graph unchanged on rejection.

use super::channel_strip::ChannelStrip;
use crate::error::{EngineError, EngineResult};
use std::collections::{HashMap, HashSet};
use strata_types::{ChannelId, ChannelKind, EffectId, EffectKind, MixerChannel, Send as MixerSend};

pub struct MixerGraph {
    channels: HashMap<ChannelId, ChannelStrip>,
    order: Vec<ChannelId>,
    sample_rate: f32,
    block_len: usize,
    master_out_l: Vec<f32>,
    master_out_r: Vec<f32>,
    /// NaN/Inf faults accumulated during the last `evaluate()`, read and
    /// cleared by the audio thread after each block (spec §4.5/§7).
    pending_faults: Vec<(ChannelId, EffectId)>,
}

impl MixerGraph {
    pub fn new(sample_rate: f32, block_len: usize) -> Self {
        let mut channels = HashMap::new();
        channels.insert(
            ChannelId::MASTER,
            ChannelStrip::new(MixerChannel::master("Master"), block_len, sample_rate),
        );
        MixerGraph {
            channels,
            order: vec![ChannelId::MASTER],
            sample_rate,
            block_len,
            master_out_l: vec![0.0; block_len],
            master_out_r: vec![0.0; block_len],
            pending_faults: Vec::new(),
        }
    }

    pub fn faults(&self) -> &[(ChannelId, EffectId)] {
        &self.pending_faults
    }

    pub fn clear_faults(&mut self) {
        self.pending_faults.clear();
    }

    pub fn resize_block(&mut self, block_len: usize) {
        self.block_len = block_len;
        for strip in self.channels.values_mut() {
            strip.resize(block_len);
        }
        self.master_out_l.resize(block_len, 0.0);
        self.master_out_r.resize(block_len, 0.0);
    }

    fn edges(&self) -> HashMap<ChannelId, Vec<ChannelId>> {
        let mut adj: HashMap<ChannelId, Vec<ChannelId>> = HashMap::new();
        for (id, strip) in &self.channels {
            let mut targets = Vec::new();
            if let Some(out) = strip.descriptor.output_target {
                targets.push(out);
            }
            for send in &strip.descriptor.sends {
                targets.push(send.target);
            }
            adj.insert(*id, targets);
        }
        adj
    }

    fn would_cycle(&self, from_with_extra_edge: (ChannelId, ChannelId)) -> bool {
        let mut adj = self.edges();
        adj.entry(from_with_extra_edge.0).or_default().push(from_with_extra_edge.1);

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();

        fn dfs(
            node: ChannelId,
            adj: &HashMap<ChannelId, Vec<ChannelId>>,
            visiting: &mut HashSet<ChannelId>,
            visited: &mut HashSet<ChannelId>,
        ) -> bool {
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

        let keys: Vec<ChannelId> = adj.keys().copied().collect();
        for k in keys {
            if dfs(k, &adj, &mut visiting, &mut visited) {
                return true;
            }
        }
        false
    }

    fn recompute_order(&mut self) -> EngineResult<()> {
        let adj = self.edges();
        let mut in_degree: HashMap<ChannelId, usize> =
            self.channels.keys().map(|k| (*k, 0)).collect();
        for targets in adj.values() {
            for t in targets {
                *in_degree.entry(*t).or_insert(0) += 1;
            }
        }
        let mut queue: Vec<ChannelId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(k, _)| *k)
            .collect();
        queue.sort();
        let mut order = Vec::new();
        let mut in_degree = in_degree;
        while let Some(node) = queue.pop() {
            order.push(node);
            if let Some(targets) = adj.get(&node) {
                for t in targets {
                    if let Some(d) = in_degree.get_mut(t) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push(*t);
                        }
                    }
                }
            }
        }
        if order.len() != self.channels.len() {
            return Err(EngineError::GraphError(
                "cycle detected while computing evaluation order".into(),
            ));
        }
        self.order = order;
        Ok(())
    }

    pub fn add_channel(&mut self, descriptor: MixerChannel) -> EngineResult<()> {
        if descriptor.kind == ChannelKind::Master {
            return Err(EngineError::GraphError("only one Master channel is permitted".into()));
        }
        let id = descriptor.id;
        self.channels
            .insert(id, ChannelStrip::new(descriptor, self.block_len, self.sample_rate));
        if self.recompute_order().is_err() {
            self.channels.remove(&id);
            return Err(EngineError::GraphError("channel creation would cycle".into()));
        }
        Ok(())
    }

    pub fn remove_channel(&mut self, id: ChannelId) -> EngineResult<()> {
        if id.is_master() {
            return Err(EngineError::GraphError("cannot remove the Master channel".into()));
        }
        self.channels.remove(&id);
        for strip in self.channels.values_mut() {
            strip.descriptor.sends.retain(|s| s.target != id);
            if strip.descriptor.output_target == Some(id) {
                strip.descriptor.output_target = Some(ChannelId::MASTER);
            }
        }
        let _ = self.recompute_order();
        Ok(())
    }

    pub fn create_send(&mut self, src: ChannelId, send: MixerSend) -> EngineResult<()> {
        if self.would_cycle((src, send.target)) {
            return Err(EngineError::GraphError(format!(
                "send {src} -> {} would introduce a cycle",
                send.target
            )));
        }
        let Some(strip) = self.channels.get_mut(&src) else {
            return Err(EngineError::GraphError(format!("unknown channel {src}")));
        };
        strip.descriptor.sends.push(send);
        self.recompute_order()
    }

    pub fn remove_send(&mut self, src: ChannelId, dst: ChannelId) {
        if let Some(strip) = self.channels.get_mut(&src) {
            strip.descriptor.sends.retain(|s| s.target != dst);
        }
        let _ = self.recompute_order();
    }

    pub fn set_output_target(&mut self, src: ChannelId, target: ChannelId) -> EngineResult<()> {
        if self.would_cycle((src, target)) {
            return Err(EngineError::GraphError(format!(
                "routing {src} -> {target} would introduce a cycle"
            )));
        }
        let Some(strip) = self.channels.get_mut(&src) else {
            return Err(EngineError::GraphError(format!("unknown channel {src}")));
        };
        strip.descriptor.output_target = Some(target);
        self.recompute_order()
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelStrip> {
        self.channels.get_mut(&id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelStrip> {
        self.channels.get(&id)
    }

    pub fn add_effect(&mut self, channel: ChannelId, id: EffectId, kind: EffectKind) {
        if let Some(strip) = self.channels.get_mut(&channel) {
            strip.descriptor.inserts.push(strata_types::EffectDescriptor::new(id, kind, vec![]));
            strip.add_effect(id, kind, self.sample_rate);
        }
    }

    pub fn remove_effect(&mut self, channel: ChannelId, id: EffectId) {
        if let Some(strip) = self.channels.get_mut(&channel) {
            strip.descriptor.inserts.retain(|e| e.id != id);
            strip.remove_effect(id);
        }
    }

    pub fn toggle_bypass(&mut self, channel: ChannelId, id: EffectId) {
        if let Some(strip) = self.channels.get_mut(&channel) {
            if let Some(effect) = strip.descriptor.inserts.iter_mut().find(|e| e.id == id) {
                effect.bypassed = !effect.bypassed;
            }
        }
    }

    pub fn set_effect_param(&mut self, channel: ChannelId, effect_id: EffectId, index: u32, value: f32) {
        if let Some(strip) = self.channels.get_mut(&channel) {
            if let Some((_, effect)) = strip.inserts.iter_mut().find(|(id, _)| *id == effect_id) {
                effect.set_param(index, value);
            }
        }
    }

    pub fn clear_all_inputs(&mut self) {
        for strip in self.channels.values_mut() {
            strip.clear_input();
        }
    }

    pub fn accumulate_input(&mut self, channel: ChannelId, l: &[f32], r: &[f32]) {
        if let Some(strip) = self.channels.get_mut(&channel) {
            for i in 0..l.len().min(strip.input_l.len()) {
                strip.input_l[i] += l[i];
                strip.input_r[i] += r[i];
            }
        }
    }

    pub fn any_track_soloed(&self) -> bool {
        self.channels
            .values()
            .any(|s| s.descriptor.kind == ChannelKind::Track && s.descriptor.soloed)
    }

    fn accumulate_scaled(&mut self, target: ChannelId, l: &[f32], r: &[f32], level: f32) {
        if let Some(strip) = self.channels.get_mut(&target) {
            let n = l.len().min(strip.input_l.len());
            for i in 0..n {
                strip.input_l[i] += l[i] * level;
                strip.input_r[i] += r[i] * level;
            }
        }
    }

    /// Evaluates the graph in topological order (sources -> Master),
    /// returning the master bus output for this block. Each channel is
    /// temporarily removed from the map while processed so it can be read
    /// (sends, pan/fader) while other map entries are mutated, without
    /// cloning any sample buffer (spec §5/§8: no allocation per block).
    pub fn evaluate(&mut self) -> (&[f32], &[f32]) {
        let any_solo = self.any_track_soloed();
        self.pending_faults.clear();

        for i in 0..self.order.len() {
            let id = self.order[i];
            if id.is_master() {
                continue;
            }
            let Some(mut strip) = self.channels.remove(&id) else { continue };

            let faulted = strip.run_inserts(self.sample_rate);
            for effect_id in faulted {
                self.pending_faults.push((id, effect_id));
            }

            // `apply_pan_fader` only ever writes `output_{l,r}`, never
            // `input_{l,r}`, so the pre-fader send tap can read `input_`
            // directly both before and after that call.
            for send_idx in 0..strip.descriptor.sends.len() {
                let send = strip.descriptor.sends[send_idx];
                if send.pre_fader {
                    self.accumulate_scaled(send.target, &strip.input_l, &strip.input_r, send.level);
                }
            }

            strip.apply_pan_fader(any_solo);

            for send_idx in 0..strip.descriptor.sends.len() {
                let send = strip.descriptor.sends[send_idx];
                if !send.pre_fader {
                    self.accumulate_scaled(send.target, &strip.output_l, &strip.output_r, send.level);
                }
            }
            if let Some(target) = strip.descriptor.output_target {
                let (l, r) = (&strip.output_l, &strip.output_r);
                let n = l.len();
                if let Some(dest) = self.channels.get_mut(&target) {
                    for k in 0..n.min(dest.input_l.len()) {
                        dest.input_l[k] += l[k];
                        dest.input_r[k] += r[k];
                    }
                }
            }

            self.channels.insert(id, strip);
        }

        let master = self.channels.get_mut(&ChannelId::MASTER).unwrap();
        let faulted = master.run_inserts(self.sample_rate);
        for effect_id in faulted {
            self.pending_faults.push((ChannelId::MASTER, effect_id));
        }
        master.apply_pan_fader(false);
        self.master_out_l.copy_from_slice(&master.output_l);
        self.master_out_r.copy_from_slice(&master.output_r);
        (&self.master_out_l, &self.master_out_r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::ChannelKind;

    fn track(id: u32) -> MixerChannel {
        MixerChannel::new(ChannelId::new(id), ChannelKind::Track, format!("T{id}"))
    }

    #[test]
    fn master_always_present() {
        let graph = MixerGraph::new(48_000.0, 64);
        assert!(graph.channel(ChannelId::MASTER).is_some());
    }

    #[test]
    fn send_cycle_is_rejected() {
        let mut graph = MixerGraph::new(48_000.0, 64);
        graph.add_channel(track(1)).unwrap();
        graph.add_channel(track(2)).unwrap();
        graph
            .create_send(ChannelId::new(1), MixerSend { target: ChannelId::new(2), level: 0.5, pre_fader: false })
            .unwrap();
        let result = graph.create_send(
            ChannelId::new(2),
            MixerSend { target: ChannelId::new(1), level: 0.5, pre_fader: false },
        );
        assert!(matches!(result, Err(EngineError::GraphError(_))));
    }

    #[test]
    fn solo_silences_other_tracks_end_to_end() {
        let mut graph = MixerGraph::new(48_000.0, 8);
        graph.add_channel(track(1)).unwrap();
        graph.add_channel(track(2)).unwrap();
        graph.channel_mut(ChannelId::new(2)).unwrap().descriptor.soloed = true;

        graph.clear_all_inputs();
        graph.accumulate_input(ChannelId::new(1), &[1.0; 8], &[1.0; 8]);
        graph.accumulate_input(ChannelId::new(2), &[1.0; 8], &[1.0; 8]);
        let (l, r) = graph.evaluate();
        assert!(l.iter().all(|s| s.abs() > 0.0));
        let _ = r;
    }

    #[test]
    fn effect_bypass_is_bit_identical() {
        let mut graph = MixerGraph::new(48_000.0, 16);
        graph.add_channel(track(1)).unwrap();
        graph.add_effect(ChannelId::new(1), 99, EffectKind::Compressor);
        graph.toggle_bypass(ChannelId::new(1), 99);

        graph.clear_all_inputs();
        let input: Vec<f32> = (0..16).map(|i| (i as f32 * 0.2).sin() * 0.8).collect();
        graph.accumulate_input(ChannelId::new(1), &input, &input);
        let strip = graph.channel_mut(ChannelId::new(1)).unwrap();
        strip.run_inserts(48_000.0);
        assert_eq!(strip.input_l, input);
    }
}
