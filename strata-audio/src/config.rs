/// Engine-wide tunables fixed at `Engine::initialize` time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub ppq: u32,
    pub default_bpm: f32,
    pub max_voices_per_instrument: usize,
    /// Capacity of the priority and normal command channels.
    pub command_ring_capacity: usize,
    /// Capacity of the feedback (audio -> control) ring.
    pub feedback_ring_capacity: usize,
    pub min_horizon_secs: f32,
    pub max_horizon_secs: f32,
    /// Minimum scheduling pre-delay, absorbing plugin/host latency.
    pub min_pre_delay_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            ppq: 96,
            default_bpm: 120.0,
            max_voices_per_instrument: 64,
            command_ring_capacity: 1024,
            feedback_ring_capacity: 256,
            min_horizon_secs: 0.050,
            max_horizon_secs: 0.200,
            min_pre_delay_secs: 0.010,
        }
    }
}
