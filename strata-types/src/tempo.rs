use serde::{Deserialize, Serialize};

/// Tempo and time grid for one session. `ppq` is fixed for the life of the
/// session; everything else may change at any time via `set_bpm`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub bpm: f32,
    pub time_signature_num: u32,
    pub time_signature_den: u32,
    pub ppq: u32,
}

impl Default for TimeGrid {
    fn default() -> Self {
        TimeGrid {
            bpm: 120.0,
            time_signature_num: 4,
            time_signature_den: 4,
            ppq: 96,
        }
    }
}

impl TimeGrid {
    pub fn ticks_per_step(&self) -> u32 {
        self.ppq / 4
    }

    pub fn ticks_per_bar(&self) -> u32 {
        self.ppq * self.time_signature_num
    }

    /// `secondsPerTick = 60 / (bpm * ppq)`.
    pub fn seconds_per_tick(&self) -> f64 {
        60.0 / (self.bpm as f64 * self.ppq as f64)
    }

    pub fn seconds_per_step(&self) -> f64 {
        self.seconds_per_tick() * self.ticks_per_step() as f64
    }

    pub fn with_bpm(mut self, bpm: f32) -> Self {
        self.bpm = bpm;
        self
    }
}

/// Human-readable position derived from a tick and a `TimeGrid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarBeatSixteenth {
    pub bar: u32,
    pub beat: u32,
    pub sixteenth: u32,
    pub ticks_into_sixteenth: u32,
}

impl BarBeatSixteenth {
    pub fn from_tick(tick: i64, grid: &TimeGrid) -> Self {
        let tick = tick.max(0) as u32;
        let ticks_per_bar = grid.ticks_per_bar();
        let ticks_per_beat = grid.ppq;
        let ticks_per_sixteenth = grid.ppq / 4;

        let bar = tick / ticks_per_bar;
        let into_bar = tick % ticks_per_bar;
        let beat = into_bar / ticks_per_beat;
        let into_beat = into_bar % ticks_per_beat;
        let sixteenth = into_beat / ticks_per_sixteenth;
        let ticks_into_sixteenth = into_beat % ticks_per_sixteenth;

        BarBeatSixteenth {
            bar,
            beat,
            sixteenth,
            ticks_into_sixteenth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_matches_spec_defaults() {
        let g = TimeGrid::default();
        assert_eq!(g.ppq, 96);
        assert_eq!(g.ticks_per_step(), 24);
        assert_eq!(g.ticks_per_bar(), 384);
    }

    #[test]
    fn seconds_per_tick_120bpm() {
        let g = TimeGrid::default();
        let spt = g.seconds_per_tick();
        // 60 / (120 * 96)
        assert!((spt - (60.0 / (120.0 * 96.0))).abs() < 1e-12);
    }

    #[test]
    fn bbs_at_zero() {
        let g = TimeGrid::default();
        let bbs = BarBeatSixteenth::from_tick(0, &g);
        assert_eq!((bbs.bar, bbs.beat, bbs.sixteenth), (0, 0, 0));
    }

    #[test]
    fn bbs_one_bar_in() {
        let g = TimeGrid::default();
        let bbs = BarBeatSixteenth::from_tick(g.ticks_per_bar() as i64, &g);
        assert_eq!((bbs.bar, bbs.beat, bbs.sixteenth), (1, 0, 0));
    }
}
