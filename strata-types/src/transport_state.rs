use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Pattern,
    Song,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopRegion {
    pub start_tick: i64,
    pub end_tick: i64,
    pub enabled: bool,
}

impl LoopRegion {
    pub fn len_ticks(&self) -> i64 {
        (self.end_tick - self.start_tick).max(1)
    }
}

impl Default for LoopRegion {
    fn default() -> Self {
        LoopRegion {
            start_tick: 0,
            end_tick: 384 * 4,
            enabled: true,
        }
    }
}
