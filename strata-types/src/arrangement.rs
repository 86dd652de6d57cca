use crate::ids::{PatternId, TrackId};
use serde::{Deserialize, Serialize};

/// A placement of a pattern on the song timeline ("song mode").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrangementClip {
    pub pattern_id: PatternId,
    pub track_id: TrackId,
    pub start_step: u32,
    pub length_steps: u32,
    pub offset_steps: u32,
}

impl ArrangementClip {
    pub fn end_step(&self) -> u32 {
        self.start_step + self.length_steps
    }

    pub fn intersects(&self, window_start: u32, window_end: u32) -> bool {
        self.start_step < window_end && self.end_step() > window_start
    }
}
