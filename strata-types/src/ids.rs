use serde::{Deserialize, Serialize};
use std::fmt;

pub type InstrumentId = u32;
pub type PatternId = u32;
pub type NoteId = u32;
pub type TrackId = u32;
pub type EffectId = u32;

/// Mixer channel identity. `0` is reserved for the Master strip, which is
/// the one channel guaranteed to exist for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(u32);

impl ChannelId {
    pub const MASTER: ChannelId = ChannelId(0);

    pub fn new(id: u32) -> Self {
        ChannelId(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_master(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}
