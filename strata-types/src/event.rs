use crate::ids::{EffectId, InstrumentId, NoteId};
use serde::{Deserialize, Serialize};

/// Highest first, matching the scheduler's event-priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventPriority {
    Meter = 0,
    ParamChange = 1,
    NoteOn = 2,
    NoteOff = 3,
    LoopWrap = 4,
    Stop = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    NoteOn {
        note_id: NoteId,
        pitch: u8,
        velocity: f32,
    },
    NoteOff {
        note_id: NoteId,
    },
    Param {
        effect_id: EffectId,
        param_index: u32,
        value: f32,
    },
}

/// A scheduler-internal event, sample-aligned and time-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    /// Absolute sample-aligned time, seconds since transport epoch.
    pub time_secs: f64,
    pub target_instrument: InstrumentId,
    pub priority: EventPriority,
    pub payload: EventPayload,
    /// Scheduling epoch this event was produced under; the audio thread
    /// drops events whose epoch no longer matches the live one.
    pub epoch: u64,
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse so a BinaryHeap behaves as a min-heap on (time, priority).
        other
            .time_secs
            .partial_cmp(&self.time_secs)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.priority.cmp(&self.priority))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
