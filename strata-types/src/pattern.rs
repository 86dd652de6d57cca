use crate::ids::{InstrumentId, NoteId, PatternId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub step_start: u32,
    pub duration_steps: u32,
    pub pitch: u8,
    /// Normalized 0..1, matching the engine-wide velocity convention.
    pub velocity: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pattern {
    pub id: PatternId,
    pub length_steps: u32,
    pub notes: HashMap<InstrumentId, Vec<Note>>,
}

impl Pattern {
    pub fn new(id: PatternId, length_steps: u32) -> Self {
        Pattern {
            id,
            length_steps,
            notes: HashMap::new(),
        }
    }

    pub fn add_note(&mut self, instrument: InstrumentId, note: Note) {
        self.notes.entry(instrument).or_default().push(note);
    }

    pub fn remove_note(&mut self, instrument: InstrumentId, note_id: NoteId) {
        if let Some(notes) = self.notes.get_mut(&instrument) {
            notes.retain(|n| n.id != note_id);
        }
    }
}
