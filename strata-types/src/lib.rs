pub mod arrangement;
pub mod effect;
pub mod event;
pub mod ids;
pub mod instrument;
pub mod mixer;
pub mod pattern;
pub mod tempo;
pub mod transport_state;

pub use arrangement::ArrangementClip;
pub use effect::{EffectDescriptor, EffectKind, ParamMeta};
pub use event::{EventPayload, EventPriority, ScheduledEvent};
pub use ids::{ChannelId, EffectId, InstrumentId, NoteId, PatternId, TrackId};
pub use instrument::{Envelope, FilterType, Instrument, InstrumentKind, SampleBuffer, SamplerParams, VoiceFilter};
pub use mixer::{ChannelKind, MixerChannel, Send};
pub use pattern::{Note, Pattern};
pub use tempo::{BarBeatSixteenth, TimeGrid};
pub use transport_state::{LoopRegion, PlaybackMode, PlayState};
