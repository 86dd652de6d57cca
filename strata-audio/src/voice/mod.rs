pub mod envelope;
pub mod pool;
pub mod sampler;

pub use envelope::EnvelopeStage;
pub use pool::VoicePool;
pub use sampler::{SamplerVoice, CUT_ITSELF_FADE_SECS};
