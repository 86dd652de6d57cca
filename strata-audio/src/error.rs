use std::fmt;

/// Control-API error taxonomy. Every variant here is rejected or recovered
/// before it can reach the audio thread; the audio thread itself never
/// returns a `Result` from its render path (faults are recorded and
/// recovered locally — see `EngineFault`).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidArgument(String),
    GraphError(String),
    ResourceExhausted(String),
    BufferUnavailable(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            EngineError::GraphError(msg) => write!(f, "graph error: {msg}"),
            EngineError::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            EngineError::BufferUnavailable(msg) => write!(f, "buffer unavailable: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<String> for EngineError {
    fn from(msg: String) -> Self {
        EngineError::InvalidArgument(msg)
    }
}

/// Faults raised *from* the audio thread, drained by the control thread out
/// of the feedback ring. These never unwind the audio callback; they are
/// produced as values and observed later.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineFault {
    /// NaN/Inf detected in an effect's output; the effect was bypassed for
    /// the remainder of the block and reset at the next block boundary.
    NumericFault { channel: u32, effect: u32 },
    /// A scheduled NoteOn arrived for an instrument with no attached buffer.
    BufferUnavailable { instrument: u32 },
    /// The audio thread could not keep up with the scheduling horizon.
    HorizonOverrun { behind_by_secs: f32 },
    /// The output device was lost; playback has been force-stopped.
    EngineStopped { reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
