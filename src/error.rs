// Error taxonomy for the loop engine

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by engine operations. A rejected operation leaves the
/// engine state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid slot index {index} (track count is {track_count})")]
    InvalidSlotIndex { index: usize, track_count: usize },

    #[error("Malformed event sequence: {0}")]
    MalformedEventSequence(String),

    #[error("Generation job failed: {0}")]
    GenerationJobFailure(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure reported by a synth sink call. Never fatal to the tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Synth sink error: {0}")]
pub struct SinkError(pub String);
