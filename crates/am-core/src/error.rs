//! Error kinds surfaced through the command API (§6-7).
//!
//! `AmError` enumerates the exit codes of §6 as variants, plus internal
//! variants that never cross the API boundary (`GraphCycle`,
//! `BufferMismatch`). T-audio never unwinds: every fault on the audio
//! thread is represented as one of these values and recovered locally
//! rather than propagated as a panic.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum AmError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    #[error("out of memory")]
    OutOfMemory,

    #[error("decoder failure: {0}")]
    DecoderFailure(String),

    #[error("engine already initialized")]
    AlreadyInitialized,

    #[error("engine not initialized")]
    NotInitialized,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal: the bus/effect/pipeline graph being built contains a cycle.
    /// Rejected at load, never surfaced as a bare string.
    #[error("graph contains a cycle")]
    GraphCycle,

    /// Internal: a mixer/pipeline node was handed buffers of mismatched
    /// channel or frame count. Per §8 this must be a hard error, not a
    /// silent truncation.
    #[error("buffer mismatch: expected {expected:?}, got {got:?}")]
    BufferMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
}

/// Crate-wide result alias.
pub type AmResult<T> = Result<T, AmError>;
