//! Engine error types.

use thiserror::Error;

/// Errors raised while decoding a source buffer.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("empty source buffer")]
    Empty,

    #[error("unrecognised audio container")]
    UnknownFormat,

    #[error("wav decode failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("mp3 decode failed: {0}")]
    Mp3(String),

    #[error("source has no audio frames")]
    NoFrames,
}

/// Errors raised by the host audio context while wiring a signal chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The media handle was already consumed by an earlier graph.
    #[error("media handle {0} is already bound to a graph")]
    MediaAlreadyBound(u64),

    #[error("audio context is closed")]
    ContextClosed,

    #[error("audio context did not resume")]
    ContextSuspended,

    #[error("a signal chain graph is already live")]
    GraphAlreadyLive,

    #[error("source has {0} channels, expected 1..=8")]
    UnsupportedChannels(usize),
}

/// Top-level error taxonomy surfaced to callers of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The host refused to connect nodes and the fresh-handle retry failed too.
    #[error("signal chain graph build failed: {0}")]
    GraphBuildFailed(#[from] GraphError),

    /// The source buffer could not be decoded for export or loading.
    #[error("source decode failed: {0}")]
    SourceDecodeFailed(#[from] DecodeError),

    #[error("audio upload failed: {0}")]
    UploadFailed(String),

    #[error("saving project settings failed: {0}")]
    PersistFailed(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("no audio source loaded")]
    NoSource,

    #[error("no project is open")]
    NoProject,

    #[error("unknown compressor parameter '{0}'")]
    UnknownParameter(String),

    #[error("invalid engine config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
