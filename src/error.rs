use std::io;

use thiserror::Error;

/// Failure modes surfaced by the generation workflow.
///
/// Transient provider errors never appear here; they are absorbed by the
/// sampler's retry loop and only show up as `GenerationFailed` once retries
/// are exhausted.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("{key} path does not exist: {path}")]
    PathNotFound { key: &'static str, path: String },

    #[error("{step} failed: {command}")]
    CommandFailed { step: String, command: String },

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}
