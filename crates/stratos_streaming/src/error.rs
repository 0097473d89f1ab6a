//! # Streaming Error Types
//!
//! Errors never cross `TerrainStreamer::update`. They reach callers only
//! through the `on_error` callback supplied with a request.

use stratos_procedural::GenerateError;
use thiserror::Error;

use crate::tile::TileId;

/// Failures reported to request callbacks.
#[derive(Error, Debug)]
pub enum StreamingError {
    /// Every attempt failed.
    #[error("generation of {tile} failed after {attempts} attempts: {reason}")]
    GenerationFailed {
        /// The tile.
        tile: TileId,
        /// Dispatches made, including the first.
        attempts: u32,
        /// Reason from the last attempt.
        reason: String,
    },

    /// No result within the configured window.
    #[error("generation of {tile} timed out after {elapsed_ms} ms")]
    Timeout {
        /// The tile.
        tile: TileId,
        /// Time since the attempt was dispatched.
        elapsed_ms: u64,
    },

    /// Non-finite or out-of-range input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The worker pool is gone.
    #[error("worker pool disconnected")]
    WorkerDisconnected,

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Failure of a single generation call inside a worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SourceError(pub String);

impl From<GenerateError> for SourceError {
    fn from(err: GenerateError) -> Self {
        Self(err.to_string())
    }
}

/// Result type for streaming operations.
pub type StreamingResult<T> = Result<T, StreamingError>;
