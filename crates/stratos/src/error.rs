//! # World Error Types

use stratos_procedural::ConfigError;
use stratos_streaming::StreamingError;
use thiserror::Error;

/// Failures constructing or reconfiguring a [`crate::TerrainWorld`].
#[derive(Error, Debug)]
pub enum WorldError {
    /// Configuration could not be read, parsed or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The streaming pipeline could not start.
    #[error("streaming error: {0}")]
    Streaming(#[from] StreamingError),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
