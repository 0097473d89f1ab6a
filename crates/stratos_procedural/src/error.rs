//! # Procedural Error Types
//!
//! The generator only rejects requests it cannot interpret. Numeric trouble
//! inside the pipeline (NaN, overflow) is repaired in place and never
//! surfaces here.

use thiserror::Error;

/// Invalid tile request parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    /// Grid resolution outside the supported range.
    #[error("invalid resolution {resolution}: must be in {min}..={max}")]
    InvalidResolution {
        /// The requested resolution.
        resolution: usize,
        /// Smallest supported resolution.
        min: usize,
        /// Largest supported resolution.
        max: usize,
    },

    /// Tile size not finite or not positive.
    #[error("invalid tile size {0}")]
    InvalidTileSize(f64),

    /// Quadtree level beyond what tile coordinates can address.
    #[error("invalid level {level}: maximum is {max}")]
    InvalidLevel {
        /// The requested level.
        level: u8,
        /// Deepest supported level.
        max: u8,
    },
}

/// Configuration loading failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not read the file.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML or wrong value types.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for generation.
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
