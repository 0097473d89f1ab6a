//! # World Configuration
//!
//! One TOML document configures the whole terrain core:
//!
//! ```toml
//! seed = 12345
//!
//! [generator]
//! sea_level = 0.0
//!
//! [generator.erosion]
//! iterations = 2000
//!
//! [streaming]
//! resolution = 65
//! worker_count = 4
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use stratos_procedural::{ConfigResult, GeneratorConfig};
use stratos_streaming::StreamingConfig;

/// Default world seed.
pub const DEFAULT_SEED: u64 = 12345;

/// Complete terrain world configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainWorldConfig {
    /// World seed. Same seed, same planet.
    pub seed: u64,
    /// Terrain model.
    pub generator: GeneratorConfig,
    /// Streaming pipeline and quadtree.
    pub streaming: StreamingConfig,
}

impl Default for TerrainWorldConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            generator: GeneratorConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

impl TerrainWorldConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io`, `ConfigError::Parse` or `ConfigError::Invalid`.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            "Loaded world config from {}: seed {}, {} landmasses, resolution {}",
            path.display(),
            config.seed,
            config.generator.landmasses.len(),
            config.streaming.resolution
        );
        Ok(config)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        self.generator.validate()?;
        self.streaming.validate()
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Only if a value has no TOML representation (a seed above `i64::MAX`).
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
