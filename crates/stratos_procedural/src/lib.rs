//! # STRATOS Procedural Terrain
//!
//! Deterministic heightmap and biome generation for a flight-simulation
//! world.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and tile always produce the same data
//! 2. **Tiled**: Terrain is generated per square tile at any quadtree level
//! 3. **Best-effort**: A valid request always completes; numeric faults are
//!    repaired, never reported
//! 4. **Shareable**: The generator is immutable after construction
//!
//! ## Core Components
//!
//! - `SimplexNoise` / `NoiseLayer`: seeded FBM and ridged noise
//! - `ElevationModel`: continental, mountain, hill, valley and detail layers
//! - `erosion`: hydraulic droplets and thermal talus relaxation
//! - `WaterAnalyzer`: connected water regions and beach profiles
//! - `ClimateModel` / `BiomeRules`: climate-driven biome classification
//! - `TerrainGenerator`: runs the stages and produces `TerrainData`
//!
//! ## Example
//!
//! ```rust
//! use stratos_procedural::{GeneratorConfig, TerrainGenerator, WorldSeed};
//!
//! let generator = TerrainGenerator::new(WorldSeed::new(12345), GeneratorConfig::default());
//! let tile = generator.generate(0, 0, 0, 32, 1000.0).unwrap();
//!
//! assert_eq!(tile.heightmap.len(), 32 * 32);
//! assert!(tile.water_mask.iter().any(|&w| w));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod biome;
pub mod climate;
pub mod config;
pub mod data;
pub mod erosion;
pub mod error;
pub mod generator;
pub mod noise;
pub mod terrain;
pub mod water;

pub use biome::{Biome, BiomeRules, SurfaceSample};
pub use climate::{ClimateModel, ClimateSample};
pub use config::{
    BiomeConfig, ClimateConfig, ErosionConfig, GeneratorConfig, Landmass, LatitudeConfig,
    LayerTable, TerrainCurve, WaterConfig, MAX_ELEVATION, MIN_ELEVATION,
};
pub use data::{TerrainData, TerrainStats};
pub use error::{ConfigError, ConfigResult, GenerateError, GenerateResult};
pub use generator::TerrainGenerator;
pub use noise::{NoiseLayer, NoiseLayerConfig, SimplexNoise, WorldSeed};
pub use terrain::ElevationModel;
pub use water::{WaterAnalyzer, WaterBody, WaterKind, WaterMap};
