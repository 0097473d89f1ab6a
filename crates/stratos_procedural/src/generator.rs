//! # Tile Generator
//!
//! Turns `(tile_x, tile_z, level, resolution, tile_size)` into a fully
//! populated [`TerrainData`]. Stages run in order:
//!
//! 1. Base elevation from the layered noise model
//! 2. Hydraulic and thermal erosion
//! 3. Water bodies, beach puddles and beach profiles
//! 4. Normals and slopes of the final heightmap
//! 5. Climate, biome rules and smoothing
//!
//! Only request parameters can fail. Numeric trouble inside the stages is
//! repaired in place so a valid request always yields a publishable block.

use std::time::Instant;

use crate::biome::{Biome, BiomeRules, SurfaceSample};
use crate::climate::ClimateModel;
use crate::config::GeneratorConfig;
use crate::data::TerrainData;
use crate::erosion::{self, Heightfield};
use crate::error::{GenerateError, GenerateResult};
use crate::noise::WorldSeed;
use crate::terrain::{self, ElevationModel};
use crate::water::{WaterAnalyzer, WaterKind};

/// Terrain generator. Immutable after construction; share it across worker
/// threads behind an `Arc`.
pub struct TerrainGenerator {
    seed: WorldSeed,
    config: GeneratorConfig,
    elevation: ElevationModel,
    climate: ClimateModel,
    biomes: BiomeRules,
}

impl TerrainGenerator {
    /// Smallest accepted grid resolution.
    pub const MIN_RESOLUTION: usize = 2;
    /// Largest accepted grid resolution.
    pub const MAX_RESOLUTION: usize = 1025;
    /// Deepest accepted quadtree level.
    pub const MAX_LEVEL: u8 = 30;

    /// Builds all permutation tables for `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed, config: GeneratorConfig) -> Self {
        Self {
            elevation: ElevationModel::new(seed, &config),
            climate: ClimateModel::new(seed, &config),
            biomes: BiomeRules::new(config.biomes),
            seed,
            config,
        }
    }

    /// The world seed.
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }

    /// The configuration this generator was built with.
    #[must_use]
    pub const fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Checks request parameters.
    ///
    /// # Errors
    ///
    /// The matching [`GenerateError`] variant.
    pub fn validate_request(level: u8, resolution: usize, tile_size: f64) -> GenerateResult<()> {
        if !(Self::MIN_RESOLUTION..=Self::MAX_RESOLUTION).contains(&resolution) {
            return Err(GenerateError::InvalidResolution {
                resolution,
                min: Self::MIN_RESOLUTION,
                max: Self::MAX_RESOLUTION,
            });
        }
        if !tile_size.is_finite() || tile_size <= 0.0 {
            return Err(GenerateError::InvalidTileSize(tile_size));
        }
        if level > Self::MAX_LEVEL {
            return Err(GenerateError::InvalidLevel {
                level,
                max: Self::MAX_LEVEL,
            });
        }
        Ok(())
    }

    /// Generates one tile.
    ///
    /// # Arguments
    ///
    /// * `tile_x`, `tile_z` - Tile coordinates at this level
    /// * `level` - Quadtree level (seeds erosion)
    /// * `resolution` - Samples per side
    /// * `tile_size` - Edge length in meters
    ///
    /// # Errors
    ///
    /// Only for invalid parameters; see [`Self::validate_request`].
    pub fn generate(
        &self,
        tile_x: i32,
        tile_z: i32,
        level: u8,
        resolution: usize,
        tile_size: f64,
    ) -> GenerateResult<TerrainData> {
        Self::validate_request(level, resolution, tile_size)?;
        let started = Instant::now();

        let spacing = tile_size / (resolution - 1) as f64;
        let origin_x = f64::from(tile_x) * tile_size;
        let origin_z = f64::from(tile_z) * tile_size;
        let world = |i: usize, j: usize| (origin_x + i as f64 * spacing, origin_z + j as f64 * spacing);
        let n = resolution * resolution;

        // Stage 1: base elevation
        let mut heights = Vec::with_capacity(n);
        for j in 0..resolution {
            for i in 0..resolution {
                let (x, z) = world(i, j);
                heights.push(self.elevation.elevation(x, z));
            }
        }

        // Stage 2: erosion
        if let Some(mut field) = Heightfield::new(&mut heights, resolution, spacing) {
            let erosion_seed = self.seed.for_tile(tile_x, tile_z, level).value();
            erosion::hydraulic(&mut field, &self.config.erosion, erosion_seed);
            erosion::thermal(&mut field, &self.config.erosion);
        }

        // Stage 3: water bodies and beaches
        let water = WaterAnalyzer::new(
            &self.config.water,
            self.config.sea_level,
            self.config.high_land_threshold,
            resolution,
            spacing,
        )
        .analyze(&mut heights);
        for h in &mut heights {
            *h = terrain::clamp_elevation(*h);
        }

        // Stage 4: surface
        let (normals, slopes) = terrain::surface(&heights, resolution, spacing);

        // Stage 5: climate and biomes
        let mut materials = Vec::with_capacity(n);
        for j in 0..resolution {
            for i in 0..resolution {
                let index = j * resolution + i;
                let (x, z) = world(i, j);
                let sample = SurfaceSample {
                    elevation: heights[index],
                    slope: f64::from(slopes[index]),
                    water: water.kinds[index],
                    beach: water.beach[index],
                    climate: self.climate.sample(x, z, heights[index]),
                };
                materials.push(self.biomes.classify(&sample));
            }
        }
        self.biomes.smooth(&mut materials, resolution);

        let last = (resolution - 1) as f32;
        let uvs = (0..n)
            .map(|k| [(k % resolution) as f32 / last, (k / resolution) as f32 / last])
            .collect();

        let mut data = TerrainData {
            resolution,
            tile_size,
            origin_x,
            origin_z,
            heightmap: heights.iter().map(|&h| h as f32).collect(),
            normals,
            slopes,
            materials,
            water_mask: water.mask(),
            uvs,
            water_bodies: water.bodies,
        };
        let repaired = data.sanitize(self.config.sea_level as f32);

        let stats = data.stats();
        tracing::debug!(
            "Tile L{}_X{}_Z{}: elevation {:.1}..{:.1} m, {} water bodies, {} repaired, {:?}",
            level,
            tile_x,
            tile_z,
            stats.min_elevation,
            stats.max_elevation,
            data.water_bodies.len(),
            repaired,
            started.elapsed()
        );

        Ok(data)
    }

    /// Pre-erosion elevation at a world position (meters).
    #[must_use]
    pub fn sample_elevation(&self, world_x: f64, world_z: f64) -> f64 {
        self.elevation.elevation(world_x, world_z)
    }

    /// Biome at a single world position without generating a tile.
    ///
    /// Uses the pre-erosion elevation; water below sea level is treated as
    /// ocean because region shape is unknown at a single point.
    #[must_use]
    pub fn classify_point(&self, world_x: f64, world_z: f64) -> Biome {
        const PROBE: f64 = 5.0;

        let elevation = self.sample_elevation(world_x, world_z);
        let dx = (self.sample_elevation(world_x + PROBE, world_z)
            - self.sample_elevation(world_x - PROBE, world_z))
            / (2.0 * PROBE);
        let dz = (self.sample_elevation(world_x, world_z + PROBE)
            - self.sample_elevation(world_x, world_z - PROBE))
            / (2.0 * PROBE);

        let sample = SurfaceSample {
            elevation,
            slope: dx.hypot(dz).atan(),
            water: (elevation <= self.config.sea_level).then_some(WaterKind::Ocean),
            beach: false,
            climate: self.climate.sample(world_x, world_z, elevation),
        };
        self.biomes.classify(&sample)
    }
}
