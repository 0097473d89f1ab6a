//! # Terrain Sources
//!
//! The worker pool only knows how to call a [`TerrainSource`]. The real
//! source is the procedural generator; tests plug in counting or failing
//! sources.

use stratos_procedural::{TerrainData, TerrainGenerator};

use crate::error::SourceError;
use crate::tile::TileId;

/// Produces terrain data for a tile. Called concurrently from worker
/// threads.
pub trait TerrainSource: Send + Sync {
    /// Generates `tile` with `resolution` samples per side over
    /// `tile_size` meters.
    ///
    /// # Errors
    ///
    /// Any failure; the pipeline retries it.
    fn generate_tile(
        &self,
        tile: TileId,
        resolution: usize,
        tile_size: f64,
    ) -> Result<TerrainData, SourceError>;
}

impl TerrainSource for TerrainGenerator {
    fn generate_tile(
        &self,
        tile: TileId,
        resolution: usize,
        tile_size: f64,
    ) -> Result<TerrainData, SourceError> {
        TerrainGenerator::generate(self, tile.x, tile.z, tile.level, resolution, tile_size)
            .map_err(SourceError::from)
    }
}
