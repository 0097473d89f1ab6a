//! # Terrain World
//!
//! Owns the generator, the streaming pipeline and the LOD quadtree. Built
//! once by the host application and handed to collaborators by reference;
//! there is no global terrain state.
//!
//! ## Frame
//!
//! 1. The quadtree follows the camera and yields its leaves
//! 2. Missing leaves are requested, nearest first
//! 3. Tiles ahead of the camera are prefetched
//! 4. The streamer merges results and dispatches work
//! 5. Finished tiles are attached to the quadtree
//! 6. Tiles far behind the camera move to the cache

use std::sync::Arc;

use parking_lot::RwLock;
use stratos_procedural::{Biome, GeneratorConfig, TerrainData, TerrainGenerator, WorldSeed};
use stratos_streaming::prediction::{PREFETCH_BASE_PRIORITY, RING_PENALTY};
use stratos_streaming::{
    GridMeshBuilder, RequestOutcome, SourceError, StreamingStats, TerrainQuadtree, TerrainSource,
    TerrainStreamer, TerrainTile, TileId,
};

use crate::config::TerrainWorldConfig;
use crate::error::WorldResult;

/// Skirt depth for tile meshes (meters).
const SKIRT_DEPTH: f32 = 20.0;

/// Generator behind a lock so it can be swapped while workers run.
///
/// Workers take a snapshot of the current generator per tile; a swap never
/// waits for in-progress generation.
pub struct SharedGenerator {
    current: RwLock<Arc<TerrainGenerator>>,
}

impl SharedGenerator {
    /// Wraps a generator.
    #[must_use]
    pub fn new(generator: TerrainGenerator) -> Self {
        Self {
            current: RwLock::new(Arc::new(generator)),
        }
    }

    /// The generator new tiles will use.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TerrainGenerator> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the generator.
    pub fn replace(&self, generator: TerrainGenerator) {
        *self.current.write() = Arc::new(generator);
    }
}

impl TerrainSource for SharedGenerator {
    fn generate_tile(
        &self,
        tile: TileId,
        resolution: usize,
        tile_size: f64,
    ) -> Result<TerrainData, SourceError> {
        self.snapshot().generate_tile(tile, resolution, tile_size)
    }
}

/// What one [`TerrainWorld::update`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame counter, starting at 1.
    pub frame: u64,
    /// Quadtree leaves this frame.
    pub leaves: usize,
    /// Leaf requests accepted.
    pub requested: usize,
    /// Prefetch requests accepted.
    pub prefetched: usize,
    /// Nodes that received data this frame.
    pub attached: usize,
    /// Tiles moved to the cache.
    pub unloaded: usize,
}

/// The terrain core of one world.
pub struct TerrainWorld {
    config: TerrainWorldConfig,
    generator: Arc<SharedGenerator>,
    streamer: TerrainStreamer,
    quadtree: TerrainQuadtree,
    frame: u64,
}

impl TerrainWorld {
    /// Builds the generator, starts the workers and creates an empty tree.
    ///
    /// # Errors
    ///
    /// `WorldError::Config` for an invalid config, `WorldError::Streaming`
    /// if the worker pool cannot start.
    pub fn new(config: TerrainWorldConfig) -> WorldResult<Self> {
        config.validate()?;

        let generator = Arc::new(SharedGenerator::new(TerrainGenerator::new(
            WorldSeed::new(config.seed),
            config.generator.clone(),
        )));
        let mut streamer = TerrainStreamer::new(
            config.streaming.clone(),
            Arc::clone(&generator) as Arc<dyn TerrainSource>,
            Box::new(GridMeshBuilder::with_skirts(SKIRT_DEPTH)),
        )?;
        streamer.set_sea_level(config.generator.sea_level as f32);
        let quadtree = TerrainQuadtree::new(&config.streaming);

        tracing::info!(
            "Terrain world ready: seed {}, {} m root tiles, {} LOD levels, {} workers",
            config.seed,
            config.streaming.base_tile_size,
            config.streaming.max_lod_level,
            streamer.worker_count()
        );

        Ok(Self {
            config,
            generator,
            streamer,
            quadtree,
            frame: 0,
        })
    }

    /// Runs one frame for a camera at `camera` moving at `velocity`
    /// (meters per second). Never fails; a non-finite camera only advances
    /// the pipeline.
    pub fn update(&mut self, camera: [f64; 3], velocity: [f64; 3], view_distance: f64) -> FrameReport {
        self.frame += 1;
        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        if !camera.iter().chain(&velocity).all(|v| v.is_finite()) {
            tracing::warn!("Frame {}: non-finite camera state, streaming only", self.frame);
            self.streamer.update();
            return report;
        }

        let leaves = self.quadtree.update(camera);
        report.leaves = leaves.len();
        for leaf in leaves {
            if self.streamer.tile(leaf).is_some() || self.streamer.is_pending(leaf) {
                continue;
            }
            let priority = self.leaf_priority(leaf, camera);
            if matches!(
                self.streamer.request_tile(leaf.level, leaf.x, leaf.z, priority, None, None),
                RequestOutcome::Queued | RequestOutcome::CacheHit
            ) {
                report.requested += 1;
            }
        }

        report.prefetched = self.streamer.predict_and_prefetch(camera, velocity, view_distance);
        self.streamer.update();
        report.attached = self.quadtree.attach(&self.streamer);
        report.unloaded = self.streamer.unload_distant(camera, self.keep_radius(velocity));

        tracing::debug!(
            "Frame {}: {} leaves, {} requested, {} prefetched, {} attached, {} unloaded",
            report.frame,
            report.leaves,
            report.requested,
            report.prefetched,
            report.attached,
            report.unloaded
        );
        report
    }

    /// Leaf priority: rings of distance in the leaf's own tile size, always
    /// ahead of prefetches.
    fn leaf_priority(&self, leaf: TileId, camera: [f64; 3]) -> u32 {
        let layout = self.streamer.layout();
        let distance = layout.bounds(leaf).distance_xz(camera[0], camera[2]);
        let rings = (distance / layout.tile_size(leaf.level)).floor() as u32;
        rings.saturating_mul(RING_PENALTY).min(PREFETCH_BASE_PRIORITY - 1)
    }

    /// Tiles beyond this horizontal distance are unloaded.
    fn keep_radius(&self, velocity: [f64; 3]) -> f64 {
        let streaming = &self.config.streaming;
        let window = f64::from(streaming.root_window + 2) * streaming.base_tile_size;
        let travel = velocity[0].hypot(velocity[2]) * streaming.prediction_lookahead_secs;
        window + travel
    }

    /// Elevation under a world position from the finest loaded tile, sea
    /// level where nothing is loaded.
    #[must_use]
    pub fn height_at(&self, world_x: f64, world_z: f64) -> f32 {
        self.streamer.get_height_at(world_x, world_z)
    }

    /// Biome at a world position straight from the generator.
    #[must_use]
    pub fn biome_at(&self, world_x: f64, world_z: f64) -> Biome {
        self.generator.snapshot().classify_point(world_x, world_z)
    }

    /// Swaps in a new generator configuration. Loaded, cached and pending
    /// tiles belong to the old terrain and are dropped.
    ///
    /// # Errors
    ///
    /// `WorldError::Config` if the new configuration is invalid; the world
    /// is unchanged in that case.
    pub fn reload_generator(&mut self, generator: GeneratorConfig) -> WorldResult<()> {
        generator.validate()?;
        self.generator.replace(TerrainGenerator::new(
            WorldSeed::new(self.config.seed),
            generator.clone(),
        ));
        self.streamer.set_sea_level(generator.sea_level as f32);
        self.streamer.clear();
        self.quadtree = TerrainQuadtree::new(&self.config.streaming);
        self.config.generator = generator;
        tracing::info!("Generator configuration reloaded");
        Ok(())
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &TerrainWorldConfig {
        &self.config
    }

    /// The current generator.
    #[must_use]
    pub fn generator(&self) -> Arc<TerrainGenerator> {
        self.generator.snapshot()
    }

    /// The streaming pipeline.
    #[must_use]
    pub const fn streamer(&self) -> &TerrainStreamer {
        &self.streamer
    }

    /// The streaming pipeline, mutably, for explicit requests.
    pub fn streamer_mut(&mut self) -> &mut TerrainStreamer {
        &mut self.streamer
    }

    /// The LOD quadtree.
    #[must_use]
    pub const fn quadtree(&self) -> &TerrainQuadtree {
        &self.quadtree
    }

    /// Quadtree leaves ready to draw.
    #[must_use]
    pub fn renderable_tiles(&self) -> Vec<&TerrainTile> {
        self.quadtree.renderable()
    }

    /// Pipeline statistics.
    #[must_use]
    pub const fn stats(&self) -> StreamingStats {
        self.streamer.stats()
    }

    /// Frames run so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }
}
