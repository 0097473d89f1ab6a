//! # Streaming Configuration
//!
//! Loaded once at startup as part of the world TOML; every field has a
//! default so partial files work.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratos_procedural::{ConfigError, ConfigResult, TerrainGenerator};

use crate::tile::TileLayout;

/// Streaming pipeline and quadtree tunables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Edge length of a level-0 tile (meters).
    pub base_tile_size: f64,
    /// Samples per tile side, at every level.
    pub resolution: usize,
    /// Deepest quadtree level.
    pub max_lod_level: u8,
    /// Tiles subdivide within `tile_size × factor` of the camera.
    pub subdivide_distance_factor: f64,
    /// Geometric error above which a tile subdivides.
    pub error_threshold: f64,
    /// Level-0 tiles kept around the camera, as a radius in tiles.
    pub root_window: i32,
    /// Time allowed per `update` for merging results (milliseconds).
    pub frame_budget_ms: f64,
    /// Maximum requests in flight at once.
    pub max_concurrent_requests: usize,
    /// Maximum dispatches per `update`.
    pub max_requests_per_frame: usize,
    /// Maximum queued requests; further requests are dropped.
    pub queue_capacity: usize,
    /// Maximum cache entries.
    pub cache_max_entries: usize,
    /// Cache entries older than this are evicted first (seconds).
    pub cache_max_age_secs: f64,
    /// In-flight requests submitted longer ago than this fail (seconds).
    pub request_timeout_secs: f64,
    /// Retries after the first failed attempt.
    pub retry_attempts: u32,
    /// Delay before a retry is dispatched (milliseconds).
    pub retry_delay_ms: u64,
    /// How far ahead prediction extrapolates the camera (seconds).
    pub prediction_lookahead_secs: f64,
    /// Number of levels prediction prefetches, coarsest first.
    pub prediction_levels: u8,
    /// Largest prefetch radius per level, in tiles.
    pub prediction_max_radius: i32,
    /// Generation worker threads.
    pub worker_count: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            base_tile_size: 8192.0,
            resolution: 65,
            max_lod_level: 6,
            subdivide_distance_factor: 2.5,
            error_threshold: 25.0,
            root_window: 2,
            frame_budget_ms: 4.0,
            max_concurrent_requests: 4,
            max_requests_per_frame: 8,
            queue_capacity: 256,
            cache_max_entries: 128,
            cache_max_age_secs: 300.0,
            request_timeout_secs: 10.0,
            retry_attempts: 2,
            retry_delay_ms: 250,
            prediction_lookahead_secs: 2.0,
            prediction_levels: 3,
            prediction_max_radius: 4,
            worker_count: 2,
        }
    }
}

impl StreamingConfig {
    /// Rejects values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !self.base_tile_size.is_finite() || self.base_tile_size <= 0.0 {
            return invalid("streaming.base_tile_size must be positive");
        }
        if !(TerrainGenerator::MIN_RESOLUTION..=TerrainGenerator::MAX_RESOLUTION)
            .contains(&self.resolution)
        {
            return invalid("streaming.resolution must be in 2..=1025");
        }
        if self.max_lod_level > TerrainGenerator::MAX_LEVEL {
            return invalid("streaming.max_lod_level must be <= 30");
        }
        if self.max_concurrent_requests == 0 {
            return invalid("streaming.max_concurrent_requests must be >= 1");
        }
        if self.max_requests_per_frame == 0 {
            return invalid("streaming.max_requests_per_frame must be >= 1");
        }
        if self.worker_count == 0 {
            return invalid("streaming.worker_count must be >= 1");
        }
        if !(self.frame_budget_ms > 0.0 && self.frame_budget_ms.is_finite()) {
            return invalid("streaming.frame_budget_ms must be positive");
        }
        if !(self.request_timeout_secs > 0.0 && self.request_timeout_secs.is_finite()) {
            return invalid("streaming.request_timeout_secs must be positive");
        }
        if !(self.cache_max_age_secs > 0.0 && self.cache_max_age_secs.is_finite()) {
            return invalid("streaming.cache_max_age_secs must be positive");
        }
        if !(self.prediction_lookahead_secs >= 0.0 && self.prediction_lookahead_secs.is_finite()) {
            return invalid("streaming.prediction_lookahead_secs must be non-negative");
        }
        if self.root_window < 0 || self.prediction_max_radius < 0 {
            return invalid("streaming.root_window and prediction_max_radius must be >= 0");
        }
        if !(self.subdivide_distance_factor > 0.0 && self.subdivide_distance_factor.is_finite()) {
            return invalid("streaming.subdivide_distance_factor must be positive");
        }
        Ok(())
    }

    /// Tile geometry derived from this config.
    #[must_use]
    pub fn layout(&self) -> TileLayout {
        TileLayout {
            base_tile_size: self.base_tile_size,
            max_level: self.max_lod_level,
            subdivide_distance_factor: self.subdivide_distance_factor,
        }
    }

    /// Frame budget as a duration.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(self.frame_budget_ms.max(0.0) / 1000.0)
    }

    /// Request timeout as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs.max(0.0))
    }

    /// Cache max age as a duration.
    #[must_use]
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs_f64(self.cache_max_age_secs.max(0.0))
    }

    /// Retry delay as a duration.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
