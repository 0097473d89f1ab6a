//! # Predictive Prefetch
//!
//! Extrapolates the camera along its velocity and lists the tiles around
//! the predicted position for the coarsest few levels.
//!
//! ## Priority
//!
//! Prefetch priorities start at [`PREFETCH_BASE_PRIORITY`] so explicit
//! requests stay ahead of them. Each ring of distance from the predicted
//! tile adds [`RING_PENALTY`]; each level coarser than the finest
//! prefetched level adds one.

use crate::config::StreamingConfig;
use crate::error::{StreamingError, StreamingResult};
use crate::tile::{TileId, TileLayout};

/// Lowest priority value a prefetch gets.
pub const PREFETCH_BASE_PRIORITY: u32 = 100;

/// Priority added per ring of distance.
pub const RING_PENALTY: u32 = 10;

/// A tile the predictor wants loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prefetch {
    /// The tile.
    pub tile: TileId,
    /// Request priority (lower is more urgent).
    pub priority: u32,
}

/// Camera motion predictor.
#[derive(Clone, Copy, Debug)]
pub struct Predictor {
    layout: TileLayout,
    lookahead_secs: f64,
    levels: u8,
    max_radius: i32,
}

impl Predictor {
    /// Builds a predictor from the streaming config.
    #[must_use]
    pub fn new(config: &StreamingConfig) -> Self {
        Self {
            layout: config.layout(),
            lookahead_secs: config.prediction_lookahead_secs,
            levels: config.prediction_levels,
            max_radius: config.prediction_max_radius,
        }
    }

    /// Camera position after the lookahead.
    #[must_use]
    pub fn predicted_position(&self, position: [f64; 3], velocity: [f64; 3]) -> [f64; 3] {
        [
            position[0] + velocity[0] * self.lookahead_secs,
            position[1] + velocity[1] * self.lookahead_secs,
            position[2] + velocity[2] * self.lookahead_secs,
        ]
    }

    /// Tiles to prefetch, most urgent first.
    ///
    /// # Errors
    ///
    /// `StreamingError::InvalidInput` if any input is non-finite or the view
    /// distance is negative.
    pub fn plan(
        &self,
        position: [f64; 3],
        velocity: [f64; 3],
        view_distance: f64,
    ) -> StreamingResult<Vec<Prefetch>> {
        if !position.iter().chain(&velocity).all(|v| v.is_finite()) {
            return Err(StreamingError::InvalidInput(format!(
                "non-finite camera state: position {position:?}, velocity {velocity:?}"
            )));
        }
        if !view_distance.is_finite() || view_distance < 0.0 {
            return Err(StreamingError::InvalidInput(format!(
                "invalid view distance {view_distance}"
            )));
        }

        let predicted = self.predicted_position(position, velocity);
        if !predicted.iter().all(|v| v.is_finite()) {
            return Err(StreamingError::InvalidInput(
                "predicted camera position overflowed".to_string(),
            ));
        }

        let top = self.levels.min(self.layout.max_level.saturating_add(1));
        let mut plan = Vec::new();
        for level in 0..top {
            let size = self.layout.tile_size(level);
            let radius = ((view_distance / size).ceil() as i32).clamp(1, self.max_radius.max(1));
            let center = self.layout.tile_at(predicted[0], predicted[2], level);
            let coarseness = u32::from(top - 1 - level);

            for dz in -radius..=radius {
                for dx in -radius..=radius {
                    let ring = dx.unsigned_abs().max(dz.unsigned_abs());
                    plan.push(Prefetch {
                        tile: TileId::new(level, center.x.saturating_add(dx), center.z.saturating_add(dz)),
                        priority: PREFETCH_BASE_PRIORITY + ring * RING_PENALTY + coarseness,
                    });
                }
            }
        }

        plan.sort_by_key(|p| (p.priority, p.tile));
        Ok(plan)
    }
}
