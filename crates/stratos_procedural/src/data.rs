//! # Terrain Data Block
//!
//! The value type a generator run produces for one tile: a square grid of
//! `resolution × resolution` samples, row-major with Z as the row axis.
//!
//! ## Invariants
//!
//! - `heightmap.len() == resolution²`, and every per-sample array matches it
//! - No sample holds a non-finite value once the block is published
//!   ([`TerrainData::sanitize`] enforces this)

use crate::biome::Biome;
use crate::water::WaterBody;

/// Generated terrain for one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainData {
    /// Samples per side.
    pub resolution: usize,
    /// World-space edge length of the tile (meters).
    pub tile_size: f64,
    /// World X of sample (0, 0).
    pub origin_x: f64,
    /// World Z of sample (0, 0).
    pub origin_z: f64,
    /// Elevation in meters.
    pub heightmap: Vec<f32>,
    /// Unit surface normals, Y up.
    pub normals: Vec<[f32; 3]>,
    /// Slope in radians, `[0, π/2]`.
    pub slopes: Vec<f32>,
    /// Biome / material per sample.
    pub materials: Vec<Biome>,
    /// Whether the sample is covered by water.
    pub water_mask: Vec<bool>,
    /// Texture coordinates in `[0, 1]`.
    pub uvs: Vec<[f32; 2]>,
    /// Connected water regions found in this tile.
    pub water_bodies: Vec<WaterBody>,
}

/// Summary statistics of a heightmap.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TerrainStats {
    /// Lowest sample (meters).
    pub min_elevation: f32,
    /// Highest sample (meters).
    pub max_elevation: f32,
    /// Mean elevation (meters).
    pub mean_elevation: f32,
    /// Population standard deviation of elevation (meters).
    pub roughness: f32,
    /// Fraction of samples flagged as water.
    pub water_fraction: f32,
}

impl TerrainData {
    /// Samples in the grid.
    #[inline]
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.resolution * self.resolution
    }

    /// Row-major index of sample `(i, j)`; `i` runs along X, `j` along Z.
    #[inline]
    #[must_use]
    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.resolution + i
    }

    /// Distance between neighboring samples (meters).
    #[inline]
    #[must_use]
    pub fn spacing(&self) -> f64 {
        if self.resolution > 1 {
            self.tile_size / (self.resolution - 1) as f64
        } else {
            self.tile_size
        }
    }

    /// Elevation of sample `(i, j)`, clamped to the grid.
    #[inline]
    #[must_use]
    pub fn height(&self, i: usize, j: usize) -> f32 {
        let last = self.resolution.saturating_sub(1);
        self.heightmap
            .get(self.index(i.min(last), j.min(last)))
            .copied()
            .unwrap_or(0.0)
    }

    /// Bilinear elevation at normalized tile coordinates `u, v ∈ [0, 1]`.
    #[must_use]
    pub fn height_at_local(&self, u: f64, v: f64) -> f32 {
        if self.resolution == 0 || !u.is_finite() || !v.is_finite() {
            return 0.0;
        }
        let last = (self.resolution - 1) as f64;
        let fx = (u.clamp(0.0, 1.0) * last).max(0.0);
        let fz = (v.clamp(0.0, 1.0) * last).max(0.0);
        let i0 = fx.floor() as usize;
        let j0 = fz.floor() as usize;
        let i1 = (i0 + 1).min(self.resolution - 1);
        let j1 = (j0 + 1).min(self.resolution - 1);
        let tx = (fx - i0 as f64) as f32;
        let tz = (fz - j0 as f64) as f32;

        let h00 = self.height(i0, j0);
        let h10 = self.height(i1, j0);
        let h01 = self.height(i0, j1);
        let h11 = self.height(i1, j1);

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    /// Bilinear elevation at a world position, `None` outside the tile.
    #[must_use]
    pub fn height_at_world(&self, world_x: f64, world_z: f64) -> Option<f32> {
        if self.tile_size <= 0.0 {
            return None;
        }
        let u = (world_x - self.origin_x) / self.tile_size;
        let v = (world_z - self.origin_z) / self.tile_size;
        if (0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v) {
            Some(self.height_at_local(u, v))
        } else {
            None
        }
    }

    /// Whether every per-sample array has `resolution²` entries.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let n = self.sample_count();
        self.heightmap.len() == n
            && self.normals.len() == n
            && self.slopes.len() == n
            && self.materials.len() == n
            && self.water_mask.len() == n
            && self.uvs.len() == n
    }

    /// Replaces non-finite values with safe defaults: `sea_level` for
    /// elevation, straight up for normals, zero for slopes and UVs.
    ///
    /// Returns the number of values replaced.
    pub fn sanitize(&mut self, sea_level: f32) -> usize {
        let mut replaced = 0;
        for h in &mut self.heightmap {
            if !h.is_finite() {
                *h = sea_level;
                replaced += 1;
            }
        }
        for n in &mut self.normals {
            if !n.iter().all(|c| c.is_finite()) {
                *n = [0.0, 1.0, 0.0];
                replaced += 1;
            }
        }
        for s in &mut self.slopes {
            if !s.is_finite() {
                *s = 0.0;
                replaced += 1;
            }
        }
        for uv in &mut self.uvs {
            if !uv.iter().all(|c| c.is_finite()) {
                *uv = [0.0, 0.0];
                replaced += 1;
            }
        }
        replaced
    }

    /// Elevation statistics (population standard deviation as roughness).
    #[must_use]
    pub fn stats(&self) -> TerrainStats {
        if self.heightmap.is_empty() {
            return TerrainStats::default();
        }
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        for &h in &self.heightmap {
            min = min.min(h);
            max = max.max(h);
            sum += f64::from(h);
        }
        let n = self.heightmap.len() as f64;
        let mean = sum / n;
        let variance = self
            .heightmap
            .iter()
            .map(|&h| {
                let d = f64::from(h) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let water = self.water_mask.iter().filter(|&&w| w).count();

        TerrainStats {
            min_elevation: min,
            max_elevation: max,
            mean_elevation: mean as f32,
            roughness: variance.sqrt() as f32,
            water_fraction: water as f32 / n as f32,
        }
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn memory_bytes(&self) -> usize {
        use std::mem::size_of;
        size_of::<Self>()
            + self.heightmap.capacity() * size_of::<f32>()
            + self.normals.capacity() * size_of::<[f32; 3]>()
            + self.slopes.capacity() * size_of::<f32>()
            + self.materials.capacity() * size_of::<Biome>()
            + self.water_mask.capacity() * size_of::<bool>()
            + self.uvs.capacity() * size_of::<[f32; 2]>()
            + self.water_bodies.capacity() * size_of::<WaterBody>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(resolution: usize) -> TerrainData {
        let n = resolution * resolution;
        let mut heightmap = Vec::with_capacity(n);
        for j in 0..resolution {
            for i in 0..resolution {
                heightmap.push((i * 10 + j) as f32);
            }
        }
        TerrainData {
            resolution,
            tile_size: 100.0,
            origin_x: 1000.0,
            origin_z: -200.0,
            heightmap,
            normals: vec![[0.0, 1.0, 0.0]; n],
            slopes: vec![0.0; n],
            materials: vec![Biome::Grassland; n],
            water_mask: vec![false; n],
            uvs: vec![[0.0, 0.0]; n],
            water_bodies: Vec::new(),
        }
    }

    #[test]
    fn test_bilinear_hits_samples_and_midpoints() {
        let data = ramp(3);
        assert_eq!(data.height_at_local(0.0, 0.0), 0.0);
        assert_eq!(data.height_at_local(1.0, 1.0), 22.0);
        // Halfway between (0,0)=0 and (1,0)=10
        assert!((data.height_at_local(0.25, 0.0) - 5.0).abs() < 1e-5);
        assert!((data.height_at_world(1050.0, -150.0).unwrap() - 11.0).abs() < 1e-4);
        assert!(data.height_at_world(999.0, -150.0).is_none());
    }

    #[test]
    fn test_sanitize_replaces_non_finite() {
        let mut data = ramp(2);
        data.heightmap[1] = f32::NAN;
        data.normals[2] = [f32::INFINITY, 1.0, 0.0];
        data.slopes[3] = f32::NAN;

        assert_eq!(data.sanitize(-3.0), 3);
        assert_eq!(data.heightmap[1], -3.0);
        assert_eq!(data.normals[2], [0.0, 1.0, 0.0]);
        assert_eq!(data.slopes[3], 0.0);
        assert_eq!(data.sanitize(0.0), 0);
    }

    #[test]
    fn test_stats_population_std_dev() {
        let mut data = ramp(2);
        data.heightmap = vec![2.0, 4.0, 4.0, 6.0];
        let stats = data.stats();
        assert_eq!(stats.min_elevation, 2.0);
        assert_eq!(stats.max_elevation, 6.0);
        assert!((stats.mean_elevation - 4.0).abs() < 1e-6);
        assert!((stats.roughness - 2.0f32.sqrt()).abs() < 1e-6);
        assert!(data.is_consistent());
    }
}
