//! # Erosion
//!
//! Two passes over a heightmap in meters:
//!
//! - **Hydraulic**: droplets spawn at random positions, follow the bilinear
//!   height gradient with some inertia, pick up sediment while running
//!   downhill below capacity, and drop it when over capacity or climbing.
//! - **Thermal**: material on slopes steeper than the talus angle slides to
//!   the steepest downhill neighbor.
//!
//! Droplet placement comes from a `ChaCha8Rng` seeded per tile, so erosion
//! is reproducible no matter which worker runs it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ErosionConfig;
use crate::terrain::clamp_elevation;

/// Square heightmap view used by both passes.
pub struct Heightfield<'a> {
    heights: &'a mut [f64],
    resolution: usize,
    spacing: f64,
}

impl<'a> Heightfield<'a> {
    /// Wraps a row-major `resolution × resolution` grid.
    ///
    /// Returns `None` if the slice length does not match.
    #[must_use]
    pub fn new(heights: &'a mut [f64], resolution: usize, spacing: f64) -> Option<Self> {
        (resolution >= 2 && heights.len() == resolution * resolution && spacing > 0.0).then_some(Self {
            heights,
            resolution,
            spacing,
        })
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> f64 {
        self.heights[j * self.resolution + i]
    }

    /// Height and gradient (per cell) at a fractional position.
    fn sample(&self, x: f64, z: f64) -> (f64, f64, f64) {
        let i = x.floor() as usize;
        let j = z.floor() as usize;
        let u = x - i as f64;
        let v = z - j as f64;

        let h00 = self.at(i, j);
        let h10 = self.at(i + 1, j);
        let h01 = self.at(i, j + 1);
        let h11 = self.at(i + 1, j + 1);

        let gx = (h10 - h00) * (1.0 - v) + (h11 - h01) * v;
        let gz = (h01 - h00) * (1.0 - u) + (h11 - h10) * u;
        let h = h00 * (1.0 - u) * (1.0 - v) + h10 * u * (1.0 - v) + h01 * (1.0 - u) * v + h11 * u * v;
        (h, gx, gz)
    }

    /// Adds `amount` at a fractional position, split bilinearly.
    fn deposit(&mut self, x: f64, z: f64, amount: f64) {
        let i = x.floor() as usize;
        let j = z.floor() as usize;
        let u = x - i as f64;
        let v = z - j as f64;
        let r = self.resolution;

        self.heights[j * r + i] += amount * (1.0 - u) * (1.0 - v);
        self.heights[j * r + i + 1] += amount * u * (1.0 - v);
        self.heights[(j + 1) * r + i] += amount * (1.0 - u) * v;
        self.heights[(j + 1) * r + i + 1] += amount * u * v;
    }

    /// Whether a fractional position has a full bilinear cell.
    #[inline]
    fn inside(&self, x: f64, z: f64) -> bool {
        let limit = (self.resolution - 1) as f64;
        x >= 0.0 && z >= 0.0 && x < limit && z < limit
    }

    /// Resets non-finite samples to zero and clamps to the envelope.
    pub fn repair(&mut self) -> usize {
        let mut repaired = 0;
        for h in self.heights.iter_mut() {
            if !h.is_finite() {
                repaired += 1;
            }
            *h = clamp_elevation(*h);
        }
        repaired
    }
}

/// Runs the hydraulic droplet pass.
///
/// Returns the total material moved (meters summed over samples).
pub fn hydraulic(field: &mut Heightfield<'_>, config: &ErosionConfig, seed: u64) -> f64 {
    if config.iterations == 0 {
        return 0.0;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let limit = (field.resolution - 1) as f64;
    let mut moved = 0.0;

    for _ in 0..config.iterations {
        let mut x = rng.gen::<f64>() * limit;
        let mut z = rng.gen::<f64>() * limit;
        if !field.inside(x, z) {
            continue;
        }

        let mut dir_x = 0.0;
        let mut dir_z = 0.0;
        let mut speed = 1.0;
        let mut water = 1.0;
        let mut sediment = 0.0;

        for _ in 0..config.max_lifetime {
            let (h, gx, gz) = field.sample(x, z);

            dir_x = dir_x * config.inertia - gx * (1.0 - config.inertia);
            dir_z = dir_z * config.inertia - gz * (1.0 - config.inertia);
            let len = dir_x.hypot(dir_z);
            if len <= 1e-9 || !len.is_finite() {
                break;
            }
            dir_x /= len;
            dir_z /= len;

            let (old_x, old_z) = (x, z);
            x += dir_x;
            z += dir_z;
            if !field.inside(x, z) {
                break;
            }

            let (new_h, _, _) = field.sample(x, z);
            let delta_h = new_h - h;
            if !delta_h.is_finite() {
                break;
            }

            let capacity = ((-delta_h).max(0.0) * speed * water * config.capacity_factor)
                .max(config.min_capacity);

            if sediment > capacity || delta_h > 0.0 {
                let amount = if delta_h > 0.0 {
                    sediment.min(delta_h)
                } else {
                    (sediment - capacity) * config.deposition_rate
                };
                sediment -= amount;
                field.deposit(old_x, old_z, amount);
                moved += amount;
            } else {
                let amount = ((capacity - sediment) * config.erosion_rate).min(-delta_h);
                sediment += amount;
                field.deposit(old_x, old_z, -amount);
                moved += amount;
            }

            // Accelerates downhill, slows climbing
            let slope = delta_h / field.spacing;
            speed = (speed * speed - slope * config.gravity)
                .max(0.0)
                .sqrt()
                .min(config.max_speed);
            water *= 1.0 - config.evaporation;
        }
    }

    field.repair();
    moved
}

/// Runs the thermal talus pass.
///
/// Returns the total material moved.
pub fn thermal(field: &mut Heightfield<'_>, config: &ErosionConfig) -> f64 {
    const NEIGHBORS: [(i64, i64); 8] = [
        (-1, 0),
        (1, 0),
        (0, -1),
        (0, 1),
        (-1, -1),
        (1, -1),
        (-1, 1),
        (1, 1),
    ];

    let r = field.resolution;
    let mut delta = vec![0.0; r * r];
    let mut moved = 0.0;

    for _ in 0..config.thermal_iterations {
        delta.iter_mut().for_each(|d| *d = 0.0);

        for j in 0..r {
            for i in 0..r {
                let h = field.at(i, j);
                let mut steepest: Option<(usize, f64, f64)> = None;

                for (di, dj) in NEIGHBORS {
                    let ni = i as i64 + di;
                    let nj = j as i64 + dj;
                    if ni < 0 || nj < 0 || ni >= r as i64 || nj >= r as i64 {
                        continue;
                    }
                    let (ni, nj) = (ni as usize, nj as usize);
                    let distance = if di == 0 || dj == 0 {
                        field.spacing
                    } else {
                        field.spacing * std::f64::consts::SQRT_2
                    };
                    let drop = h - field.at(ni, nj);
                    let slope = drop / distance;
                    if slope > steepest.map_or(config.talus_slope, |s| s.1) {
                        steepest = Some((nj * r + ni, slope, drop - config.talus_slope * distance));
                    }
                }

                if let Some((target, _, excess)) = steepest {
                    let amount = 0.5 * excess * config.thermal_rate;
                    delta[j * r + i] -= amount;
                    delta[target] += amount;
                    moved += amount;
                }
            }
        }

        for (h, d) in field.heights.iter_mut().zip(&delta) {
            *h += d;
        }
    }

    field.repair();
    moved
}
