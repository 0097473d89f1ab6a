//! # Elevation Model
//!
//! Layered noise to meters. The normalized elevation `e ∈ [-1, 1]` is
//!
//! ```text
//! base   = continental_factor + continental_fbm · a_c
//! land   = smoothstep(0, 0.25, base)
//! relief = land · latitude_factor · (ridged_mountains · a_m + hills01 · a_h)
//! carve  = land · ridged_valleys³ · a_v
//! e      = base + relief - carve + detail_fbm · a_d
//! ```
//!
//! and the terrain curve maps it to meters: the ocean side is concave so
//! shelves stay shallow, the land side is a power curve so lowlands stay
//! flat and peaks sharpen.

use crate::config::{GeneratorConfig, Landmass, LatitudeConfig, TerrainCurve, MAX_ELEVATION, MIN_ELEVATION};
use crate::noise::{NoiseLayer, WorldSeed};

/// Exponent applied to ridged valley noise before carving.
const VALLEY_POWER: i32 = 3;
/// `base` value at which land relief reaches full strength.
const LAND_RAMP: f64 = 0.25;

/// Seeded elevation sampler.
pub struct ElevationModel {
    continental: NoiseLayer,
    mountains: NoiseLayer,
    hills: NoiseLayer,
    valleys: NoiseLayer,
    detail: NoiseLayer,
    landmasses: Vec<Landmass>,
    latitude: LatitudeConfig,
    curve: TerrainCurve,
}

impl ElevationModel {
    /// Builds one permutation table per layer.
    #[must_use]
    pub fn new(seed: WorldSeed, config: &GeneratorConfig) -> Self {
        let layers = &config.layers;
        Self {
            continental: NoiseLayer::new(seed.derive(1), layers.continental),
            mountains: NoiseLayer::new(seed.derive(2), layers.mountains),
            hills: NoiseLayer::new(seed.derive(3), layers.hills),
            valleys: NoiseLayer::new(seed.derive(4), layers.valleys),
            detail: NoiseLayer::new(seed.derive(5), layers.detail),
            landmasses: config.landmasses.clone(),
            latitude: config.latitude,
            curve: config.curve,
        }
    }

    /// Distance falloff from the nearest landmass center, in `[-1, 1]`.
    ///
    /// 1 at a center, 0 at its radius, negative beyond. Zero when no
    /// landmass is configured.
    #[must_use]
    pub fn continental_factor(&self, world_x: f64, world_z: f64) -> f64 {
        self.landmasses
            .iter()
            .map(|land| {
                let distance = (world_x - land.x).hypot(world_z - land.z);
                1.0 - distance / land.radius
            })
            .reduce(f64::max)
            .map_or(0.0, |f| f.clamp(-1.0, 1.0))
    }

    /// Relief multiplier in `[1 - polar_relief_damping, 1]`.
    #[must_use]
    pub fn latitude_factor(&self, world_z: f64) -> f64 {
        let degrees = crate::climate::latitude_degrees(&self.latitude, world_z);
        let polar = degrees.abs() / 90.0;
        1.0 - self.latitude.polar_relief_damping.clamp(0.0, 1.0) * polar * polar
    }

    /// Normalized elevation in `[-1, 1]`.
    #[must_use]
    pub fn normalized(&self, world_x: f64, world_z: f64) -> f64 {
        let base = self.continental_factor(world_x, world_z)
            + self.continental.fbm(world_x, world_z) * self.continental.amplitude();
        let land = smoothstep(0.0, LAND_RAMP, base);

        let relief = if land > 0.0 {
            let ridges = self.mountains.ridged(world_x, world_z) * self.mountains.amplitude();
            let hills = 0.5 * (self.hills.fbm(world_x, world_z) + 1.0) * self.hills.amplitude();
            let carve = self.valleys.ridged(world_x, world_z).powi(VALLEY_POWER) * self.valleys.amplitude();
            land * (self.latitude_factor(world_z) * (ridges + hills) - carve)
        } else {
            0.0
        };

        let detail = self.detail.fbm(world_x, world_z) * self.detail.amplitude();
        let e = base + relief + detail;
        if e.is_finite() {
            e.clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Elevation in meters, inside the published envelope.
    #[must_use]
    pub fn elevation(&self, world_x: f64, world_z: f64) -> f64 {
        apply_curve(&self.curve, self.normalized(world_x, world_z))
    }
}

/// Maps normalized elevation to meters and clamps to
/// [`MIN_ELEVATION`]..=[`MAX_ELEVATION`].
#[must_use]
pub fn apply_curve(curve: &TerrainCurve, e: f64) -> f64 {
    let e = e.clamp(-1.0, 1.0);
    let meters = if e < 0.0 {
        let shelf = 1.0 + e;
        -curve.ocean_depth * (1.0 - shelf * shelf)
    } else {
        curve.peak_height * e.powf(curve.land_exponent)
    };
    clamp_elevation(meters)
}

/// Clamps to the envelope; non-finite values become 0.
#[inline]
#[must_use]
pub fn clamp_elevation(meters: f64) -> f64 {
    if meters.is_finite() {
        meters.clamp(MIN_ELEVATION, MAX_ELEVATION)
    } else {
        0.0
    }
}

/// Hermite step between `edge0` and `edge1`.
#[inline]
fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Per-sample unit normals and slopes of a square grid.
///
/// Central differences in world units, one-sided on the border. The normal
/// is `normalize(-dh/dx, 1, -dh/dz)` and the slope `atan(|∇h|)`.
#[must_use]
pub fn surface(heights: &[f64], resolution: usize, spacing: f64) -> (Vec<[f32; 3]>, Vec<f32>) {
    let n = resolution * resolution;
    let mut normals = Vec::with_capacity(n);
    let mut slopes = Vec::with_capacity(n);
    if resolution < 2 || heights.len() != n || spacing <= 0.0 || !spacing.is_finite() {
        normals.resize(n, [0.0, 1.0, 0.0]);
        slopes.resize(n, 0.0);
        return (normals, slopes);
    }

    let at = |i: usize, j: usize| heights[j * resolution + i];
    let last = resolution - 1;

    for j in 0..resolution {
        for i in 0..resolution {
            let (il, ir) = (i.saturating_sub(1), (i + 1).min(last));
            let (jl, jr) = (j.saturating_sub(1), (j + 1).min(last));
            let dx = (at(ir, j) - at(il, j)) / ((ir - il) as f64 * spacing);
            let dz = (at(i, jr) - at(i, jl)) / ((jr - jl) as f64 * spacing);
            let (dx, dz) = if dx.is_finite() && dz.is_finite() {
                (dx, dz)
            } else {
                (0.0, 0.0)
            };

            let length = (dx * dx + 1.0 + dz * dz).sqrt();
            normals.push([(-dx / length) as f32, (1.0 / length) as f32, (-dz / length) as f32]);
            slopes.push(dx.hypot(dz).atan() as f32);
        }
    }

    (normals, slopes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_envelope_and_shape() {
        let curve = TerrainCurve::default();
        assert_eq!(apply_curve(&curve, 0.0), 0.0);
        assert_eq!(apply_curve(&curve, -1.0), -curve.ocean_depth);
        assert_eq!(apply_curve(&curve, 1.0), curve.peak_height);
        // Concave ocean: half depth in normalized space is well past half in meters
        assert!(apply_curve(&curve, -0.5) < -0.5 * curve.ocean_depth);
        // Flattened lowlands
        assert!(apply_curve(&curve, 0.1) < 0.1 * curve.peak_height);
        assert_eq!(clamp_elevation(f64::NAN), 0.0);
        assert_eq!(clamp_elevation(1e9), MAX_ELEVATION);
    }

    #[test]
    fn test_continental_factor() {
        let mut config = GeneratorConfig::default();
        config.landmasses = vec![Landmass {
            x: 0.0,
            z: 0.0,
            radius: 1000.0,
        }];
        let model = ElevationModel::new(WorldSeed::new(5), &config);
        assert!((model.continental_factor(0.0, 0.0) - 1.0).abs() < 1e-12);
        assert!(model.continental_factor(1000.0, 0.0).abs() < 1e-12);
        assert_eq!(model.continental_factor(1e7, 0.0), -1.0);

        config.landmasses.clear();
        let flat = ElevationModel::new(WorldSeed::new(5), &config);
        assert_eq!(flat.continental_factor(123.0, 456.0), 0.0);
    }

    #[test]
    fn test_poles_damp_relief() {
        let config = GeneratorConfig::default();
        let model = ElevationModel::new(WorldSeed::new(5), &config);
        let pole_z = (90.0 - config.latitude.origin_degrees) * config.latitude.meters_per_degree;
        assert!(model.latitude_factor(pole_z) < model.latitude_factor(0.0));
    }

    #[test]
    fn test_surface_of_plane() {
        // h = 0.5 x: constant gradient along X
        let res = 4;
        let spacing = 2.0;
        let heights: Vec<f64> = (0..res * res)
            .map(|k| 0.5 * (k % res) as f64 * spacing)
            .collect();
        let (normals, slopes) = surface(&heights, res, spacing);

        for (normal, slope) in normals.iter().zip(&slopes) {
            let len = normal.iter().map(|c| c * c).sum::<f32>().sqrt();
            assert!((len - 1.0).abs() < 1e-5);
            assert!((f64::from(*slope) - 0.5f64.atan()).abs() < 1e-6);
            assert!(normal[0] < 0.0);
            assert!(normal[2].abs() < 1e-7);
        }
    }
}
