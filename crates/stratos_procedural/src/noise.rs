//! # Seeded Gradient Noise
//!
//! Deterministic 2D simplex noise plus the two layer shapes the terrain
//! model is built from: fractal (FBM) sums and ridged sums.
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed`, every function here returns exactly the same
//! value on any platform. The permutation table is built once per noise
//! instance and never mutated, so a `SimplexNoise` can be shared across
//! worker threads behind an `Arc`.

use serde::{Deserialize, Serialize};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for a specific purpose.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0 ^ purpose.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        hash = hash.wrapping_mul(0x2545_F491_4F6C_DD1D);
        hash ^= hash >> 29;
        Self(hash)
    }

    /// Derives a per-tile seed, used for randomized per-tile passes (erosion).
    #[inline]
    #[must_use]
    pub const fn for_tile(self, tile_x: i32, tile_z: i32, level: u8) -> Self {
        let packed = ((tile_x as u32 as u64) << 32) | (tile_z as u32 as u64);
        self.derive(packed).derive(level as u64 + 0xE805)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(12345)
    }
}

/// Pre-computed permutation table, built once from the seed.
struct PermutationTable {
    /// 256 entries doubled to 512 so lookups never wrap.
    perm: [u8; 512],
}

impl PermutationTable {
    /// 2D gradient directions (12-gon).
    const GRADIENTS: [[f64; 2]; 12] = [
        [1.0, 0.0],
        [0.866, 0.5],
        [0.5, 0.866],
        [0.0, 1.0],
        [-0.5, 0.866],
        [-0.866, 0.5],
        [-1.0, 0.0],
        [-0.866, -0.5],
        [-0.5, -0.866],
        [0.0, -1.0],
        [0.5, -0.866],
        [0.866, -0.5],
    ];

    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates shuffle driven by xorshift64
        let mut rng_state = seed.value() | 1;
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;
            let j = (rng_state % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> usize {
        self.perm[index & 511] as usize
    }

    #[inline]
    fn gradient(hash: usize) -> [f64; 2] {
        Self::GRADIENTS[hash % 12]
    }
}

/// 2D simplex noise generator.
///
/// Produces smooth, continuous values in `[-1, 1]`.
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for the 2D simplex grid: (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_438_6;
    /// Unskewing factor: (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187_1;

    /// Creates a new simplex noise generator from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise. Returns a value in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if !x.is_finite() || !y.is_finite() {
            return 0.0;
        }

        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = i.wrapping_add(j) as f64 * Self::G2;
        let x0 = x - (i as f64 - unskew);
        let y0 = y - (j as f64 - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + Self::G2;
        let y1 = y0 - f64::from(j1) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let p = &self.perm_table;

        let gi0 = p.get(ii + p.get(jj));
        let gi1 = p.get(ii + i1 as usize + p.get(jj + j1 as usize));
        let gi2 = p.get(ii + 1 + p.get(jj + 1));

        let n = corner(x0, y0, gi0) + corner(x1, y1, gi1) + corner(x2, y2, gi2);

        // 70 normalizes the corner sum to roughly [-1, 1]
        (70.0 * n).clamp(-1.0, 1.0)
    }

    /// Fractal Brownian motion: `octaves` layers at growing frequency and
    /// shrinking amplitude, normalized back to `[-1, 1]`.
    #[must_use]
    pub fn fbm(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for octave in 0..octaves.max(1) {
            // Offset each octave so the origin is not a shared zero crossing
            let shift = f64::from(octave) * 17.31;
            total += self.sample(x * frequency + shift, y * frequency - shift) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }

    /// Ridged noise: each octave is shaped as `(1 - |n|)²`.
    ///
    /// Returns a value in `[0, 1]`; values near 1 trace sharp ridge lines.
    #[must_use]
    pub fn ridged(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for octave in 0..octaves.max(1) {
            let shift = f64::from(octave) * 23.17;
            let noise = self.sample(x * frequency - shift, y * frequency + shift);
            let ridge = 1.0 - noise.abs();
            total += ridge * ridge * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }
}

/// Contribution from one simplex corner.
#[inline]
fn corner(x: f64, y: f64, hash: usize) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        0.0
    } else {
        let grad = PermutationTable::gradient(hash);
        let t2 = t * t;
        t2 * t2 * (x * grad[0] + y * grad[1])
    }
}

#[inline]
fn fast_floor(x: f64) -> i64 {
    let xi = x as i64;
    if x < xi as f64 && xi > i64::MIN {
        xi - 1
    } else {
        xi
    }
}

/// One row of the noise octave table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseLayerConfig {
    /// Base frequency in cycles per meter.
    pub frequency: f64,
    /// Weight of this layer in the normalized elevation sum.
    pub amplitude: f64,
    /// Number of octaves.
    pub octaves: u32,
    /// Amplitude decay per octave.
    pub persistence: f64,
    /// Frequency growth per octave.
    pub lacunarity: f64,
}

impl Default for NoiseLayerConfig {
    fn default() -> Self {
        Self {
            frequency: 1.0 / 1000.0,
            amplitude: 0.1,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// A seeded noise source bound to one row of the octave table.
pub struct NoiseLayer {
    noise: SimplexNoise,
    config: NoiseLayerConfig,
}

impl NoiseLayer {
    /// Builds the layer's permutation table from `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed, config: NoiseLayerConfig) -> Self {
        Self {
            noise: SimplexNoise::new(seed),
            config,
        }
    }

    /// Layer weight.
    #[inline]
    #[must_use]
    pub fn amplitude(&self) -> f64 {
        self.config.amplitude
    }

    /// Unweighted FBM sample in `[-1, 1]`.
    #[must_use]
    pub fn fbm(&self, x: f64, z: f64) -> f64 {
        let c = &self.config;
        self.noise.fbm(
            x * c.frequency,
            z * c.frequency,
            c.octaves,
            c.persistence,
            c.lacunarity,
        )
    }

    /// Unweighted ridged sample in `[0, 1]`.
    #[must_use]
    pub fn ridged(&self, x: f64, z: f64) -> f64 {
        let c = &self.config;
        self.noise.ridged(
            x * c.frequency,
            z * c.frequency,
            c.octaves,
            c.persistence,
            c.lacunarity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let seed = WorldSeed::new(12345);
        let noise1 = SimplexNoise::new(seed);
        let noise2 = SimplexNoise::new(seed);

        for i in 0..100 {
            let x = f64::from(i) * 0.1;
            let y = f64::from(i) * 0.17;
            assert_eq!(noise1.sample(x, y), noise2.sample(x, y));
        }
    }

    #[test]
    fn test_different_seeds_different_results() {
        let noise1 = SimplexNoise::new(WorldSeed::new(1));
        let noise2 = SimplexNoise::new(WorldSeed::new(2));

        let differs = (0..64).any(|i| {
            let x = f64::from(i) * 0.37 + 0.11;
            (noise1.sample(x, x * 0.5) - noise2.sample(x, x * 0.5)).abs() > 1e-3
        });
        assert!(differs, "Different seeds should produce different noise");
    }

    #[test]
    fn test_range() {
        let noise = SimplexNoise::new(WorldSeed::new(42));

        for i in 0..10_000 {
            let x = f64::from(i) * 0.1 - 500.0;
            let y = f64::from(i) * 0.13 - 650.0;
            let value = noise.sample(x, y);
            assert!((-1.0..=1.0).contains(&value), "Value {value} out of range");
        }
    }

    #[test]
    fn test_continuity() {
        let noise = SimplexNoise::new(WorldSeed::new(42));
        let v1 = noise.sample(100.0, 100.0);
        let v2 = noise.sample(100.001, 100.0);
        assert!((v1 - v2).abs() < 0.01);
    }

    #[test]
    fn test_ridged_range() {
        let noise = SimplexNoise::new(WorldSeed::new(7));
        for i in 0..2_000 {
            let x = f64::from(i) * 0.731;
            let value = noise.ridged(x, -x * 0.3, 5, 0.5, 2.0);
            assert!((0.0..=1.0).contains(&value), "Ridged {value} out of range");
        }
    }

    #[test]
    fn test_non_finite_input_is_neutral() {
        let noise = SimplexNoise::new(WorldSeed::new(3));
        assert_eq!(noise.sample(f64::NAN, 1.0), 0.0);
        assert_eq!(noise.sample(1.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_huge_coordinates_stay_in_range() {
        let noise = SimplexNoise::new(WorldSeed::new(3));
        for (x, y) in [(1.0e30, 1.0e30), (-1.0e30, -1.0e30), (f64::MAX, f64::MIN)] {
            assert!((-1.0..=1.0).contains(&noise.sample(x, y)));
        }
    }

    #[test]
    fn test_seed_derivation() {
        let base = WorldSeed::new(42);
        assert_ne!(base.derive(1), base.derive(2));
        assert_eq!(base.derive(1), base.derive(1));
        assert_ne!(base.for_tile(0, 0, 0), base.for_tile(1, 0, 0));
        assert_ne!(base.for_tile(0, 0, 0), base.for_tile(0, 0, 1));
    }
}
