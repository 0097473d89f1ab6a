//! # Biome Classification
//!
//! Determines the surface type of each sample from its water kind,
//! elevation, slope and climate.
//!
//! Rules are evaluated in a fixed order:
//! 1. Water kinds (ocean, lake, river), then beach
//! 2. Cold and high ground: snow, mountain, tundra
//! 3. Slope override: very steep ground is bare rock regardless of climate
//! 4. Open land by precipitation and temperature
//!
//! A smoothing pass then removes single-sample noise without ever touching
//! water.

use crate::climate::ClimateSample;
use crate::config::BiomeConfig;
use crate::water::WaterKind;

/// Biome types, stored per sample as the material ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Biome {
    /// Open ocean
    Ocean = 0,
    /// Enclosed still water
    Lake = 1,
    /// Flowing water
    River = 2,
    /// Sand at the waterline
    Beach = 3,
    /// Permanent snow and ice
    Snow = 4,
    /// Cold, treeless ground
    Tundra = 5,
    /// Bare rock at altitude or on steep slopes
    Mountain = 6,
    /// Arid sand and scrub
    Desert = 7,
    /// Warm, dry grassland with scattered trees
    Savanna = 8,
    /// Temperate grassland
    Grassland = 9,
    /// Temperate forest
    Forest = 10,
    /// Cold coniferous forest
    Taiga = 11,
    /// Warm, very wet forest
    Rainforest = 12,
    /// Marsh and swamp
    Wetland = 13,
}

impl Biome {
    /// Every biome, in ID order.
    pub const ALL: [Self; 14] = [
        Self::Ocean,
        Self::Lake,
        Self::River,
        Self::Beach,
        Self::Snow,
        Self::Tundra,
        Self::Mountain,
        Self::Desert,
        Self::Savanna,
        Self::Grassland,
        Self::Forest,
        Self::Taiga,
        Self::Rainforest,
        Self::Wetland,
    ];

    /// Material ID of this biome.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Converts from a material ID.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ocean),
            1 => Some(Self::Lake),
            2 => Some(Self::River),
            3 => Some(Self::Beach),
            4 => Some(Self::Snow),
            5 => Some(Self::Tundra),
            6 => Some(Self::Mountain),
            7 => Some(Self::Desert),
            8 => Some(Self::Savanna),
            9 => Some(Self::Grassland),
            10 => Some(Self::Forest),
            11 => Some(Self::Taiga),
            12 => Some(Self::Rainforest),
            13 => Some(Self::Wetland),
            _ => None,
        }
    }

    /// Returns whether this biome is open water.
    #[inline]
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, Self::Ocean | Self::Lake | Self::River)
    }

    /// The biome a water region of `kind` is painted with.
    #[must_use]
    pub const fn for_water(kind: WaterKind) -> Self {
        match kind {
            WaterKind::Ocean => Self::Ocean,
            WaterKind::Lake => Self::Lake,
            WaterKind::River => Self::River,
            WaterKind::Beach => Self::Beach,
        }
    }

    /// Whether smoothing may turn `self` into `other` on a plain majority.
    ///
    /// The relation is symmetric; water biomes are compatible with nothing.
    #[must_use]
    pub const fn blends_with(self, other: Self) -> bool {
        use Biome::{
            Beach, Desert, Forest, Grassland, Mountain, Rainforest, Savanna, Snow, Taiga, Tundra,
            Wetland,
        };
        matches!(
            (self, other),
            (Grassland, Forest | Savanna | Wetland | Beach)
                | (Forest, Grassland | Taiga | Rainforest | Wetland)
                | (Savanna, Grassland | Desert)
                | (Desert, Savanna | Beach)
                | (Taiga, Forest | Tundra)
                | (Tundra, Taiga | Snow | Mountain)
                | (Snow, Tundra | Mountain)
                | (Mountain, Snow | Tundra)
                | (Rainforest, Forest)
                | (Wetland, Grassland | Forest)
                | (Beach, Grassland | Desert)
        )
    }
}

/// Everything the rule table looks at for one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    /// Elevation in meters.
    pub elevation: f64,
    /// Slope in radians.
    pub slope: f64,
    /// Water region kind, if the sample is covered by water.
    pub water: Option<WaterKind>,
    /// Whether the sample carries a synthesized beach profile.
    pub beach: bool,
    /// Local climate.
    pub climate: ClimateSample,
}

/// Ordered threshold rules plus the smoothing pass.
#[derive(Clone, Copy, Debug)]
pub struct BiomeRules {
    config: BiomeConfig,
}

impl BiomeRules {
    /// Cardinal neighbor weight in the smoothing vote.
    const CARDINAL_WEIGHT: u32 = 2;
    /// Diagonal neighbor weight in the smoothing vote.
    const DIAGONAL_WEIGHT: u32 = 1;
    /// Lowland ceiling for wetlands (meters).
    const WETLAND_MAX_ELEVATION: f64 = 60.0;

    /// Creates the rule set.
    #[must_use]
    pub const fn new(config: BiomeConfig) -> Self {
        Self { config }
    }

    /// Classifies one sample.
    #[must_use]
    pub fn classify(&self, sample: &SurfaceSample) -> Biome {
        let c = &self.config;

        if let Some(kind) = sample.water {
            return Biome::for_water(kind);
        }
        if sample.beach {
            return Biome::Beach;
        }

        let t = sample.climate.temperature;
        let p = sample.climate.precipitation;

        if t <= c.snow_temperature {
            return Biome::Snow;
        }
        if sample.slope > c.steep_slope {
            return Biome::Mountain;
        }
        if sample.elevation > c.mountain_elevation && sample.slope >= c.plateau_slope {
            return Biome::Mountain;
        }
        if t <= c.tundra_temperature {
            return Biome::Tundra;
        }

        if sample.climate.humidity > c.wetland_humidity
            && sample.elevation < Self::WETLAND_MAX_ELEVATION
            && sample.slope < c.plateau_slope
        {
            return Biome::Wetland;
        }

        if p < c.desert_precipitation {
            return if t > 5.0 { Biome::Desert } else { Biome::Tundra };
        }
        if p < c.grassland_precipitation {
            return if t > 20.0 { Biome::Savanna } else { Biome::Grassland };
        }
        if p < c.forest_precipitation {
            return Biome::Grassland;
        }
        if p >= c.rainforest_precipitation && t > 20.0 {
            return Biome::Rainforest;
        }
        if t < 4.0 {
            Biome::Taiga
        } else {
            Biome::Forest
        }
    }

    /// Runs the configured number of smoothing passes over a
    /// `resolution × resolution` grid.
    ///
    /// Each pass reads the previous pass's grid. A cell flips to the
    /// best-voted neighbor biome when the vote reaches the majority and the
    /// two biomes blend, or when the vote is overwhelming. Water cells never
    /// flip and no cell flips into water.
    ///
    /// Returns the number of flips.
    pub fn smooth(&self, materials: &mut [Biome], resolution: usize) -> usize {
        if resolution < 3 || materials.len() != resolution * resolution {
            return 0;
        }

        let mut flips = 0;
        let mut previous = materials.to_vec();

        for _ in 0..self.config.smoothing_passes {
            let mut changed = 0;
            for j in 0..resolution {
                for i in 0..resolution {
                    let index = j * resolution + i;
                    let current = previous[index];
                    if current.is_water() {
                        continue;
                    }
                    if let Some(next) = self.vote(&previous, resolution, i, j, current) {
                        materials[index] = next;
                        changed += 1;
                    }
                }
            }
            flips += changed;
            if changed == 0 {
                break;
            }
            previous.copy_from_slice(materials);
        }

        flips
    }

    /// Tallies the weighted neighborhood of `(i, j)` and returns the biome
    /// to flip to, if any.
    fn vote(
        &self,
        grid: &[Biome],
        resolution: usize,
        i: usize,
        j: usize,
        current: Biome,
    ) -> Option<Biome> {
        let mut tally = [0u32; Biome::ALL.len()];

        for dj in -1i64..=1 {
            for di in -1i64..=1 {
                if di == 0 && dj == 0 {
                    continue;
                }
                let ni = i as i64 + di;
                let nj = j as i64 + dj;
                if ni < 0 || nj < 0 || ni >= resolution as i64 || nj >= resolution as i64 {
                    continue;
                }
                let weight = if di == 0 || dj == 0 {
                    Self::CARDINAL_WEIGHT
                } else {
                    Self::DIAGONAL_WEIGHT
                };
                let neighbor = grid[nj as usize * resolution + ni as usize];
                tally[neighbor.id() as usize] += weight;
            }
        }

        // Highest vote wins; ties go to the lower ID so the result is stable
        let (best_id, best_weight) = tally
            .iter()
            .enumerate()
            .filter(|&(id, _)| id != current.id() as usize)
            .fold((0usize, 0u32), |best, (id, &weight)| {
                if weight > best.1 {
                    (id, weight)
                } else {
                    best
                }
            });

        let candidate = Biome::from_u8(best_id as u8)?;
        if best_weight == 0 || candidate.is_water() {
            return None;
        }

        let c = &self.config;
        let flips = best_weight >= c.smoothing_overwhelming
            || (best_weight >= c.smoothing_majority && current.blends_with(candidate));
        flips.then_some(candidate)
    }
}
