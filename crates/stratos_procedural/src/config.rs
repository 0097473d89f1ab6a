//! # Generator Configuration
//!
//! Every tunable of the terrain model lives here. All sections derive
//! `Deserialize` with `#[serde(default)]`, so a TOML file only needs to name
//! the values it overrides:
//!
//! ```toml
//! sea_level = 0.0
//!
//! [layers.mountains]
//! frequency = 0.00004
//! amplitude = 0.5
//!
//! [erosion]
//! iterations = 0   # disable hydraulic erosion
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::noise::NoiseLayerConfig;

/// Lowest elevation the generator ever publishes (meters).
pub const MIN_ELEVATION: f64 = -500.0;
/// Highest elevation the generator ever publishes (meters).
pub const MAX_ELEVATION: f64 = 8000.0;

/// Complete generator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Water surface elevation in meters.
    pub sea_level: f64,
    /// Land above this elevation is "high land" (beach profiles, water checks).
    pub high_land_threshold: f64,
    /// The noise octave table.
    pub layers: LayerTable,
    /// Landmass centers feeding the continental factor.
    pub landmasses: Vec<Landmass>,
    /// Latitude model shared by the elevation and climate stages.
    pub latitude: LatitudeConfig,
    /// Non-linear elevation curve.
    pub curve: TerrainCurve,
    /// Hydraulic and thermal erosion.
    pub erosion: ErosionConfig,
    /// Water-body detection and beach synthesis.
    pub water: WaterConfig,
    /// Temperature / precipitation / humidity model.
    pub climate: ClimateConfig,
    /// Biome thresholds and smoothing.
    pub biomes: BiomeConfig,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sea_level: 0.0,
            high_land_threshold: 40.0,
            layers: LayerTable::default(),
            landmasses: default_landmasses(),
            latitude: LatitudeConfig::default(),
            curve: TerrainCurve::default(),
            erosion: ErosionConfig::default(),
            water: WaterConfig::default(),
            climate: ClimateConfig::default(),
            biomes: BiomeConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Parses a TOML document; missing keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` when a value fails [`Self::validate`].
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// I/O, parse and validation failures.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Rejects values the generator cannot work with.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending key.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.sea_level.is_finite() || !(MIN_ELEVATION..MAX_ELEVATION).contains(&self.sea_level) {
            return Err(ConfigError::Invalid(format!(
                "sea_level must lie in [{MIN_ELEVATION}, {MAX_ELEVATION}), got {}",
                self.sea_level
            )));
        }
        if !self.high_land_threshold.is_finite() || self.high_land_threshold <= self.sea_level {
            return Err(ConfigError::Invalid(
                "high_land_threshold must be above sea_level".into(),
            ));
        }
        for (name, layer) in self.layers.iter() {
            if !layer.frequency.is_finite() || layer.frequency <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "layers.{name}.frequency must be positive"
                )));
            }
            if !layer.amplitude.is_finite() || layer.amplitude < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "layers.{name}.amplitude must be non-negative"
                )));
            }
            if layer.octaves == 0 || layer.octaves > 16 {
                return Err(ConfigError::Invalid(format!(
                    "layers.{name}.octaves must be in 1..=16"
                )));
            }
        }
        for (index, landmass) in self.landmasses.iter().enumerate() {
            if !landmass.radius.is_finite() || landmass.radius <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "landmasses[{index}].radius must be positive"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.erosion.inertia) {
            return Err(ConfigError::Invalid("erosion.inertia must be in [0, 1]".into()));
        }
        if !(0.0..1.0).contains(&self.erosion.evaporation) {
            return Err(ConfigError::Invalid(
                "erosion.evaporation must be in [0, 1)".into(),
            ));
        }
        if self.water.enclosure_step == 0 {
            return Err(ConfigError::Invalid("water.enclosure_step must be >= 1".into()));
        }
        if self.curve.land_exponent <= 0.0 || self.curve.peak_height <= 0.0 {
            return Err(ConfigError::Invalid(
                "curve.land_exponent and curve.peak_height must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// The noise octave table: one row per elevation layer plus the climate
/// noise channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTable {
    /// Continental-scale undulation.
    pub continental: NoiseLayerConfig,
    /// Ridged mountain ranges.
    pub mountains: NoiseLayerConfig,
    /// Rolling hills.
    pub hills: NoiseLayerConfig,
    /// Valley carving (ridged, subtracted).
    pub valleys: NoiseLayerConfig,
    /// Fine surface detail.
    pub detail: NoiseLayerConfig,
    /// Temperature variation (amplitude in degrees Celsius).
    pub temperature: NoiseLayerConfig,
    /// Precipitation variation (amplitude is a 0..1 blend weight).
    pub precipitation: NoiseLayerConfig,
    /// Humidity variation (amplitude is a 0..1 blend weight).
    pub humidity: NoiseLayerConfig,
}

impl LayerTable {
    /// Iterates `(name, layer)` pairs, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &NoiseLayerConfig)> {
        [
            ("continental", &self.continental),
            ("mountains", &self.mountains),
            ("hills", &self.hills),
            ("valleys", &self.valleys),
            ("detail", &self.detail),
            ("temperature", &self.temperature),
            ("precipitation", &self.precipitation),
            ("humidity", &self.humidity),
        ]
        .into_iter()
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self {
            continental: NoiseLayerConfig {
                frequency: 1.0 / 60_000.0,
                amplitude: 0.15,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.1,
            },
            mountains: NoiseLayerConfig {
                frequency: 1.0 / 18_000.0,
                amplitude: 0.55,
                octaves: 5,
                persistence: 0.5,
                lacunarity: 2.2,
            },
            hills: NoiseLayerConfig {
                frequency: 1.0 / 3_500.0,
                amplitude: 0.08,
                octaves: 4,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            valleys: NoiseLayerConfig {
                frequency: 1.0 / 9_000.0,
                amplitude: 0.06,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            detail: NoiseLayerConfig {
                frequency: 1.0 / 400.0,
                amplitude: 0.015,
                octaves: 4,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            temperature: NoiseLayerConfig {
                frequency: 1.0 / 40_000.0,
                amplitude: 4.0,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            precipitation: NoiseLayerConfig {
                frequency: 1.0 / 30_000.0,
                amplitude: 1.0,
                octaves: 4,
                persistence: 0.5,
                lacunarity: 2.0,
            },
            humidity: NoiseLayerConfig {
                frequency: 1.0 / 12_000.0,
                amplitude: 0.35,
                octaves: 3,
                persistence: 0.5,
                lacunarity: 2.0,
            },
        }
    }
}

/// A landmass center for the continental factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmass {
    /// World X of the center (meters).
    pub x: f64,
    /// World Z of the center (meters).
    pub z: f64,
    /// Distance at which the continental factor reaches zero (meters).
    pub radius: f64,
}

/// The default world: a small spawn island whose coast crosses the origin
/// tile, plus three continents.
fn default_landmasses() -> Vec<Landmass> {
    vec![
        Landmass {
            x: 2_000.0,
            z: 500.0,
            radius: 1_500.0,
        },
        Landmass {
            x: 60_000.0,
            z: 10_000.0,
            radius: 45_000.0,
        },
        Landmass {
            x: -55_000.0,
            z: 70_000.0,
            radius: 50_000.0,
        },
        Landmass {
            x: 5_000.0,
            z: -90_000.0,
            radius: 40_000.0,
        },
    ]
}

/// Latitude model: world Z maps linearly to degrees of latitude.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatitudeConfig {
    /// Latitude at world Z = 0, in degrees.
    pub origin_degrees: f64,
    /// Meters of world Z per degree of latitude.
    pub meters_per_degree: f64,
    /// How much relief (mountains/hills) is damped at the poles, 0..1.
    pub polar_relief_damping: f64,
}

impl Default for LatitudeConfig {
    fn default() -> Self {
        Self {
            origin_degrees: 38.0,
            meters_per_degree: 111_320.0,
            polar_relief_damping: 0.35,
        }
    }
}

/// Non-linear curve from normalized elevation to meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainCurve {
    /// Depth reached at normalized elevation -1 (meters, positive).
    pub ocean_depth: f64,
    /// Height reached at normalized elevation 1 (meters).
    pub peak_height: f64,
    /// Exponent of the land curve; > 1 flattens lowlands and sharpens peaks.
    pub land_exponent: f64,
}

impl Default for TerrainCurve {
    fn default() -> Self {
        Self {
            ocean_depth: 500.0,
            peak_height: 8000.0,
            land_exponent: 1.6,
        }
    }
}

/// Hydraulic droplet and thermal erosion parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionConfig {
    /// Number of droplets per tile. Zero disables hydraulic erosion.
    pub iterations: u32,
    /// Maximum steps a droplet lives.
    pub max_lifetime: u32,
    /// How much a droplet keeps its previous direction, 0..1.
    pub inertia: f64,
    /// Sediment capacity multiplier.
    pub capacity_factor: f64,
    /// Floor on sediment capacity (meters).
    pub min_capacity: f64,
    /// Fraction of the capacity deficit picked up per step.
    pub erosion_rate: f64,
    /// Fraction of the capacity surplus dropped per step.
    pub deposition_rate: f64,
    /// Fraction of water lost per step.
    pub evaporation: f64,
    /// Acceleration along the slope.
    pub gravity: f64,
    /// Droplet speed cap.
    pub max_speed: f64,
    /// Thermal relaxation passes. Zero disables thermal erosion.
    pub thermal_iterations: u32,
    /// Maximum stable slope (rise over run) before material slides.
    pub talus_slope: f64,
    /// Fraction of the excess moved per thermal pass.
    pub thermal_rate: f64,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            iterations: 600,
            max_lifetime: 30,
            inertia: 0.05,
            capacity_factor: 4.0,
            min_capacity: 0.01,
            erosion_rate: 0.3,
            deposition_rate: 0.3,
            evaporation: 0.02,
            gravity: 4.0,
            max_speed: 8.0,
            thermal_iterations: 2,
            talus_slope: 1.2,
            thermal_rate: 0.25,
        }
    }
}

/// Water body detection and beach synthesis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Regions covering at least this fraction of the tile and touching its
    /// border are oceans.
    pub ocean_min_fraction: f64,
    /// Land fraction around a region above which it counts as enclosed.
    pub enclosed_land_fraction: f64,
    /// Radius (samples) of the coarse enclosure probe.
    pub enclosure_radius: usize,
    /// Step (samples) of the coarse enclosure probe grid.
    pub enclosure_step: usize,
    /// Mean bed gradient (rise over run) above which a region flows.
    pub river_gradient: f64,
    /// Minimum bounding-box aspect ratio for a river.
    pub river_elongation: f64,
    /// Regions with at most this many cells may be beach puddles.
    pub puddle_max_cells: usize,
    /// Maximum depth (meters) of a beach puddle.
    pub puddle_max_depth: f64,
    /// Land up to this height above sea level can take a beach profile.
    pub beach_max_height: f64,
    /// Lowest beach elevation above sea level (meters).
    pub beach_min_height: f64,
    /// Search radius (samples) for water and high land around a beach cell.
    pub beach_search_radius: usize,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            ocean_min_fraction: 0.08,
            enclosed_land_fraction: 0.5,
            enclosure_radius: 8,
            enclosure_step: 2,
            river_gradient: 0.02,
            river_elongation: 3.0,
            puddle_max_cells: 2,
            puddle_max_depth: 1.5,
            beach_max_height: 6.0,
            beach_min_height: 0.2,
            beach_search_radius: 6,
        }
    }
}

/// Temperature, precipitation and humidity model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateConfig {
    /// Sea-level temperature at the equator (°C).
    pub equator_temperature: f64,
    /// Sea-level temperature at the poles (°C).
    pub pole_temperature: f64,
    /// Cooling per 1000 m of elevation (°C).
    pub lapse_rate_per_km: f64,
    /// Mean annual precipitation at full noise (mm).
    pub max_precipitation: f64,
    /// Elevation of strongest orographic lift (meters).
    pub orographic_peak: f64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            equator_temperature: 28.0,
            pole_temperature: -25.0,
            lapse_rate_per_km: 6.5,
            max_precipitation: 2600.0,
            orographic_peak: 1800.0,
        }
    }
}

/// Biome thresholds and smoothing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeConfig {
    /// At or below this temperature (°C) land is snow.
    pub snow_temperature: f64,
    /// At or below this temperature (°C) land is tundra.
    pub tundra_temperature: f64,
    /// Above this elevation (meters) land is mountain.
    pub mountain_elevation: f64,
    /// Slopes above this (radians) are always mountain rock.
    pub steep_slope: f64,
    /// Mountain-elevation cells flatter than this (radians) get open biomes.
    pub plateau_slope: f64,
    /// Precipitation (mm) below which warm land is desert.
    pub desert_precipitation: f64,
    /// Precipitation (mm) below which land is savanna / grassland.
    pub grassland_precipitation: f64,
    /// Precipitation (mm) above which land is forest.
    pub forest_precipitation: f64,
    /// Precipitation (mm) above which warm land is rainforest.
    pub rainforest_precipitation: f64,
    /// Humidity above which flat lowland is wetland.
    pub wetland_humidity: f64,
    /// Neighborhood vote (out of 12) needed to flip to a compatible biome.
    pub smoothing_majority: u32,
    /// Vote (out of 12) that flips regardless of compatibility.
    pub smoothing_overwhelming: u32,
    /// Smoothing passes. Zero disables smoothing.
    pub smoothing_passes: u32,
}

impl Default for BiomeConfig {
    fn default() -> Self {
        Self {
            snow_temperature: -8.0,
            tundra_temperature: -2.0,
            mountain_elevation: 2200.0,
            steep_slope: 0.75,
            plateau_slope: 0.12,
            desert_precipitation: 250.0,
            grassland_precipitation: 550.0,
            forest_precipitation: 800.0,
            rainforest_precipitation: 2000.0,
            wetland_humidity: 0.8,
            smoothing_majority: 7,
            smoothing_overwhelming: 10,
            smoothing_passes: 1,
        }
    }
}
