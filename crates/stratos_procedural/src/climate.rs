//! # Climate Model
//!
//! Temperature falls off from the equator toward the poles and with
//! altitude; precipitation follows large-scale noise, is lifted on windward
//! slopes and damped by cold. Humidity blends its own noise channel with
//! the precipitation it produces.

use crate::config::{ClimateConfig, GeneratorConfig, LatitudeConfig};
use crate::noise::{NoiseLayer, WorldSeed};

/// Seed purposes for the climate noise channels.
const TEMPERATURE_PURPOSE: u64 = 0x7E;
const PRECIPITATION_PURPOSE: u64 = 0x9A;
const HUMIDITY_PURPOSE: u64 = 0x4D;

/// Climate at one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClimateSample {
    /// Mean annual temperature (°C).
    pub temperature: f64,
    /// Mean annual precipitation (mm).
    pub precipitation: f64,
    /// Relative humidity, `[0, 1]`.
    pub humidity: f64,
}

/// Latitude in degrees for world Z, clamped to `[-90, 90]`.
#[must_use]
pub fn latitude_degrees(latitude: &LatitudeConfig, world_z: f64) -> f64 {
    let degrees = latitude.origin_degrees + world_z / latitude.meters_per_degree.max(1.0);
    if degrees.is_finite() {
        degrees.clamp(-90.0, 90.0)
    } else {
        latitude.origin_degrees.clamp(-90.0, 90.0)
    }
}

/// Seeded climate sampler.
pub struct ClimateModel {
    temperature: NoiseLayer,
    precipitation: NoiseLayer,
    humidity: NoiseLayer,
    latitude: LatitudeConfig,
    config: ClimateConfig,
}

impl ClimateModel {
    /// Builds the three noise channels from `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed, config: &GeneratorConfig) -> Self {
        Self {
            temperature: NoiseLayer::new(seed.derive(TEMPERATURE_PURPOSE), config.layers.temperature),
            precipitation: NoiseLayer::new(
                seed.derive(PRECIPITATION_PURPOSE),
                config.layers.precipitation,
            ),
            humidity: NoiseLayer::new(seed.derive(HUMIDITY_PURPOSE), config.layers.humidity),
            latitude: config.latitude,
            config: config.climate,
        }
    }

    /// Sea-level temperature from latitude alone (°C).
    #[must_use]
    pub fn baseline_temperature(&self, world_z: f64) -> f64 {
        let polar = (latitude_degrees(&self.latitude, world_z).abs() / 90.0).powf(1.2);
        let c = &self.config;
        c.equator_temperature - (c.equator_temperature - c.pole_temperature) * polar
    }

    /// Samples the climate at a world position and elevation.
    #[must_use]
    pub fn sample(&self, world_x: f64, world_z: f64, elevation: f64) -> ClimateSample {
        let c = &self.config;
        let elevation = if elevation.is_finite() { elevation } else { 0.0 };

        let temperature = self.baseline_temperature(world_z)
            - c.lapse_rate_per_km * elevation.max(0.0) / 1000.0
            + self.temperature.fbm(world_x, world_z) * self.temperature.amplitude();

        let wetness = (0.5 + 0.5 * self.precipitation.fbm(world_x, world_z) * self.precipitation.amplitude())
            .clamp(0.0, 1.0);
        let precipitation = (wetness
            * c.max_precipitation
            * self.orographic_factor(elevation)
            * Self::cold_factor(temperature))
        .max(0.0);

        let blend = self.humidity.amplitude().clamp(0.0, 1.0);
        let noise_humidity = 0.5 + 0.5 * self.humidity.fbm(world_x, world_z);
        let rain_humidity = (precipitation / c.max_precipitation.max(1.0)).min(1.0);
        let humidity = ((1.0 - blend) * rain_humidity + blend * noise_humidity).clamp(0.0, 1.0);

        ClimateSample {
            temperature,
            precipitation,
            humidity,
        }
    }

    /// Orographic lift: strongest at the configured peak elevation, fading
    /// to nothing at sea level and twice the peak.
    fn orographic_factor(&self, elevation: f64) -> f64 {
        let peak = self.config.orographic_peak.max(1.0);
        if elevation <= 0.0 {
            return 1.0;
        }
        1.0 + 0.5 * (1.0 - ((elevation - peak) / peak).abs()).max(0.0)
    }

    /// Cold air holds less water.
    fn cold_factor(temperature: f64) -> f64 {
        if temperature >= 0.0 {
            1.0
        } else {
            (1.0 + temperature / 30.0).max(0.3)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poles_colder_than_equator() {
        let config = GeneratorConfig::default();
        let model = ClimateModel::new(WorldSeed::new(1), &config);

        // Z that maps to the equator for the default origin latitude
        let equator_z = -config.latitude.origin_degrees * config.latitude.meters_per_degree;
        let pole_z = (90.0 - config.latitude.origin_degrees) * config.latitude.meters_per_degree;

        assert!((model.baseline_temperature(equator_z) - config.climate.equator_temperature).abs() < 1e-6);
        assert!((model.baseline_temperature(pole_z) - config.climate.pole_temperature).abs() < 1e-6);
    }

    #[test]
    fn test_lapse_rate() {
        let mut config = GeneratorConfig::default();
        config.layers.temperature.amplitude = 0.0;
        let model = ClimateModel::new(WorldSeed::new(1), &config);

        let low = model.sample(0.0, 0.0, 0.0);
        let high = model.sample(0.0, 0.0, 2000.0);
        let expected = config.climate.lapse_rate_per_km * 2.0;
        assert!((low.temperature - high.temperature - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sample_ranges() {
        let model = ClimateModel::new(WorldSeed::new(9), &GeneratorConfig::default());
        for i in 0..500 {
            let x = f64::from(i) * 731.0 - 150_000.0;
            let z = f64::from(i) * -517.0 + 90_000.0;
            let s = model.sample(x, z, f64::from(i % 40) * 100.0 - 200.0);
            assert!(s.temperature.is_finite());
            assert!(s.precipitation >= 0.0);
            assert!((0.0..=1.0).contains(&s.humidity));
        }
        let s = model.sample(0.0, 0.0, f64::NAN);
        assert!(s.temperature.is_finite());
    }
}
