//! # Terrain Quality Tests
//!
//! Determinism, envelope, biome and water invariants of generated tiles.

use std::f32::consts::FRAC_PI_2;

use stratos_procedural::{
    Biome, GeneratorConfig, TerrainData, TerrainGenerator, WorldSeed, MAX_ELEVATION, MIN_ELEVATION,
};

fn generate(seed: u64, x: i32, z: i32, level: u8, resolution: usize, size: f64) -> TerrainData {
    TerrainGenerator::new(WorldSeed::new(seed), GeneratorConfig::default())
        .generate(x, z, level, resolution, size)
        .expect("valid request")
}

/// Tiles sampled around the spawn island, open ocean and a continent.
const SAMPLE_TILES: [(i32, i32, u8, f64); 5] = [
    (0, 0, 0, 1000.0),
    (1, 0, 0, 1000.0),
    (-3, 2, 0, 1000.0),
    (12, 2, 1, 2500.0),
    (30, 5, 0, 2000.0),
];

#[test]
fn test_determinism() {
    for (x, z, level, size) in SAMPLE_TILES {
        let a = generate(12345, x, z, level, 33, size);
        let b = generate(12345, x, z, level, 33, size);

        for (ha, hb) in a.heightmap.iter().zip(&b.heightmap) {
            assert!((ha - hb).abs() <= 1e-6, "Tile ({x}, {z}) not deterministic");
        }
        assert_eq!(a.materials, b.materials);
        assert_eq!(a.water_mask, b.water_mask);
    }
}

#[test]
fn test_seed_sensitivity() {
    let a = generate(1, 0, 0, 0, 32, 1000.0);
    let b = generate(2, 0, 0, 0, 32, 1000.0);

    let max_diff = a
        .heightmap
        .iter()
        .zip(&b.heightmap)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0f32, f32::max);
    println!("Max elevation difference between seeds: {max_diff:.3} m");
    assert!(max_diff > 0.1);
}

#[test]
fn test_bounds_invariants() {
    for (x, z, level, size) in SAMPLE_TILES {
        let data = generate(777, x, z, level, 33, size);
        assert!(data.is_consistent());

        for &h in &data.heightmap {
            assert!(h.is_finite());
            assert!(
                (MIN_ELEVATION as f32..=MAX_ELEVATION as f32).contains(&h),
                "Elevation {h} out of range"
            );
        }
        for &s in &data.slopes {
            assert!((0.0..=FRAC_PI_2).contains(&s), "Slope {s} out of range");
        }
        for n in &data.normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5, "Normal length {len}");
            assert!(n[1] > 0.0);
        }
        for uv in &data.uvs {
            assert!((0.0..=1.0).contains(&uv[0]) && (0.0..=1.0).contains(&uv[1]));
        }
    }
}

#[test]
fn test_biome_validity() {
    for (x, z, level, size) in SAMPLE_TILES {
        let data = generate(4242, x, z, level, 33, size);
        for biome in &data.materials {
            assert_eq!(Biome::from_u8(biome.id()), Some(*biome));
        }
    }
}

#[test]
fn test_water_consistency() {
    let config = GeneratorConfig::default();
    for (x, z, level, size) in SAMPLE_TILES {
        let data = generate(12345, x, z, level, 33, size);

        for (k, &h) in data.heightmap.iter().enumerate() {
            if h <= config.sea_level as f32 {
                assert!(data.water_mask[k], "Sample {k} at {h} m is dry");
            }
            if h > config.high_land_threshold as f32 {
                assert!(!data.water_mask[k], "Sample {k} at {h} m is flooded");
            }
            // Water samples carry water biomes and the reverse
            assert_eq!(data.water_mask[k], data.materials[k].is_water());
        }
    }
}

#[test]
fn test_spawn_tile_scenario() {
    let data = generate(12345, 0, 0, 0, 32, 1000.0);

    assert_eq!(data.heightmap.len(), 1024);
    assert!(data
        .heightmap
        .iter()
        .all(|h| h.is_finite() && (-500.0..=8000.0).contains(h)));

    let water = data.water_mask.iter().filter(|&&w| w).count();
    let land = data.water_mask.len() - water;
    let stats = data.stats();
    println!(
        "Spawn tile: {water} water / {land} land, elevation {:.1}..{:.1} m, {} bodies",
        stats.min_elevation,
        stats.max_elevation,
        data.water_bodies.len()
    );
    assert!(water >= 1);
    assert!(land >= 1);
}

#[test]
fn test_erosion_toggle_changes_terrain() {
    let seed = WorldSeed::new(12345);
    let eroded = TerrainGenerator::new(seed, GeneratorConfig::default())
        .generate(1, 0, 0, 33, 1000.0)
        .unwrap();

    let mut config = GeneratorConfig::default();
    config.erosion.iterations = 0;
    config.erosion.thermal_iterations = 0;
    let raw = TerrainGenerator::new(seed, config)
        .generate(1, 0, 0, 33, 1000.0)
        .unwrap();

    assert_ne!(eroded.heightmap, raw.heightmap);
}

#[test]
fn test_adjacent_tiles_share_edges_without_erosion() {
    let mut config = GeneratorConfig::default();
    config.erosion.iterations = 0;
    config.erosion.thermal_iterations = 0;
    // Beach profiles depend on the tile's own neighborhood
    config.water.beach_search_radius = 0;
    config.water.puddle_max_cells = 0;
    let generator = TerrainGenerator::new(WorldSeed::new(9), config);

    let west = generator.generate(30, 5, 0, 17, 2000.0).unwrap();
    let east = generator.generate(31, 5, 0, 17, 2000.0).unwrap();

    for j in 0..17 {
        let a = west.height(16, j);
        let b = east.height(0, j);
        assert!((a - b).abs() < 1e-3, "Seam mismatch at row {j}: {a} vs {b}");
    }
}
