//! # Terrain World Tests
//!
//! The full frame loop against real worker threads.

use std::time::{Duration, Instant};

use stratos::stratos_streaming::{StreamingConfig, TileId, TileState};
use stratos::{TerrainWorld, TerrainWorldConfig, WorldError};

fn small_world() -> TerrainWorld {
    let config = TerrainWorldConfig {
        seed: 12345,
        streaming: StreamingConfig {
            base_tile_size: 2000.0,
            resolution: 17,
            max_lod_level: 3,
            root_window: 1,
            prediction_levels: 1,
            prediction_max_radius: 1,
            worker_count: 2,
            ..StreamingConfig::default()
        },
        ..TerrainWorldConfig::default()
    };
    TerrainWorld::new(config).expect("world starts")
}

/// Runs frames until `done` holds or the deadline passes.
fn run_until(world: &mut TerrainWorld, camera: [f64; 3], done: impl Fn(&TerrainWorld) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(60);
    while Instant::now() < deadline {
        world.update(camera, [0.0; 3], 2000.0);
        if done(world) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn test_spawn_tile_streams_in() {
    let mut world = small_world();
    let camera = [1000.0, 800.0, 1000.0];
    let spawn = TileId::new(0, 0, 0);

    assert_eq!(world.height_at(1000.0, 1000.0), 0.0);
    assert!(run_until(&mut world, camera, |w| {
        w.streamer().tile_state(spawn) == TileState::Ready
    }));

    let data = world.streamer().tile(spawn).unwrap().data().unwrap().clone();
    let expected = world
        .generator()
        .generate(0, 0, 0, 17, 2000.0)
        .unwrap();
    assert_eq!(data.heightmap, expected.heightmap);
    // A finer tile may already cover the corner; either way it is real terrain
    let ground = world.height_at(0.0, 0.0);
    assert!(ground.is_finite() && (-500.0..=8000.0).contains(&ground));
    assert!(world.quadtree().node(spawn).unwrap().data().is_some());
    assert!(!world.renderable_tiles().is_empty());
    assert_eq!(world.stats().total_failed, 0);
}

#[test]
fn test_refines_near_camera() {
    let mut world = small_world();
    // Over the spawn island's eastern slope
    let camera = [1500.0, 300.0, 500.0];

    let refined = run_until(&mut world, camera, |w| {
        w.quadtree().leaves().iter().any(|leaf| leaf.level > 0)
    });
    assert!(refined, "Quadtree never refined near the camera");

    // Every leaf lies in the root window
    for leaf in world.quadtree().leaves() {
        let root_x = leaf.x >> leaf.level;
        let root_z = leaf.z >> leaf.level;
        assert!((-1..=1).contains(&root_x) && (-1..=1).contains(&root_z));
    }
}

#[test]
fn test_non_finite_camera_is_noop() {
    let mut world = small_world();
    let report = world.update([f64::NAN, 0.0, 0.0], [0.0; 3], 1000.0);
    assert_eq!(report.frame, 1);
    assert_eq!(report.leaves, 0);
    assert_eq!(report.requested, 0);
    assert!(world.quadtree().leaves().is_empty());
}

#[test]
fn test_far_camera_keeps_running() {
    let mut world = small_world();
    for camera in [[1.0e14, 1500.0, 0.0], [-1.0e14, 1500.0, -1.0e14], [0.0, 1500.0, 1.0e14]] {
        for _ in 0..3 {
            let report = world.update(camera, [300.0, 0.0, 0.0], 2000.0);
            assert_eq!(report.leaves, 9);
        }
        assert!(world.height_at(camera[0], camera[2]).is_finite());
    }
}

#[test]
fn test_reload_generator() {
    let mut world = small_world();
    let camera = [1000.0, 800.0, 1000.0];
    assert!(run_until(&mut world, camera, |w| w.stats().tiles_ready > 0));
    let before = world.generator().sample_elevation(1000.0, 1000.0);

    let mut generator = world.config().generator.clone();
    generator.curve.peak_height *= 0.5;
    generator.curve.ocean_depth *= 0.5;
    world.reload_generator(generator).unwrap();

    assert_eq!(world.streamer().ready_tiles().count(), 0);
    assert!(world.quadtree().leaves().is_empty());
    assert_ne!(world.generator().sample_elevation(1000.0, 1000.0), before);

    let mut broken = world.config().generator.clone();
    broken.erosion.inertia = 2.0;
    assert!(matches!(world.reload_generator(broken), Err(WorldError::Config(_))));
    assert!(run_until(&mut world, camera, |w| w.stats().tiles_ready > 0));
}

#[test]
fn test_invalid_config_rejected() {
    let config = TerrainWorldConfig {
        streaming: StreamingConfig {
            worker_count: 0,
            ..StreamingConfig::default()
        },
        ..TerrainWorldConfig::default()
    };
    assert!(matches!(TerrainWorld::new(config), Err(WorldError::Config(_))));
}
