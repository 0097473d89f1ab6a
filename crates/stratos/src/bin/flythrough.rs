//! # STRATOS Fly-Through
//!
//! Headless driver for the terrain core. Flies a camera across the world at
//! a fixed frame rate and prints streaming statistics.
//!
//! ```bash
//! # Default world
//! ./flythrough
//!
//! # Custom config, 1200 frames
//! ./flythrough stratos.toml 1200
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use stratos::{TerrainWorld, TerrainWorldConfig};

/// Frame rate the loop paces itself to.
const FRAME_RATE: u32 = 60;

/// Frames flown when no count is given.
const DEFAULT_FRAMES: u64 = 600;

/// Cruise altitude (meters).
const ALTITUDE: f64 = 1500.0;

/// Ground speed (meters per second).
const SPEED: f64 = 250.0;

/// Visibility used for prefetching (meters).
const VIEW_DISTANCE: f64 = 12_000.0;

fn main() {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    STRATOS FLY-THROUGH v0.1.0");
    println!("                         HEADLESS MODE");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match TerrainWorldConfig::load(Path::new(&path)) {
            Ok(config) => {
                println!("   ✓ Config loaded from {path}");
                config
            }
            Err(e) => {
                eprintln!("   ✗ FATAL: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("   ✓ Default config");
            TerrainWorldConfig::default()
        }
    };
    let frames = args
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(DEFAULT_FRAMES);

    let mut world = match TerrainWorld::new(config) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("   ✗ FATAL: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "   ✓ Seed {}, {} workers, {} m root tiles",
        world.config().seed,
        world.streamer().worker_count(),
        world.config().streaming.base_tile_size
    );
    println!();

    let frame_time = Duration::from_secs(1) / FRAME_RATE;
    let dt = 1.0 / f64::from(FRAME_RATE);
    // Heading north-east across the spawn island
    let velocity = [SPEED * 0.8, 0.0, SPEED * 0.6];
    let mut camera = [0.0, ALTITUDE, 0.0];
    let mut worst_frame = Duration::ZERO;
    let started = Instant::now();

    for _ in 0..frames {
        let frame_start = Instant::now();
        let report = world.update(camera, velocity, VIEW_DISTANCE);
        let elapsed = frame_start.elapsed();
        worst_frame = worst_frame.max(elapsed);

        if report.frame % u64::from(FRAME_RATE) == 0 {
            let stats = world.stats();
            println!(
                "   [{:>5}] pos ({:>8.0}, {:>8.0})  ground {:>7.1} m  {:?}  ready {:>3}  loading {:>3}  cache {:>3} ({:.0}% hit)  avg load {:.1} ms  {:.1} MB",
                report.frame,
                camera[0],
                camera[2],
                world.height_at(camera[0], camera[2]),
                world.biome_at(camera[0], camera[2]),
                stats.tiles_ready,
                stats.tiles_loading,
                stats.cache_entries,
                stats.cache_hit_rate * 100.0,
                stats.average_load_ms,
                stats.memory_bytes as f64 / (1024.0 * 1024.0)
            );
        }

        for (axis, v) in camera.iter_mut().zip(velocity) {
            *axis += v * dt;
        }
        std::thread::sleep(frame_time.saturating_sub(elapsed));
    }

    let stats = world.stats();
    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Frames:        {frames} in {:.1?}", started.elapsed());
    println!("  Worst frame:   {worst_frame:.2?}");
    println!("  Tiles loaded:  {}", stats.total_loaded);
    println!("  Failures:      {} ({} timeouts)", stats.total_failed, stats.total_timeouts);
    println!("  Dropped:       {}", stats.total_dropped);
    println!("  Renderable:    {}", world.renderable_tiles().len());
    println!("═══════════════════════════════════════════════════════════════════");
}
