//! Benchmark for the orchestrator-side data structures.
//!
//! TARGET: queue and cache work stays far below the per-frame budget
//!
//! Run with: cargo bench --package stratos_streaming --bench pipeline_benchmark

use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stratos_procedural::{GeneratorConfig, TerrainGenerator, WorldSeed};
use stratos_streaming::{
    GridMeshBuilder, MeshBuilder, Predictor, RequestQueue, StreamingConfig, TileCache, TileId,
    TileRequest,
};

fn benchmark_queue(c: &mut Criterion) {
    c.bench_function("queue_push_pop_256", |b| {
        let now = Instant::now();
        b.iter(|| {
            let mut queue = RequestQueue::new(256);
            for i in 0..256u32 {
                let tile = TileId::new(3, (i % 16) as i32, (i / 16) as i32);
                queue.push(TileRequest::new(tile, (i * 7919) % 97, now, None, None));
            }
            while let Some(request) = queue.pop() {
                black_box(request.tile);
            }
        });
    });
}

fn benchmark_cache(c: &mut Criterion) {
    let generator = TerrainGenerator::new(WorldSeed::new(1), GeneratorConfig::default());
    let data = Arc::new(generator.generate(0, 0, 0, 17, 1000.0).unwrap());
    let now = Instant::now();

    let mut cache = TileCache::new(128, Duration::from_secs(300));
    for i in 0..256 {
        cache.insert(TileId::new(4, i, 0), Arc::clone(&data), now);
    }

    c.bench_function("cache_get_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % 256;
            black_box(cache.get(TileId::new(4, i, 0), now))
        });
    });
}

fn benchmark_prediction(c: &mut Criterion) {
    let predictor = Predictor::new(&StreamingConfig::default());
    c.bench_function("prefetch_plan", |b| {
        b.iter(|| {
            black_box(predictor.plan(
                black_box([1200.0, 900.0, -400.0]),
                [250.0, 0.0, 120.0],
                12_000.0,
            ))
        });
    });
}

fn benchmark_mesh(c: &mut Criterion) {
    let generator = TerrainGenerator::new(WorldSeed::new(1), GeneratorConfig::default());
    let data = generator.generate(0, 0, 0, 65, 1000.0).unwrap();
    let mut builder = GridMeshBuilder::with_skirts(20.0);

    c.bench_function("grid_mesh_65", |b| {
        b.iter(|| black_box(builder.build(TileId::new(0, 0, 0), &data)));
    });
}

criterion_group!(
    benches,
    benchmark_queue,
    benchmark_cache,
    benchmark_prediction,
    benchmark_mesh
);
criterion_main!(benches);
