//! Benchmark for full tile generation.
//!
//! TARGET: a 65×65 tile well inside one frame's worth of worker time
//!
//! Run with: cargo bench --package stratos_procedural --bench tile_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stratos_procedural::{GeneratorConfig, TerrainGenerator, WorldSeed};

fn benchmark_tile_resolutions(c: &mut Criterion) {
    let generator = TerrainGenerator::new(WorldSeed::new(12345), GeneratorConfig::default());

    let mut group = c.benchmark_group("tile_generation");
    group.sample_size(20);

    for resolution in [33usize, 65, 129] {
        group.throughput(Throughput::Elements((resolution * resolution) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(resolution), &resolution, |b, &res| {
            let mut x = 0;
            b.iter(|| {
                x += 1;
                black_box(generator.generate(black_box(x), 0, 0, res, 1000.0))
            });
        });
    }

    group.finish();
}

fn benchmark_without_erosion(c: &mut Criterion) {
    let mut config = GeneratorConfig::default();
    config.erosion.iterations = 0;
    config.erosion.thermal_iterations = 0;
    let generator = TerrainGenerator::new(WorldSeed::new(12345), config);

    c.bench_function("tile_65_no_erosion", |b| {
        let mut x = 0;
        b.iter(|| {
            x += 1;
            black_box(generator.generate(black_box(x), 3, 0, 65, 1000.0))
        });
    });
}

criterion_group!(benches, benchmark_tile_resolutions, benchmark_without_erosion);
criterion_main!(benches);
