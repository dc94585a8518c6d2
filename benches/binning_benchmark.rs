use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use l3_binner::algorithms::{fields_per_band, AlgorithmKind, BandDefinition};
use l3_binner::database::BinDatabase;
use l3_binner::grid::{EqualAreaGrid, GridLocator, LatLonGrid};
use l3_binner::models::GeoPosition;
use l3_binner::processors::clipping::Clipper;
use l3_binner::processors::{ResamplingMode, SpatialBinner};
use l3_binner::readers::{AffineGeoCoding, RasterScene};
use l3_binner::store::StorageLocation;
use std::sync::Arc;

// Square swath of 0.01° pixels over the North Atlantic
fn create_test_scene(size: usize) -> RasterScene {
    let values: Vec<f32> = (0..size * size).map(|i| (i % 97) as f32 * 0.1).collect();
    RasterScene::new("bench", size, size)
        .with_band("chl", values)
        .expect("scene band")
        .with_geo_coding(Box::new(AffineGeoCoding::new(45.0, -30.0, 0.01, 0.01)))
}

fn benchmark_locators(c: &mut Criterion) {
    let equal_area = EqualAreaGrid::new(9.28).expect("grid");
    let regular = LatLonGrid::global(12.0).expect("grid");
    let positions: Vec<GeoPosition> = (0..1000)
        .map(|i| GeoPosition::new(-89.0 + i as f64 * 0.178, -179.5 + i as f64 * 0.359))
        .collect();

    c.bench_function("equal_area_position_to_index", |b| {
        b.iter(|| {
            let mut sum = 0usize;
            for &pos in &positions {
                sum += equal_area.position_to_index(pos).unwrap_or(0);
            }
            black_box(sum)
        })
    });

    c.bench_function("equal_area_index_to_cell", |b| {
        let step = equal_area.num_cells() / 1000;
        b.iter(|| {
            let mut rows = 0i64;
            for i in 0..1000 {
                if let Some(cell) = equal_area.index_to_cell(i * step) {
                    rows += cell.row as i64;
                }
            }
            black_box(rows)
        })
    });

    c.bench_function("regular_position_to_index", |b| {
        b.iter(|| {
            let mut sum = 0usize;
            for &pos in &positions {
                sum += regular.position_to_index(pos).unwrap_or(0);
            }
            black_box(sum)
        })
    });
}

fn benchmark_clipping(c: &mut Criterion) {
    let pixel = [(0.3, 0.2), (1.4, 0.35), (1.25, 1.5), (0.1, 1.3)];
    c.bench_function("clip_pixel_to_cells", |b| {
        let mut clipper = Clipper::new();
        b.iter(|| {
            let mut area = 0.0;
            for x in 0..2 {
                for y in 0..2 {
                    area += clipper.clipped_area(black_box(&pixel), x as f64, y as f64);
                }
            }
            black_box(area)
        })
    });
}

fn benchmark_spatial_binning(c: &mut Criterion) {
    let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::ArithmeticMean)];
    let locator: Arc<dyn GridLocator> = Arc::new(LatLonGrid::global(12.0).expect("grid"));
    let mut group = c.benchmark_group("spatial_binning_by_size");
    group.sample_size(10);

    for &size in &[64, 128, 256] {
        let scene = create_test_scene(size);
        for mode in [ResamplingMode::Point, ResamplingMode::Clipping] {
            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode), size),
                &scene,
                |b, scene| {
                    b.iter(|| {
                        let mut db = BinDatabase::spatial(
                            "bench",
                            locator.clone(),
                            &fields_per_band(&bands),
                            StorageLocation::Memory,
                        );
                        let summary = SpatialBinner::new(&bands)
                            .with_resampling(mode)
                            .bin_scene(scene, &mut db, None)
                            .expect("binning");
                        black_box(summary.bins)
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_locators,
    benchmark_clipping,
    benchmark_spatial_binning
);
criterion_main!(benches);
