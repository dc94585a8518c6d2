use l3_binner::algorithms::{fields_per_band, AlgorithmKind, BandDefinition};
use l3_binner::config::BinningConfig;
use l3_binner::database::BinDatabase;
use l3_binner::grid::{EqualAreaGrid, GridLocator, LatLonGrid};
use l3_binner::models::{GeoPosition, GridCell, LatLonBounds, Window};
use l3_binner::processors::{
    scan_borders, BatchProcessor, ResamplingMode, RunStatus, SpatialBinner, TemporalMerger,
};
use l3_binner::readers::{AffineGeoCoding, PixelSource, RasterScene, SceneReader};
use l3_binner::utils::CancelFlag;
use l3_binner::writers::BinTableWriter;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Writes a `width × height` scene of 0.25° pixels whose top-left pixel centre is at
/// (`lat`, `lon`); every sample has `value`
fn write_scene(dir: &Path, name: &str, lat: f64, lon: f64, size: (usize, usize), value: f32) -> PathBuf {
    let (width, height) = size;
    let mut content = String::from("line,pixel,lat,lon,chl\n");
    for line in 0..height {
        for pixel in 0..width {
            content.push_str(&format!(
                "{},{},{},{},{}\n",
                line,
                pixel,
                lat - 0.25 * line as f64,
                lon + 0.25 * pixel as f64,
                value
            ));
        }
    }
    let path = dir.join(format!("{}.csv", name));
    fs::write(&path, content).expect("Failed to write scene");
    path
}

/// Like `write_scene`, with every pixel acquired at `time`
fn write_timed_scene(
    dir: &Path,
    name: &str,
    lat: f64,
    lon: f64,
    size: (usize, usize),
    time: &str,
) -> PathBuf {
    let (width, height) = size;
    let mut content = String::from("line,pixel,lat,lon,time,chl\n");
    for line in 0..height {
        for pixel in 0..width {
            content.push_str(&format!(
                "{},{},{},{},{},1.0\n",
                line,
                pixel,
                lat - 0.25 * line as f64,
                lon + 0.25 * pixel as f64,
                time
            ));
        }
    }
    let path = dir.join(format!("{}.csv", name));
    fs::write(&path, content).expect("Failed to write scene");
    path
}

fn write_request(dir: &Path) -> PathBuf {
    let request = format!(
        r#"
        database_dir = "{}"
        database_name = "monthly"

        [grid]
        kind = "regular"
        cells_per_degree = 1.0

        [[bands]]
        name = "chl"
        algorithm = "arithmetic_mean"
        "#,
        dir.join("db").display()
    );
    let path = dir.join("request.toml");
    fs::write(&path, request).expect("Failed to write request");
    path
}

#[test]
fn test_regular_grid_cell_index_round_trip() {
    // 4×4 grid of one-degree cells
    let grid = LatLonGrid::new(1.0, LatLonBounds::new(0.0, 4.0, 0.0, 4.0)).unwrap();
    let centre = grid.cell_to_position(GridCell::new(1, 1));
    assert_eq!(centre, GeoPosition::new(2.5, 1.5));
    assert_eq!(grid.position_to_index(centre), Some(5));
    assert_eq!(grid.index_to_cell(5), Some(GridCell::new(1, 1)));
}

#[test]
fn test_spatial_then_merge_across_runs() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let request = BinningConfig::load(&write_request(temp_dir.path())).unwrap();
    fs::create_dir_all(&request.database_dir).unwrap();
    let locator = request.build_locator().unwrap();
    let bands = request.band_definitions();
    let layout = fields_per_band(&bands);

    // Two overlapping scenes binned in separate runs
    let scenes = [
        write_scene(temp_dir.path(), "morning", 45.875, 10.125, (4, 4), 1.0),
        write_scene(temp_dir.path(), "evening", 45.875, 10.125, (8, 4), 3.0),
    ];
    for path in &scenes {
        let scene = SceneReader::new().read_scene(path).unwrap();
        let mut db = BinDatabase::spatial(
            scene.name(),
            locator.clone(),
            &layout,
            request.storage_location(),
        );
        let summary = SpatialBinner::new(&bands)
            .bin_scene(&scene, &mut db, None)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        db.close().unwrap();
    }

    // A later run reopens the spatial databases and merges them
    let mut target = BinDatabase::temporal(
        request.database_name.as_str(),
        locator.clone(),
        &layout,
        request.storage_location(),
    );
    assert!(!target.open_or_create_store().unwrap());
    let merger = TemporalMerger::new(&bands);
    for name in ["morning", "evening"] {
        let mut source =
            BinDatabase::spatial(name, locator.clone(), &layout, request.storage_location());
        source.open_store().unwrap();
        merger.merge(&source, &mut target, None).unwrap();
        source.delete().unwrap();
    }
    target.close().unwrap();

    // And yet another run reads the cumulative product
    let mut target = BinDatabase::temporal(
        request.database_name.as_str(),
        locator.clone(),
        &layout,
        request.storage_location(),
    );
    target.open_store().unwrap();
    // lat 45.875..45.125 -> row 44, lon 10.125..11.875 -> cols 190..191
    assert_eq!(target.window(), Window::new(44, 44, 190, 191));

    let mut bin = target.create_bin();
    let mut mean = [0.0f32; 2];
    target.read(GridCell::new(44, 190), &mut bin).unwrap();
    bands[0].algorithm.interpret(&bin, 0, &mut mean);
    // 16 samples of 1.0 and 16 of 3.0, equal weights
    assert!((mean[0] - 2.0).abs() < 1e-6);

    target.read(GridCell::new(44, 191), &mut bin).unwrap();
    bands[0].algorithm.interpret(&bin, 0, &mut mean);
    assert!((mean[0] - 3.0).abs() < 1e-6);

    let border = scan_borders(&target, &CancelFlag::new()).unwrap().unwrap();
    assert_eq!(border.bounds(), LatLonBounds::new(45.5, 45.5, 10.5, 11.5));

    let output = temp_dir.path().join("monthly.csv");
    let count = BinTableWriter::new()
        .write_database(&target, &bands, &output)
        .unwrap();
    assert_eq!(count, 2);
    let table = fs::read_to_string(&output).unwrap();
    assert!(table.starts_with("row,col,index,lat,lon,chl_mean,chl_sigma\n"));
    assert_eq!(table.lines().count(), 3);
}

#[test]
fn test_batch_pipeline() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let request = BinningConfig::load(&write_request(temp_dir.path())).unwrap();
    fs::create_dir_all(&request.database_dir).unwrap();
    let locator = request.build_locator().unwrap();
    let bands = request.band_definitions();

    let scenes: Vec<PathBuf> = (0..4)
        .map(|i| {
            write_scene(
                temp_dir.path(),
                &format!("scene_{}", i),
                -10.125,
                20.125 + i as f64,
                (4, 4),
                i as f32 + 1.0,
            )
        })
        .collect();

    let mut target = BinDatabase::temporal(
        request.database_name.as_str(),
        locator,
        &fields_per_band(&bands),
        request.storage_location(),
    );
    target.create_store().unwrap();
    let report = BatchProcessor::new(2)
        .with_location(request.storage_location())
        .process(&scenes, &bands, &mut target, None)
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.merged_scenes(), 4);
    // lat -10.125 .. -10.875 -> row 100, one column per scene
    assert_eq!(report.window, Window::new(100, 100, 200, 203));
}

#[test]
fn test_batch_with_polygon_region_and_date_range() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let request_path = temp_dir.path().join("request.toml");
    fs::write(
        &request_path,
        format!(
            r#"
            database_dir = "{}"
            start_date = "2024-03-01"
            end_date = "2024-03-31"

            [grid]
            kind = "regular"
            cells_per_degree = 1.0

            [region]
            vertices = [
                {{ lat = -12.0, lon = 19.5 }},
                {{ lat = -9.0, lon = 19.5 }},
                {{ lat = -9.0, lon = 21.0 }},
                {{ lat = -12.0, lon = 21.0 }},
            ]

            [[bands]]
            name = "chl"
            algorithm = "sum"
            "#,
            temp_dir.path().join("db").display()
        ),
    )
    .unwrap();
    let request = BinningConfig::load(&request_path).unwrap();
    fs::create_dir_all(&request.database_dir).unwrap();
    let bands = request.band_definitions();

    // both scenes span cells (100, 200) and (100, 201); the region keeps the first only
    let scenes = vec![
        write_timed_scene(temp_dir.path(), "march", -10.125, 20.125, (8, 4), "2024-03-20T09:30:00Z"),
        write_timed_scene(temp_dir.path(), "april", -10.125, 20.125, (8, 4), "2024-04-02T09:30:00Z"),
    ];

    let mut target = BinDatabase::temporal(
        request.database_name.as_str(),
        request.build_locator().unwrap(),
        &fields_per_band(&bands),
        request.storage_location(),
    );
    target.create_store().unwrap();
    let report = BatchProcessor::new(2)
        .with_border(request.border())
        .with_date_range(request.date_range().unwrap())
        .with_location(request.storage_location())
        .process(&scenes, &bands, &mut target, None)
        .unwrap();

    assert_eq!(report.merged_scenes(), 1);
    assert_eq!(report.excluded_scenes(), 1);
    assert_eq!(report.window, Window::new(100, 100, 200, 200));

    let mut bin = target.create_bin();
    target.read(GridCell::new(100, 200), &mut bin).unwrap();
    assert_eq!(bin.read(0, 0), 16.0);
}

#[test]
fn test_clipping_and_point_binning_agree_on_aligned_pixels() {
    let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::ArithmeticMean)];
    let locator: Arc<dyn GridLocator> = Arc::new(LatLonGrid::global(1.0).unwrap());
    let values: Vec<f32> = (0..16).map(|v| v as f32).collect();
    let scene = RasterScene::new("aligned", 4, 4)
        .with_band("chl", values)
        .unwrap()
        .with_geo_coding(Box::new(AffineGeoCoding::new(30.0, -60.0, 1.0, 1.0)));

    let mut results = Vec::new();
    for mode in [ResamplingMode::Point, ResamplingMode::Clipping] {
        let mut db = BinDatabase::spatial(
            "aligned",
            locator.clone(),
            &fields_per_band(&bands),
            l3_binner::store::StorageLocation::Memory,
        );
        let summary = SpatialBinner::new(&bands)
            .with_resampling(mode)
            .bin_scene(&scene, &mut db, None)
            .unwrap();
        assert_eq!(summary.bins, 16);

        let mut bin = db.create_bin();
        let mut mean = [0.0f32; 2];
        db.read(GridCell::new(61, 121), &mut bin).unwrap();
        bands[0].algorithm.interpret(&bin, 0, &mut mean);
        results.push(mean[0]);
    }
    assert_eq!(results, vec![5.0, 5.0]);
}

#[test]
fn test_equal_area_binning() {
    let grid = Arc::new(EqualAreaGrid::new(9.28).unwrap());
    let locator: Arc<dyn GridLocator> = grid.clone();
    let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
    let scene = RasterScene::new("swath", 3, 3)
        .with_band("chl", vec![1.0; 9])
        .unwrap()
        .with_geo_coding(Box::new(AffineGeoCoding::new(0.02, 0.0, 0.005, 0.005)));

    let mut db = BinDatabase::spatial(
        "swath",
        locator.clone(),
        &fields_per_band(&bands),
        l3_binner::store::StorageLocation::Memory,
    );
    let summary = SpatialBinner::new(&bands)
        .bin_scene(&scene, &mut db, None)
        .unwrap();
    assert_eq!(summary.pixels, 9);

    // the whole 0.015° scene falls into one 9.28 km cell next to the equator
    let cell = locator
        .position_to_cell(GeoPosition::new(0.01, 0.005))
        .unwrap();
    let mut bin = db.create_bin();
    db.read(cell, &mut bin).unwrap();
    assert_eq!(bin.read(0, 0), 9.0);
    assert_eq!(grid.row_width(cell.row as usize), grid.width());
}
