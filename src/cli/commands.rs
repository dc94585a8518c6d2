use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::algorithms::{fields_per_band, BandDefinition};
use crate::cli::args::{Cli, Commands};
use crate::config::{BinningConfig, GridConfig};
use crate::database::BinDatabase;
use crate::error::{BinningError, Result};
use crate::grid::GridLocator;
use crate::models::GeoPosition;
use crate::processors::{scan_borders, BatchProcessor, RunStatus, SpatialBinner, TemporalMerger};
use crate::readers::{PixelSource, SceneReader};
use crate::utils::cancel::CancelFlag;
use crate::utils::coordinates::validate_lat_lon;
use crate::utils::progress::ProgressReporter;
use crate::writers::BinTableWriter;

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let quiet = cli.quiet;

    match cli.command {
        Commands::GridInfo { config, lat, lon } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;

            match &request.grid {
                GridConfig::Regular {
                    cells_per_degree, ..
                } => println!("Grid: regular lat/lon, {} cells per degree", cells_per_degree),
                GridConfig::EqualArea { cell_size_km } => {
                    println!("Grid: equal-area, {} km cells", cell_size_km)
                }
            }
            println!("Rows: {}", locator.height());
            println!("Max columns: {}", locator.width());
            println!("Cells: {}", locator.num_cells());

            if let (Some(lat), Some(lon)) = (lat, lon) {
                validate_lat_lon(lat, lon)?;
                match locator.position_to_cell(GeoPosition::new(lat, lon)) {
                    Some(cell) => {
                        let centre = locator.cell_to_position(cell);
                        println!(
                            "Position ({}, {}) -> cell (row {}, col {}), index {}, centre ({:.4}, {:.4})",
                            lat,
                            lon,
                            cell.row,
                            cell.col,
                            locator.cell_to_index(cell),
                            centre.lat,
                            centre.lon
                        );
                    }
                    None => println!("Position ({}, {}) lies outside the grid", lat, lon),
                }
            }
        }

        Commands::Spatial {
            config,
            scene,
            name,
        } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;
            let bands = request.band_definitions();
            ensure_database_dir(&request.database_dir)?;

            let source = SceneReader::new().read_scene(&scene)?;
            if !request.date_range()?.accepts(source.observation_time()) {
                println!(
                    "Scene {} was observed outside the configured date range, nothing binned",
                    scene.display()
                );
                return Ok(());
            }
            let name = name.unwrap_or_else(|| source.name().to_string());
            println!("Binning scene {} into spatial database '{}'", scene.display(), name);

            let mut db = BinDatabase::spatial(
                name,
                locator,
                &fields_per_band(&bands),
                request.storage_location(),
            );
            let progress = ProgressReporter::new(source.height() as u64, "Binning...", quiet);
            let summary = SpatialBinner::new(&bands)
                .with_border(request.border())
                .with_resampling(request.resampling)
                .bin_scene(&source, &mut db, Some(&progress))?;
            db.close()?;

            progress.finish_with_message(&format!(
                "Binned {} pixels into {} bins",
                summary.pixels, summary.bins
            ));
            if summary.status == RunStatus::Aborted {
                println!("Binning aborted after {} scanlines", summary.lines);
            }
        }

        Commands::Merge {
            config,
            databases,
            keep,
        } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;
            let bands = request.band_definitions();
            let mut target = open_temporal(&request, locator.clone(), &bands)?;

            let merger = TemporalMerger::new(&bands);
            let progress = ProgressReporter::new(0, "Merging...", quiet);
            for name in databases {
                let mut source = BinDatabase::spatial(
                    name.as_str(),
                    locator.clone(),
                    &fields_per_band(&bands),
                    request.storage_location(),
                );
                source.open_store()?;
                let summary = merger.merge(&source, &mut target, Some(&progress))?;
                progress.println(&format!("{}: {} bins merged", name, summary.bins));

                if keep {
                    source.close()?;
                } else {
                    source.delete()?;
                }
            }
            target.close()?;
            progress.finish_with_message("Merge complete");
            print_window(&target);
        }

        Commands::Batch {
            config,
            input_dir,
            file_pattern,
            max_workers,
        } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;
            let bands = request.band_definitions();
            let scenes = collect_scene_files(&input_dir, &file_pattern)?;
            if scenes.is_empty() {
                return Err(BinningError::MissingData(format!(
                    "no scene files in {}",
                    input_dir.display()
                )));
            }

            let workers = max_workers.unwrap_or_else(|| request.workers());
            println!(
                "Binning {} scenes from {} with {} workers",
                scenes.len(),
                input_dir.display(),
                workers
            );

            let mut target = open_temporal(&request, locator, &bands)?;
            let progress = ProgressReporter::new(scenes.len() as u64, "Binning scenes...", quiet);
            let report = BatchProcessor::new(workers)
                .with_resampling(request.resampling)
                .with_border(request.border())
                .with_location(request.storage_location())
                .with_date_range(request.date_range()?)
                .with_cancel_flag(CancelFlag::new())
                .process(&scenes, &bands, &mut target, Some(&progress))?;
            target.close()?;

            for scene in report.scenes.iter().filter(|s| s.error.is_some()) {
                println!(
                    "Skipped {}: {}",
                    scene.scene,
                    scene.error.as_deref().unwrap_or_default()
                );
            }
            if report.excluded_scenes() > 0 {
                println!(
                    "Excluded {} scenes observed outside the date range",
                    report.excluded_scenes()
                );
            }
            println!(
                "Merged {} of {} scenes",
                report.merged_scenes(),
                report.scenes.len()
            );
            print_window(&target);
        }

        Commands::Footprint { config } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;
            let bands = request.band_definitions();
            let target = open_existing_temporal(&request, locator, &bands)?;

            match scan_borders(&target, &CancelFlag::new())? {
                Some(border) => println!("{}", serde_json::to_string_pretty(border.vertices())?),
                None => println!("Temporal database '{}' holds no data", target.name()),
            }
        }

        Commands::Dump {
            config,
            output_file,
        } => {
            let request = BinningConfig::load(&config)?;
            let locator = request.build_locator()?;
            let bands = request.band_definitions();
            let target = open_existing_temporal(&request, locator, &bands)?;

            if let Some(parent) = output_file.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let count = BinTableWriter::new().write_database(&target, &bands, &output_file)?;
            println!("Wrote {} bins to {}", count, output_file.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
        None => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    };
    installed.map_err(|e| BinningError::Config(format!("Failed to install logger: {}", e)))?;

    info!(level = %level, "logging initialised");
    Ok(())
}

fn ensure_database_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

fn open_temporal(
    request: &BinningConfig,
    locator: Arc<dyn GridLocator>,
    bands: &[BandDefinition],
) -> Result<BinDatabase> {
    ensure_database_dir(&request.database_dir)?;
    let mut db = BinDatabase::temporal(
        request.database_name.as_str(),
        locator,
        &fields_per_band(bands),
        request.storage_location(),
    );
    if db.open_or_create_store()? {
        info!(database = db.name(), "continuing existing temporal database");
    }
    Ok(db)
}

fn open_existing_temporal(
    request: &BinningConfig,
    locator: Arc<dyn GridLocator>,
    bands: &[BandDefinition],
) -> Result<BinDatabase> {
    let mut db = BinDatabase::temporal(
        request.database_name.as_str(),
        locator,
        &fields_per_band(bands),
        request.storage_location(),
    );
    db.open_store()?;
    Ok(db)
}

fn print_window(db: &BinDatabase) {
    let window = db.window();
    if window.is_empty() {
        println!("Temporal database '{}' holds no data", db.name());
    } else {
        println!(
            "Temporal window: rows {}..={}, cols {}..={}",
            window.row_min, window.row_max, window.col_min, window.col_max
        );
    }
}

/// Scene CSV files of `dir` whose file name contains `pattern`, sorted by name
fn collect_scene_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.contains(pattern));
        if path.is_file() && is_csv && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_scene_files() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        for name in ["b_scene.csv", "a_scene.CSV", "notes.txt", "other.csv"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let files = collect_scene_files(dir.path(), "scene").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_scene.CSV", "b_scene.csv"]);
    }
}
