use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::algorithms::{fields_per_band, BandDefinition};
use crate::database::BinDatabase;
use crate::error::{BinningError, Result};
use crate::grid::GridLocator;
use crate::models::{BorderPolygon, DateRange, Window};
use crate::processors::spatial_binner::{BinningSummary, ResamplingMode, RunStatus, SpatialBinner};
use crate::processors::temporal_merger::TemporalMerger;
use crate::readers::{PixelSource, SceneReader};
use crate::store::StorageLocation;
use crate::utils::cancel::CancelFlag;
use crate::utils::progress::ProgressReporter;

/// Spatial database of one binned scene, waiting to be merged
type BinnedScene = (BinDatabase, BinningSummary);

#[derive(Debug, Clone, Serialize)]
pub struct SceneOutcome {
    pub scene: String,
    pub summary: Option<BinningSummary>,
    pub merged_bins: usize,
    /// Observed outside the configured date range
    pub excluded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: RunStatus,
    pub scenes: Vec<SceneOutcome>,
    pub window: Window,
}

impl BatchReport {
    pub fn merged_scenes(&self) -> usize {
        self.scenes.iter().filter(|s| s.merged_bins > 0).count()
    }

    pub fn failed_scenes(&self) -> usize {
        self.scenes.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn excluded_scenes(&self) -> usize {
        self.scenes.iter().filter(|s| s.excluded).count()
    }
}

/// Bins scenes in parallel, one spatial database per worker, then merges them in scene
/// order into a temporal database
pub struct BatchProcessor {
    max_workers: usize,
    resampling: ResamplingMode,
    border: BorderPolygon,
    location: StorageLocation,
    date_range: DateRange,
    cancel: CancelFlag,
}

impl BatchProcessor {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            resampling: ResamplingMode::Point,
            border: BorderPolygon::global(),
            location: StorageLocation::Memory,
            date_range: DateRange::unbounded(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_resampling(mut self, resampling: ResamplingMode) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_border(mut self, border: BorderPolygon) -> Self {
        self.border = border;
        self
    }

    /// Where the per-scene spatial databases live while the batch runs
    pub fn with_location(mut self, location: StorageLocation) -> Self {
        self.location = location;
        self
    }

    /// Only scenes observed within `date_range` are binned
    pub fn with_date_range(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bin and merge every scene file into `target`.
    ///
    /// Scenes that fail to load or bin are reported and skipped, as are scenes observed outside
    /// the date range. Storage errors of the target database abort the batch.
    pub fn process(
        &self,
        scene_paths: &[PathBuf],
        bands: &[BandDefinition],
        target: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<BatchReport> {
        let locator = target.locator().clone();
        let layout = fields_per_band(bands);

        if let Some(p) = progress {
            p.set_length(scene_paths.len() as u64);
            p.set_message(&format!("Binning {} scenes...", scene_paths.len()));
        }

        // Configure Rayon thread pool
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()
            .map_err(|e| BinningError::Config(e.to_string()))?;

        let binned: Vec<(String, Result<Option<BinnedScene>>)> = pool.install(|| {
            scene_paths
                .par_iter()
                .enumerate()
                .map(|(index, path)| {
                    let name = scene_database_name(index, path);
                    let result = self.bin_scene_file(path, &name, &locator, &layout, bands);
                    if let Some(p) = progress {
                        p.increment(1);
                    }
                    (name, result)
                })
                .collect()
        });

        if let Some(p) = progress {
            p.set_length(binned.len() as u64);
            p.update(0);
            p.set_message("Merging scenes...");
        }

        let merger = TemporalMerger::new(bands).with_cancel_flag(self.cancel.clone());
        let mut status = RunStatus::Completed;
        let mut scenes = Vec::with_capacity(binned.len());

        let mut pending = binned.into_iter();
        while let Some((name, result)) = pending.next() {
            let mut outcome = SceneOutcome {
                scene: name,
                summary: None,
                merged_bins: 0,
                excluded: false,
                error: None,
            };

            match result {
                Ok(None) => outcome.excluded = true,
                Ok(Some((mut db, summary))) => {
                    outcome.summary = Some(summary.clone());
                    let merged = if summary.status == RunStatus::Completed
                        && status == RunStatus::Completed
                    {
                        let merged = merger.merge(&db, target, None);
                        let cleanup = db.delete();
                        merged.and_then(|merged| cleanup.map(|()| Some(merged)))
                    } else {
                        db.delete().map(|()| None)
                    };

                    match merged {
                        Ok(Some(merged)) => {
                            outcome.merged_bins = merged.bins;
                            status = merged.status;
                        }
                        Ok(None) => status = RunStatus::Aborted,
                        Err(e) => {
                            discard_databases(pending);
                            target.flush_quietly();
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    warn!(scene = %outcome.scene, error = %e, "scene skipped");
                    outcome.error = Some(e.to_string());
                }
            }

            scenes.push(outcome);
            if let Some(p) = progress {
                p.increment(1);
            }
        }

        target.flush()?;
        let report = BatchReport {
            status,
            scenes,
            window: target.window(),
        };
        info!(
            scenes = report.scenes.len(),
            merged = report.merged_scenes(),
            failed = report.failed_scenes(),
            status = ?report.status,
            "batch finished"
        );
        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Merged {} of {} scenes",
                report.merged_scenes(),
                report.scenes.len()
            ));
        }
        Ok(report)
    }

    fn bin_scene_file(
        &self,
        path: &Path,
        name: &str,
        locator: &Arc<dyn GridLocator>,
        layout: &[usize],
        bands: &[BandDefinition],
    ) -> Result<Option<BinnedScene>> {
        let scene = SceneReader::new().read_scene(path)?;
        if !self.date_range.accepts(scene.observation_time()) {
            info!(scene = name, "observed outside the date range, skipped");
            return Ok(None);
        }
        let mut db = BinDatabase::spatial(name, locator.clone(), layout, self.location.clone());

        let binned = SpatialBinner::new(bands)
            .with_border(self.border.clone())
            .with_resampling(self.resampling)
            .with_cancel_flag(self.cancel.clone())
            .bin_scene(&scene, &mut db, None);

        match binned {
            Ok(summary) => Ok(Some((db, summary))),
            Err(e) => {
                if let Err(cleanup) = db.delete() {
                    warn!(database = name, error = %cleanup, "could not remove spatial database");
                }
                Err(e)
            }
        }
    }
}

/// Remove the spatial databases of scenes that will not be merged
fn discard_databases(rest: impl Iterator<Item = (String, Result<Option<BinnedScene>>)>) {
    for (name, result) in rest {
        if let Ok(Some((mut db, _))) = result {
            if let Err(e) = db.delete() {
                warn!(database = %name, error = %e, "could not remove spatial database");
            }
        }
    }
}

/// Unique per-scene database name, `<index>_<file stem>`
fn scene_database_name(index: usize, path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scene");
    format!("{:04}_{}", index, stem)
}
