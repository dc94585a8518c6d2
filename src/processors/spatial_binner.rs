use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::algorithms::{fields_per_band, BandDefinition, FinishSpatial};
use crate::database::{BinDatabase, DatabaseKind};
use crate::error::{BinningError, Result};
use crate::models::{BorderPolygon, GridCell};
use crate::processors::clipping_resampler::{regular_geometry, ClippingResampler};
use crate::readers::{GeoCoding, PixelSource};
use crate::utils::cancel::CancelFlag;
use crate::utils::progress::ProgressReporter;

/// How scene pixels are placed on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingMode {
    /// Each pixel centre contributes to the single cell containing it
    #[default]
    Point,
    /// Pixel footprints are clipped against cells and contribute by overlapping area
    Clipping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    /// Cancelled between scanlines; the database holds partial, unfinished bins
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinningSummary {
    pub status: RunStatus,
    pub lines: usize,
    pub pixels: usize,
    pub bins: usize,
}

impl BinningSummary {
    pub(crate) fn new() -> Self {
        Self {
            status: RunStatus::Completed,
            lines: 0,
            pixels: 0,
            bins: 0,
        }
    }

    pub(crate) fn aborted(mut self) -> Self {
        self.status = RunStatus::Aborted;
        self
    }
}

/// Bins one scene into a spatial database
pub struct SpatialBinner<'a> {
    bands: &'a [BandDefinition],
    border: BorderPolygon,
    resampling: ResamplingMode,
    cancel: CancelFlag,
}

impl<'a> SpatialBinner<'a> {
    pub fn new(bands: &'a [BandDefinition]) -> Self {
        Self {
            bands,
            border: BorderPolygon::global(),
            resampling: ResamplingMode::Point,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_border(mut self, border: BorderPolygon) -> Self {
        self.border = border;
        self
    }

    pub fn with_resampling(mut self, resampling: ResamplingMode) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bin every valid pixel of `source` into `db`.
    ///
    /// A spatial database without a store gets its window estimated from the scene edges and
    /// its store created first. An open database must still be empty. On a storage error the
    /// database is flushed as far as possible and the error returned.
    pub fn bin_scene(
        &self,
        source: &dyn PixelSource,
        db: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<BinningSummary> {
        let geo_coding = source
            .geo_coding()
            .ok_or_else(|| BinningError::MissingGeoCoding(source.name().to_string()))?;
        let band_indices = self.resolve_bands(source)?;

        if db.kind() != DatabaseKind::Spatial {
            return Err(BinningError::InvalidState(format!(
                "scenes are binned into spatial databases, '{}' is temporal",
                db.name()
            )));
        }
        let layout = fields_per_band(self.bands);
        if db.fields_per_band() != layout.as_slice() {
            return Err(BinningError::LayoutMismatch {
                expected: layout.iter().sum(),
                actual: db.fields_per_band().iter().sum(),
            });
        }

        if self.resampling == ResamplingMode::Clipping {
            regular_geometry(db)?;
        }

        if db.is_open() && db.holds_data()? {
            return Err(BinningError::InvalidState(format!(
                "'{}' already holds a binned scene",
                db.name()
            )));
        }
        if !db.is_open() {
            if db.window().is_empty() {
                db.estimate_window(geo_coding, source.width(), source.height())?;
            }
            db.create_store()?;
        }

        if let Some(p) = progress {
            p.set_length(source.height() as u64);
            p.set_message(&format!("Binning {}", source.name()));
        }
        info!(
            scene = source.name(),
            database = db.name(),
            resampling = ?self.resampling,
            "spatial binning started"
        );

        let result = match self.resampling {
            ResamplingMode::Point => self.bin_points(source, geo_coding, &band_indices, db, progress),
            ResamplingMode::Clipping => ClippingResampler::new(self.bands, &self.border, &self.cancel)
                .resample(source, geo_coding, &band_indices, db, progress),
        };

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                db.flush_quietly();
                return Err(e);
            }
        };
        db.flush()?;

        match summary.status {
            RunStatus::Completed => info!(
                scene = source.name(),
                lines = summary.lines,
                pixels = summary.pixels,
                bins = summary.bins,
                "spatial binning completed"
            ),
            RunStatus::Aborted => warn!(
                scene = source.name(),
                lines = summary.lines,
                "spatial binning aborted"
            ),
        }
        Ok(summary)
    }

    fn resolve_bands(&self, source: &dyn PixelSource) -> Result<Vec<usize>> {
        self.bands
            .iter()
            .map(|band| {
                source.band_index(&band.name).ok_or_else(|| {
                    BinningError::MissingData(format!(
                        "band '{}' in scene '{}'",
                        band.name,
                        source.name()
                    ))
                })
            })
            .collect()
    }

    fn bin_points(
        &self,
        source: &dyn PixelSource,
        geo_coding: &dyn GeoCoding,
        band_indices: &[usize],
        db: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<BinningSummary> {
        let width = source.width();
        let locator = db.locator().clone();
        let mut values = vec![vec![0.0f32; width]; band_indices.len()];
        let mut valid = vec![vec![true; width]; band_indices.len()];
        let mut bin = db.create_bin();
        let mut summary = BinningSummary::new();

        for line in 0..source.height() {
            if self.cancel.is_cancelled() {
                return Ok(summary.aborted());
            }

            for (i, &band) in band_indices.iter().enumerate() {
                source.read_line(band, line, &mut values[i])?;
                if !source.read_valid_mask(band, line, &mut valid[i])? {
                    valid[i].fill(true);
                }
            }

            for x in 0..width {
                let Some(pos) = geo_coding.geo_position(x as f64 + 0.5, line as f64 + 0.5) else {
                    continue;
                };
                if !self.border.contains(pos) {
                    continue;
                }
                let Some(cell) = locator.position_to_cell(pos) else {
                    continue;
                };

                db.read(cell, &mut bin)?;
                let mut touched = false;
                for (band, def) in self.bands.iter().enumerate() {
                    if valid[band][x] {
                        def.algorithm.accumulate_spatial(values[band][x], &mut bin, band);
                        touched = true;
                    }
                }
                if touched {
                    db.write(cell, &bin)?;
                    summary.pixels += 1;
                }
            }

            summary.lines += 1;
            if let Some(p) = progress {
                p.increment(1);
            }
        }

        summary.bins = finish_bins(self.bands, db)?;
        Ok(summary)
    }
}

/// Apply every band's spatial finish step to each stored bin. Returns the number of bins
/// holding data.
pub(crate) fn finish_bins(bands: &[BandDefinition], db: &mut BinDatabase) -> Result<usize> {
    let finishers: Vec<Option<&dyn FinishSpatial>> =
        bands.iter().map(|b| b.algorithm.spatial_finish()).collect();
    let needs_finish = finishers.iter().any(Option::is_some);

    let window = db.window();
    let mut bin = db.create_bin();
    let mut count = 0;
    for row in window.rows() {
        for col in window.cols() {
            let cell = GridCell::new(row, col);
            db.read(cell, &mut bin)?;
            if !bin.contains_data() {
                continue;
            }
            count += 1;
            if !needs_finish {
                continue;
            }
            for (band, finisher) in finishers.iter().enumerate() {
                if let Some(finisher) = finisher {
                    finisher.finish_spatial(&mut bin, band);
                }
            }
            db.write(cell, &bin)?;
        }
    }
    debug!(database = db.name(), bins = count, "finished spatial bins");
    Ok(count)
}
