//! Area-weighted resampling of pixel footprints onto a regular lat/lon grid.
//!
//! Pixels are accumulated into a scratch database holding, per band, the area-weighted value
//! sum and the covered fraction of each cell in permille. Cells covered by more than half are
//! then resolved into the target database through the band algorithms.

use tracing::debug;

use crate::algorithms::BandDefinition;
use crate::database::BinDatabase;
use crate::error::{BinningError, Result};
use crate::grid::RegularGeometry;
use crate::models::{Bin, BorderPolygon, GeoPosition, GridCell, Window};
use crate::processors::clipping::Clipper;
use crate::processors::spatial_binner::{BinningSummary, RunStatus};
use crate::readers::{GeoCoding, PixelSource};
use crate::utils::cancel::CancelFlag;
use crate::utils::constants::{
    ANTIMERIDIAN_MARGIN_DEG, HALF_PERMILLE, PERMILLE, RESAMPLING_COVERAGE,
    RESAMPLING_FIELDS_PER_BAND, RESAMPLING_VALUE,
};
use crate::utils::progress::ProgressReporter;

pub(crate) struct ClippingResampler<'a> {
    bands: &'a [BandDefinition],
    border: &'a BorderPolygon,
    cancel: &'a CancelFlag,
}

/// Per-line buffers shared by every pixel of the scan
struct PixelScratch {
    clipper: Clipper,
    bin: Bin,
    values: Vec<f32>,
    valid: Vec<bool>,
}

impl<'a> ClippingResampler<'a> {
    pub(crate) fn new(
        bands: &'a [BandDefinition],
        border: &'a BorderPolygon,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            bands,
            border,
            cancel,
        }
    }

    pub(crate) fn resample(
        &self,
        source: &dyn PixelSource,
        geo_coding: &dyn GeoCoding,
        band_indices: &[usize],
        target: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<BinningSummary> {
        let geometry = regular_geometry(target)?;

        let mut scratch = BinDatabase::spatial(
            format!("{}_resampling", target.name()),
            target.locator().clone(),
            &vec![RESAMPLING_FIELDS_PER_BAND; self.bands.len()],
            target.location().clone(),
        );
        scratch.set_window(target.window())?;
        scratch.create_store()?;

        let result = self
            .accumulate(source, geo_coding, band_indices, &geometry, &mut scratch, progress)
            .and_then(|mut summary| {
                if summary.status == RunStatus::Completed {
                    summary.bins = self.resolve(&scratch, target)?;
                }
                Ok(summary)
            });
        let cleanup = scratch.delete();

        let summary = result?;
        cleanup?;
        Ok(summary)
    }

    fn accumulate(
        &self,
        source: &dyn PixelSource,
        geo_coding: &dyn GeoCoding,
        band_indices: &[usize],
        geometry: &RegularGeometry,
        scratch: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<BinningSummary> {
        let width = source.width();
        let num_bands = band_indices.len();
        let mut line_values = vec![vec![0.0f32; width]; num_bands];
        let mut line_valid = vec![vec![true; width]; num_bands];

        // Pixel corners along the top and bottom edge of the current scanline
        let mut upper = vec![None; width + 1];
        let mut lower = vec![None; width + 1];
        fill_corner_row(geo_coding, 0, &mut upper);

        let mut pixel = PixelScratch {
            clipper: Clipper::new(),
            bin: scratch.create_bin(),
            values: vec![0.0; num_bands],
            valid: vec![false; num_bands],
        };
        let mut summary = BinningSummary::new();

        for line in 0..source.height() {
            if self.cancel.is_cancelled() {
                return Ok(summary.aborted());
            }

            for (i, &band) in band_indices.iter().enumerate() {
                source.read_line(band, line, &mut line_values[i])?;
                if !source.read_valid_mask(band, line, &mut line_valid[i])? {
                    line_valid[i].fill(true);
                }
            }
            fill_corner_row(geo_coding, line + 1, &mut lower);

            for x in 0..width {
                let [Some(a), Some(b), Some(c), Some(d)] =
                    [upper[x], upper[x + 1], lower[x + 1], lower[x]]
                else {
                    continue;
                };
                let corners = [a, b, c, d];
                if !corners.iter().any(|&corner| self.border.contains(corner)) {
                    continue;
                }

                let mut any_valid = false;
                for band in 0..num_bands {
                    pixel.values[band] = line_values[band][x];
                    pixel.valid[band] = line_valid[band][x];
                    any_valid |= pixel.valid[band];
                }
                if !any_valid {
                    continue;
                }

                summary.pixels += 1;
                resample_pixel(&corners, geometry, scratch, &mut pixel)?;
            }

            std::mem::swap(&mut upper, &mut lower);
            summary.lines += 1;
            if let Some(p) = progress {
                p.increment(1);
            }
        }
        Ok(summary)
    }

    /// Turn covered scratch cells into algorithm bins of `target`
    fn resolve(&self, scratch: &BinDatabase, target: &mut BinDatabase) -> Result<usize> {
        let window = scratch.window();
        let locator = scratch.locator().clone();
        let mut coverage_bin = scratch.create_bin();
        let mut bin = target.create_bin();
        let mut count = 0;

        for row in window.rows() {
            for col in window.cols() {
                let cell = GridCell::new(row, col);
                if !locator.is_valid(cell) {
                    continue;
                }
                scratch.read(cell, &mut coverage_bin)?;
                if !coverage_bin.contains_data() {
                    continue;
                }

                bin.clear();
                for (band, def) in self.bands.iter().enumerate() {
                    let coverage = coverage_bin.read(band, RESAMPLING_COVERAGE);
                    if coverage <= HALF_PERMILLE {
                        continue;
                    }
                    let mut value = coverage_bin.read(band, RESAMPLING_VALUE);
                    if coverage < PERMILLE {
                        value *= PERMILLE / coverage;
                    }
                    def.algorithm.accumulate_spatial(value, &mut bin, band);
                    if let Some(finisher) = def.algorithm.spatial_finish() {
                        finisher.finish_spatial(&mut bin, band);
                    }
                }
                if bin.contains_data() {
                    target.write(cell, &bin)?;
                    count += 1;
                }
            }
        }
        debug!(database = target.name(), bins = count, "resolved resampled bins");
        Ok(count)
    }
}

pub(crate) fn regular_geometry(db: &BinDatabase) -> Result<RegularGeometry> {
    db.locator().regular_geometry().ok_or_else(|| {
        BinningError::Config(
            "clipping resampling needs a regular lat/lon grid".to_string(),
        )
    })
}

fn fill_corner_row(geo_coding: &dyn GeoCoding, y: usize, row: &mut [Option<GeoPosition>]) {
    for (x, corner) in row.iter_mut().enumerate() {
        *corner = geo_coding.geo_position(x as f64, y as f64);
    }
}

/// Shift a corner longitude by ±360° when the grid reaches close to the antimeridian
fn wrap_corner_longitude(lon: f64, geometry: &RegularGeometry) -> f64 {
    let mut lon = lon;
    if geometry.lon_max > 180.0 - ANTIMERIDIAN_MARGIN_DEG && lon < -180.0 + ANTIMERIDIAN_MARGIN_DEG {
        lon += 360.0;
    }
    if geometry.lon_min < -180.0 + ANTIMERIDIAN_MARGIN_DEG && lon > 180.0 - ANTIMERIDIAN_MARGIN_DEG {
        lon -= 360.0;
    }
    lon
}

fn resample_pixel(
    corners: &[GeoPosition; 4],
    geometry: &RegularGeometry,
    scratch: &mut BinDatabase,
    pixel: &mut PixelScratch,
) -> Result<()> {
    let mut polygon = [(0.0, 0.0); 4];
    for (vertex, corner) in polygon.iter_mut().zip(corners) {
        let lon = wrap_corner_longitude(corner.lon, geometry);
        *vertex = geometry.to_grid_xy(GeoPosition::new(corner.lat, lon));
    }

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in &polygon {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    let (min_x, max_x) = (min_x.floor(), max_x.ceil());
    let (min_y, max_y) = (min_y.floor(), max_y.ceil());

    if max_x <= 0.0
        || min_x >= geometry.width as f64
        || max_y <= 0.0
        || min_y >= geometry.height as f64
    {
        return Ok(());
    }

    let window = scratch.window();
    let (col_start, col_end, row_start, row_end) = confine(window, min_x, max_x, min_y, max_y);
    let locator = scratch.locator().clone();

    for col in col_start..col_end {
        for row in row_start..row_end {
            let area = pixel.clipper.clipped_area(&polygon, col as f64, row as f64);
            if area <= 0.0 {
                continue;
            }
            let cell = GridCell::new(row, col);
            if !locator.is_valid(cell) {
                continue;
            }

            scratch.read(cell, &mut pixel.bin)?;
            let coverage = (area * PERMILLE as f64 + 0.5).floor() as f32;
            for band in 0..pixel.values.len() {
                if !pixel.valid[band] {
                    continue;
                }
                let value = pixel.bin.read(band, RESAMPLING_VALUE);
                pixel.bin.write(
                    band,
                    RESAMPLING_VALUE,
                    value + (area * pixel.values[band] as f64) as f32,
                );
                let covered = pixel.bin.read(band, RESAMPLING_COVERAGE);
                pixel.bin.write(band, RESAMPLING_COVERAGE, covered + coverage);
            }
            scratch.write(cell, &pixel.bin)?;
        }
    }
    Ok(())
}

/// Candidate cell ranges `[start, end)` of a pixel bounding box, confined to `window`
fn confine(window: Window, min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> (i32, i32, i32, i32) {
    let col_start = (min_x as i32).max(window.col_min);
    let col_end = (max_x as i32).min(window.col_max.saturating_add(1));
    let row_start = (min_y as i32).max(window.row_min);
    let row_end = (max_y as i32).min(window.row_max.saturating_add(1));
    (col_start, col_end, row_start, row_end)
}
