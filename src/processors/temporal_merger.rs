use serde::Serialize;
use tracing::{info, warn};

use crate::algorithms::{fields_per_band, BandDefinition, CombineTemporal};
use crate::database::{BinDatabase, DatabaseKind};
use crate::error::{BinningError, Result};
use crate::models::{Bin, BorderPolygon, GridCell, LatLonBounds};
use crate::processors::spatial_binner::RunStatus;
use crate::utils::cancel::CancelFlag;
use crate::utils::progress::ProgressReporter;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub status: RunStatus,
    pub rows: usize,
    pub bins: usize,
}

/// Folds finished spatial databases into a cumulative temporal database
pub struct TemporalMerger<'a> {
    bands: &'a [BandDefinition],
    cancel: CancelFlag,
}

impl<'a> TemporalMerger<'a> {
    pub fn new(bands: &'a [BandDefinition]) -> Self {
        Self {
            bands,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Combine every bin of `source` into `target`, band by band.
    ///
    /// Bands whose algorithm has no temporal combine step are copied over. Cancellation is
    /// checked once per source row; rows merged before it remain in `target`.
    pub fn merge(
        &self,
        source: &BinDatabase,
        target: &mut BinDatabase,
        progress: Option<&ProgressReporter>,
    ) -> Result<MergeSummary> {
        self.check_compatible(source, target)?;

        let combiners: Vec<Option<&dyn CombineTemporal>> = self
            .bands
            .iter()
            .map(|b| b.algorithm.temporal_combine())
            .collect();
        let locator = source.locator().clone();
        let window = source.window();
        let mut source_bin = source.create_bin();
        let mut target_bin = target.create_bin();
        let mut summary = MergeSummary {
            status: RunStatus::Completed,
            rows: 0,
            bins: 0,
        };

        if let Some(p) = progress {
            p.set_length(window.height() as u64);
            p.set_message(&format!("Merging {}", source.name()));
        }

        for row in window.rows() {
            if self.cancel.is_cancelled() {
                summary.status = RunStatus::Aborted;
                break;
            }

            for col in window.cols() {
                let cell = GridCell::new(row, col);
                if !locator.is_valid(cell) {
                    continue;
                }
                source.read(cell, &mut source_bin)?;
                if !source_bin.contains_data() {
                    continue;
                }

                target.read(cell, &mut target_bin)?;
                for (band, combiner) in combiners.iter().enumerate() {
                    if !source_bin.band_contains_data(band) {
                        continue;
                    }
                    match combiner {
                        Some(combiner) => {
                            combiner.combine_temporal(&source_bin, &mut target_bin, band)
                        }
                        None => target_bin.copy_band_from(&source_bin, band),
                    }
                }
                target.write(cell, &target_bin)?;
                summary.bins += 1;
            }

            summary.rows += 1;
            if let Some(p) = progress {
                p.increment(1);
            }
        }

        match summary.status {
            RunStatus::Completed => info!(
                source = source.name(),
                target = target.name(),
                bins = summary.bins,
                "merged spatial database"
            ),
            RunStatus::Aborted => warn!(
                source = source.name(),
                rows = summary.rows,
                "merge aborted"
            ),
        }
        Ok(summary)
    }

    fn check_compatible(&self, source: &BinDatabase, target: &BinDatabase) -> Result<()> {
        if target.kind() != DatabaseKind::Temporal {
            return Err(BinningError::InvalidState(format!(
                "merge target '{}' is not a temporal database",
                target.name()
            )));
        }

        let (a, b) = (source.locator(), target.locator());
        if a.width() != b.width() || a.height() != b.height() || a.num_cells() != b.num_cells() {
            return Err(BinningError::GridMismatch(format!(
                "'{}' uses a {}x{} grid, '{}' a {}x{} grid",
                source.name(),
                a.height(),
                a.width(),
                target.name(),
                b.height(),
                b.width()
            )));
        }

        let layout = fields_per_band(self.bands);
        for db in [source, target] {
            if db.fields_per_band() != layout.as_slice() {
                return Err(BinningError::LayoutMismatch {
                    expected: layout.iter().sum(),
                    actual: db.fields_per_band().iter().sum(),
                });
            }
        }
        Ok(())
    }
}

/// Geographic bounding rectangle of all bins holding data.
///
/// Each window row is scanned from the west and from the east for its first bin with data;
/// the centres of those edge bins bound the result. `None` when no bin holds data.
pub fn scan_borders(db: &BinDatabase, cancel: &CancelFlag) -> Result<Option<BorderPolygon>> {
    let locator = db.locator().clone();
    let window = db.window();
    let mut bin = db.create_bin();
    let mut bounds: Option<LatLonBounds> = None;

    let has_data = |cell: GridCell, bin: &mut Bin| -> Result<bool> {
        if !locator.is_valid(cell) {
            return Ok(false);
        }
        db.read(cell, bin)?;
        Ok(bin.contains_data())
    };

    for row in window.rows() {
        if cancel.is_cancelled() {
            return Err(BinningError::Cancelled);
        }

        let mut west = None;
        for col in window.cols() {
            let cell = GridCell::new(row, col);
            if has_data(cell, &mut bin)? {
                west = Some(cell);
                break;
            }
        }
        let Some(west) = west else {
            continue;
        };
        let mut east = west;
        for col in window.cols().rev() {
            if col <= west.col {
                break;
            }
            let cell = GridCell::new(row, col);
            if has_data(cell, &mut bin)? {
                east = cell;
                break;
            }
        }

        for cell in [west, east] {
            let pos = locator.cell_to_position(cell);
            let b = bounds.get_or_insert(LatLonBounds::new(pos.lat, pos.lat, pos.lon, pos.lon));
            b.lat_min = b.lat_min.min(pos.lat);
            b.lat_max = b.lat_max.max(pos.lat);
            b.lon_min = b.lon_min.min(pos.lon);
            b.lon_max = b.lon_max.max(pos.lon);
        }
    }

    Ok(bounds.map(BorderPolygon::from_bounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmKind;
    use crate::grid::{GridLocator, LatLonGrid};
    use crate::models::{GeoPosition, Window};
    use crate::store::StorageLocation;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn grid() -> Arc<dyn GridLocator> {
        Arc::new(LatLonGrid::new(1.0, LatLonBounds::new(0.0, 8.0, 0.0, 8.0)).unwrap())
    }

    fn spatial_with(
        bands: &[BandDefinition],
        window: Window,
        cells: &[(GridCell, Bin)],
    ) -> BinDatabase {
        let mut db = BinDatabase::spatial(
            "scene",
            grid(),
            &fields_per_band(bands),
            StorageLocation::Memory,
        );
        db.set_window(window).unwrap();
        db.create_store().unwrap();
        for (cell, bin) in cells {
            db.write(*cell, bin).unwrap();
        }
        db
    }

    fn temporal(bands: &[BandDefinition]) -> BinDatabase {
        let mut db = BinDatabase::temporal(
            "merged",
            grid(),
            &fields_per_band(bands),
            StorageLocation::Memory,
        );
        db.create_store().unwrap();
        db
    }

    fn sum_bin(value: f32) -> Bin {
        let mut bin = Bin::new(&[1]);
        bin.write(0, 0, value);
        bin
    }

    #[test]
    fn test_merge_adds_and_grows_window() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let first = spatial_with(
            &bands,
            Window::new(1, 2, 1, 2),
            &[(GridCell::new(1, 1), sum_bin(2.0))],
        );
        let second = spatial_with(
            &bands,
            Window::new(1, 5, 1, 6),
            &[
                (GridCell::new(1, 1), sum_bin(3.0)),
                (GridCell::new(5, 6), sum_bin(1.0)),
            ],
        );
        let mut target = temporal(&bands);
        let merger = TemporalMerger::new(&bands);

        let summary = merger.merge(&first, &mut target, None).unwrap();
        assert_eq!(summary.bins, 1);
        assert_eq!(target.window(), Window::new(1, 1, 1, 1));

        merger.merge(&second, &mut target, None).unwrap();
        assert_eq!(target.window(), Window::new(1, 5, 1, 6));

        let mut bin = target.create_bin();
        target.read(GridCell::new(1, 1), &mut bin).unwrap();
        assert_eq!(bin.read(0, 0), 5.0);
    }

    #[test]
    fn test_merge_copies_bands_without_combine() {
        struct Latest;
        impl crate::algorithms::Algorithm for Latest {
            fn name(&self) -> &'static str {
                "latest"
            }
            fn accumulated_variable_count(&self) -> usize {
                1
            }
            fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize) {
                bin.write(band, 0, value);
            }
            fn interpreted_variable_count(&self) -> usize {
                1
            }
            fn interpreted_variable_names(&self, band_name: &str) -> Vec<String> {
                vec![band_name.to_string()]
            }
            fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]) {
                out[0] = bin.read(band, 0);
            }
        }

        let bands = vec![BandDefinition::new("flag", Box::new(Latest))];
        let cell = GridCell::new(3, 3);
        let mut target = temporal(&bands);
        let merger = TemporalMerger::new(&bands);
        for value in [4.0, 9.0] {
            let source = spatial_with(&bands, Window::new(3, 3, 3, 3), &[(cell, sum_bin(value))]);
            merger.merge(&source, &mut target, None).unwrap();
        }

        let mut bin = target.create_bin();
        target.read(cell, &mut bin).unwrap();
        assert_eq!(bin.read(0, 0), 9.0);
    }

    #[test]
    fn test_merge_rejects_other_grid() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let source = spatial_with(&bands, Window::new(0, 0, 0, 0), &[]);
        let other: Arc<dyn GridLocator> = Arc::new(LatLonGrid::global(1.0).unwrap());
        let mut target =
            BinDatabase::temporal("merged", other, &[1], StorageLocation::Memory);
        target.create_store().unwrap();

        assert!(matches!(
            TemporalMerger::new(&bands).merge(&source, &mut target, None),
            Err(BinningError::GridMismatch(_))
        ));
    }

    #[test]
    fn test_cancelled_merge_is_aborted() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let source = spatial_with(
            &bands,
            Window::new(1, 1, 1, 1),
            &[(GridCell::new(1, 1), sum_bin(2.0))],
        );
        let mut target = temporal(&bands);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let summary = TemporalMerger::new(&bands)
            .with_cancel_flag(cancel)
            .merge(&source, &mut target, None)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Aborted);
        assert!(target.window().is_empty());
    }

    #[test]
    fn test_scan_borders_single_cell() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let mut target = temporal(&bands);
        target.write(GridCell::new(2, 3), &sum_bin(1.0)).unwrap();

        let border = scan_borders(&target, &CancelFlag::new()).unwrap().unwrap();
        let centre = GeoPosition::new(5.5, 3.5);
        assert_eq!(border.vertices(), &[centre, centre, centre, centre]);
        assert!(border.contains(centre));
    }

    #[test]
    fn test_scan_borders_bounding_box() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let mut target = temporal(&bands);
        for cell in [GridCell::new(1, 2), GridCell::new(1, 6), GridCell::new(4, 0)] {
            target.write(cell, &sum_bin(1.0)).unwrap();
        }

        let border = scan_borders(&target, &CancelFlag::new()).unwrap().unwrap();
        assert_eq!(border.bounds(), LatLonBounds::new(3.5, 6.5, 0.5, 6.5));
    }

    #[test]
    fn test_scan_borders_empty_database() {
        let bands = vec![BandDefinition::from_kind("chl", AlgorithmKind::Sum)];
        let target = temporal(&bands);
        assert_eq!(scan_borders(&target, &CancelFlag::new()).unwrap(), None);
    }
}
