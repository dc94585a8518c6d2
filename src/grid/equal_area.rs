use std::f64::consts::PI;

use crate::error::{BinningError, Result};
use crate::grid::GridLocator;
use crate::models::{GeoPosition, GridCell};
use crate::utils::constants::EARTH_RADIUS_KM;
use crate::utils::coordinates::normalize_longitude;

/// Equal-area grid with a varying number of columns per row.
///
/// Row 0 is the southernmost band. Rows near the poles hold fewer, wider cells so that
/// every cell covers roughly `cell_size_km²`.
#[derive(Debug, Clone)]
pub struct EqualAreaGrid {
    cell_size_km: f64,
    latitudes: Vec<f64>,
    num_bin: Vec<usize>,
    base_bin: Vec<usize>,
    num_cells: usize,
    width: usize,
}

impl EqualAreaGrid {
    pub fn new(cell_size_km: f64) -> Result<Self> {
        if !(cell_size_km > 0.0) || !cell_size_km.is_finite() {
            return Err(BinningError::InvalidCellSize(cell_size_km));
        }

        let num_rows = ((PI * EARTH_RADIUS_KM) / cell_size_km).ceil() as usize;
        let num_rows = num_rows.max(1);
        let mut latitudes = Vec::with_capacity(num_rows);
        let mut num_bin = Vec::with_capacity(num_rows);
        let mut base_bin = Vec::with_capacity(num_rows);

        let mut total = 0;
        for row in 0..num_rows {
            let lat = (row as f64 + 0.5) * 180.0 / num_rows as f64 - 90.0;
            let cells = (2.0 * num_rows as f64 * lat.to_radians().cos()).round() as usize;
            let cells = cells.max(1);

            latitudes.push(lat);
            base_bin.push(total);
            num_bin.push(cells);
            total += cells;
        }

        let width = num_bin.iter().copied().max().unwrap_or(1);

        Ok(Self {
            cell_size_km,
            latitudes,
            num_bin,
            base_bin,
            num_cells: total,
            width,
        })
    }

    pub fn cell_size_km(&self) -> f64 {
        self.cell_size_km
    }

    pub fn num_rows(&self) -> usize {
        self.num_bin.len()
    }

    /// Number of cells in `row`
    pub fn row_width(&self, row: usize) -> usize {
        self.num_bin[row]
    }

    /// Index of the first cell of `row`
    pub fn row_offset(&self, row: usize) -> usize {
        self.base_bin[row]
    }

    pub fn row_latitude(&self, row: usize) -> f64 {
        self.latitudes[row]
    }

    fn row_of_latitude(&self, lat: f64) -> usize {
        let rows = self.num_rows();
        let row = ((lat + 90.0) * rows as f64 / 180.0).floor() as usize;
        row.min(rows - 1)
    }
}

impl GridLocator for EqualAreaGrid {
    fn position_to_cell(&self, pos: GeoPosition) -> Option<GridCell> {
        if !pos.is_valid() {
            return None;
        }
        let row = self.row_of_latitude(pos.lat);
        let lon = normalize_longitude(pos.lon);
        let cells = self.num_bin[row];
        let col = ((cells as f64 * (lon + 180.0) / 360.0).floor() as usize).min(cells - 1);
        Some(GridCell::new(row as i32, col as i32))
    }

    fn cell_to_position(&self, cell: GridCell) -> GeoPosition {
        let row = cell.row as usize;
        let lon = (cell.col as f64 + 0.5) * 360.0 / self.num_bin[row] as f64 - 180.0;
        GeoPosition::new(self.latitudes[row], lon)
    }

    fn cell_to_index(&self, cell: GridCell) -> usize {
        self.base_bin[cell.row as usize] + cell.col as usize
    }

    fn index_to_cell(&self, index: usize) -> Option<GridCell> {
        if index >= self.num_cells {
            return None;
        }
        // base_bin is strictly increasing, so the owning row is the last one starting at or
        // before `index`
        let row = self.base_bin.partition_point(|&start| start <= index) - 1;
        let col = index - self.base_bin[row];
        Some(GridCell::new(row as i32, col as i32))
    }

    fn is_valid(&self, cell: GridCell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.num_rows()
            && (cell.col as usize) < self.num_bin[cell.row as usize]
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.num_rows()
    }

    fn num_cells(&self) -> usize {
        self.num_cells
    }
}
