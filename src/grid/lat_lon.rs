use crate::error::{BinningError, Result};
use crate::grid::{GridLocator, RegularGeometry};
use crate::models::{GeoPosition, GridCell, LatLonBounds};
use crate::utils::coordinates::{normalize_longitude, wrap_longitude_from};

/// Regular fixed-resolution lat/lon grid.
///
/// Rows run from the northern edge southwards, columns eastwards from `lon_min`.
#[derive(Debug, Clone)]
pub struct LatLonGrid {
    cells_per_degree: f64,
    bounds: LatLonBounds,
    width: usize,
    height: usize,
}

impl LatLonGrid {
    pub fn new(cells_per_degree: f64, bounds: LatLonBounds) -> Result<Self> {
        if !(cells_per_degree > 0.0) || !cells_per_degree.is_finite() {
            return Err(BinningError::InvalidCellSize(cells_per_degree));
        }
        if !(bounds.lat_span() > 0.0) || !(bounds.lon_span() > 0.0) {
            return Err(BinningError::Config(format!(
                "Grid bounds must span a positive area, got lat [{}, {}] lon [{}, {}]",
                bounds.lat_min, bounds.lat_max, bounds.lon_min, bounds.lon_max
            )));
        }
        if bounds.lat_min < -90.0 || bounds.lat_max > 90.0 || bounds.lon_span() > 360.0 {
            return Err(BinningError::Config(
                "Grid bounds exceed the globe".to_string(),
            ));
        }

        let width = (bounds.lon_span() * cells_per_degree).ceil() as usize;
        let height = (bounds.lat_span() * cells_per_degree).ceil() as usize;

        Ok(Self {
            cells_per_degree,
            bounds,
            width,
            height,
        })
    }

    pub fn global(cells_per_degree: f64) -> Result<Self> {
        Self::new(cells_per_degree, LatLonBounds::global())
    }

    pub fn cells_per_degree(&self) -> f64 {
        self.cells_per_degree
    }

    pub fn bounds(&self) -> LatLonBounds {
        self.bounds
    }
}

impl GridLocator for LatLonGrid {
    fn position_to_cell(&self, pos: GeoPosition) -> Option<GridCell> {
        if !pos.is_valid() {
            return None;
        }
        let lon = wrap_longitude_from(pos.lon, self.bounds.lon_min);
        let mut row = ((self.bounds.lat_max - pos.lat) * self.cells_per_degree).floor();
        // the southern edge belongs to the last row
        if pos.lat == self.bounds.lat_min {
            row = row.min(self.height as f64 - 1.0);
        }
        let col = ((lon - self.bounds.lon_min) * self.cells_per_degree).floor();
        if row < 0.0 || col < 0.0 {
            return None;
        }

        let cell = GridCell::new(row as i32, col as i32);
        if self.is_valid(cell) {
            Some(cell)
        } else {
            None
        }
    }

    fn cell_to_position(&self, cell: GridCell) -> GeoPosition {
        let lat = self.bounds.lat_max - (cell.row as f64 + 0.5) / self.cells_per_degree;
        let lon = self.bounds.lon_min + (cell.col as f64 + 0.5) / self.cells_per_degree;
        GeoPosition::new(lat, normalize_longitude(lon))
    }

    fn cell_to_index(&self, cell: GridCell) -> usize {
        cell.row as usize * self.width + cell.col as usize
    }

    fn index_to_cell(&self, index: usize) -> Option<GridCell> {
        if index >= self.num_cells() {
            return None;
        }
        Some(GridCell::new(
            (index / self.width) as i32,
            (index % self.width) as i32,
        ))
    }

    fn is_valid(&self, cell: GridCell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height
            && (cell.col as usize) < self.width
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn num_cells(&self) -> usize {
        self.width * self.height
    }

    fn regular_geometry(&self) -> Option<RegularGeometry> {
        Some(RegularGeometry {
            lat_max: self.bounds.lat_max,
            lon_min: self.bounds.lon_min,
            lon_max: self.bounds.lon_max,
            cell_size: 1.0 / self.cells_per_degree,
            width: self.width,
            height: self.height,
        })
    }
}
