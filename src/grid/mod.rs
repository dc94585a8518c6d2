//! Grid locators translate between geographic positions, grid cells and linear bin indices.

pub mod equal_area;
pub mod lat_lon;

pub use equal_area::EqualAreaGrid;
pub use lat_lon::LatLonGrid;

use crate::models::{GeoPosition, GridCell};
use crate::utils::coordinates::normalize_longitude;

/// Geometry of a regular (fixed cell size) lat/lon grid, row 0 at the northern edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularGeometry {
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    /// Cell edge length in degrees
    pub cell_size: f64,
    pub width: usize,
    pub height: usize,
}

impl RegularGeometry {
    /// Fractional (x, y) grid coordinates; each cell is a unit square
    #[inline]
    pub fn to_grid_xy(&self, pos: GeoPosition) -> (f64, f64) {
        (
            (pos.lon - self.lon_min) / self.cell_size,
            (self.lat_max - pos.lat) / self.cell_size,
        )
    }

    /// Cell nearest to `pos`; positions beyond the grid land on its border cells.
    ///
    /// Longitudes are taken on the side of the antimeridian closest to the grid centre.
    pub fn clamped_cell(&self, pos: GeoPosition) -> GridCell {
        let centre = 0.5 * (self.lon_min + self.lon_max);
        let lon = centre + normalize_longitude(pos.lon - centre);
        let (x, y) = self.to_grid_xy(GeoPosition::new(pos.lat, lon));
        let col = x.floor().clamp(0.0, self.width as f64 - 1.0);
        let row = y.floor().clamp(0.0, self.height as f64 - 1.0);
        GridCell::new(row as i32, col as i32)
    }
}

/// Deterministic, invertible mapping between positions and grid cells.
///
/// Implementations are immutable after construction and shared between databases.
pub trait GridLocator: Send + Sync + std::fmt::Debug {
    /// Cell containing `pos`, `None` when the position lies outside the grid
    fn position_to_cell(&self, pos: GeoPosition) -> Option<GridCell>;

    /// Centre of `cell`
    fn cell_to_position(&self, cell: GridCell) -> GeoPosition;

    /// Linear index of a valid cell
    fn cell_to_index(&self, cell: GridCell) -> usize;

    fn index_to_cell(&self, index: usize) -> Option<GridCell>;

    fn is_valid(&self, cell: GridCell) -> bool;

    /// Maximum number of columns of any row
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn num_cells(&self) -> usize;

    /// Regular lat/lon geometry, if this grid has one
    fn regular_geometry(&self) -> Option<RegularGeometry> {
        None
    }

    fn index_to_position(&self, index: usize) -> Option<GeoPosition> {
        self.index_to_cell(index)
            .map(|cell| self.cell_to_position(cell))
    }

    fn position_to_index(&self, pos: GeoPosition) -> Option<usize> {
        self.position_to_cell(pos)
            .map(|cell| self.cell_to_index(cell))
    }
}
