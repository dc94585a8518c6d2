use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::models::GridCell;

/// Bounding rectangle of grid cells backed by a database, in global grid coordinates.
///
/// An empty window has `row_min > row_max`; the serialized field names form the
/// persisted window record (`rowMin`, `rowMax`, `colMin`, `colMax`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Window {
    pub row_min: i32,
    pub row_max: i32,
    pub col_min: i32,
    pub col_max: i32,
}

impl Window {
    pub fn new(row_min: i32, row_max: i32, col_min: i32, col_max: i32) -> Self {
        Self {
            row_min,
            row_max,
            col_min,
            col_max,
        }
    }

    pub fn empty() -> Self {
        Self::new(i32::MAX, i32::MIN, i32::MAX, i32::MIN)
    }

    pub fn is_empty(&self) -> bool {
        self.row_min > self.row_max || self.col_min > self.col_max
    }

    pub fn height(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.row_max - self.row_min + 1) as usize
        }
    }

    pub fn width(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.col_max - self.col_min + 1) as usize
        }
    }

    pub fn rows(&self) -> RangeInclusive<i32> {
        self.row_min..=self.row_max
    }

    pub fn cols(&self) -> RangeInclusive<i32> {
        self.col_min..=self.col_max
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        self.rows().contains(&cell.row) && self.cols().contains(&cell.col)
    }

    /// Grow the window so that it includes `cell`
    pub fn extend(&mut self, cell: GridCell) {
        self.row_min = self.row_min.min(cell.row);
        self.row_max = self.row_max.max(cell.row);
        self.col_min = self.col_min.min(cell.col);
        self.col_max = self.col_max.max(cell.col);
    }

    pub fn union(&self, other: &Window) -> Window {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Window::new(
            self.row_min.min(other.row_min),
            self.row_max.max(other.row_max),
            self.col_min.min(other.col_min),
            self.col_max.max(other.col_max),
        )
    }

    /// Translate a global cell into (row, col) offsets inside the window
    pub fn to_local(&self, cell: GridCell) -> Option<(usize, usize)> {
        if !self.contains(cell) {
            return None;
        }
        Some((
            (cell.row - self.row_min) as usize,
            (cell.col - self.col_min) as usize,
        ))
    }

    pub fn to_global(&self, row: usize, col: usize) -> GridCell {
        GridCell::new(self.row_min + row as i32, self.col_min + col as i32)
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::empty()
    }
}
