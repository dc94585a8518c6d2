use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::window_record::{read_window_record, remove_window_record, write_window_record};
use crate::error::{BinningError, Result};
use crate::grid::GridLocator;
use crate::models::{Bin, GridCell, Window};
use crate::readers::GeoCoding;
use crate::store::{BinStore, StorageLocation, StoreDimensions};

/// Spatial databases hold one scene and freeze their window up front; temporal databases
/// accumulate many scenes over the whole grid and grow their window on every write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Spatial,
    Temporal,
}

/// Grid-addressed bin storage.
///
/// Callers address bins by global grid cell; the database translates into its store's local
/// coordinates and keeps track of the window of cells it backs.
pub struct BinDatabase {
    name: String,
    kind: DatabaseKind,
    locator: Arc<dyn GridLocator>,
    fields_per_band: Vec<usize>,
    num_fields: usize,
    location: StorageLocation,
    /// Cells addressable in the store
    extent: Window,
    /// Cells that may hold data
    window: Window,
    store: Option<Box<dyn BinStore>>,
}

impl BinDatabase {
    pub fn spatial(
        name: impl Into<String>,
        locator: Arc<dyn GridLocator>,
        fields_per_band: &[usize],
        location: StorageLocation,
    ) -> Self {
        Self::new(DatabaseKind::Spatial, name.into(), locator, fields_per_band, location)
    }

    pub fn temporal(
        name: impl Into<String>,
        locator: Arc<dyn GridLocator>,
        fields_per_band: &[usize],
        location: StorageLocation,
    ) -> Self {
        Self::new(DatabaseKind::Temporal, name.into(), locator, fields_per_band, location)
    }

    fn new(
        kind: DatabaseKind,
        name: String,
        locator: Arc<dyn GridLocator>,
        fields_per_band: &[usize],
        location: StorageLocation,
    ) -> Self {
        Self {
            name,
            kind,
            locator,
            fields_per_band: fields_per_band.to_vec(),
            num_fields: fields_per_band.iter().sum(),
            location,
            extent: Window::empty(),
            window: Window::empty(),
            store: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn locator(&self) -> &Arc<dyn GridLocator> {
        &self.locator
    }

    pub fn fields_per_band(&self) -> &[usize] {
        &self.fields_per_band
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn extent(&self) -> Window {
        self.extent
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    /// A bin with this database's field layout
    pub fn create_bin(&self) -> Bin {
        Bin::new(&self.fields_per_band)
    }

    /// Estimate the window of a spatial database from the four edges of a scene.
    ///
    /// Edge pixel centres are mapped to grid cells and the window becomes their bounding
    /// box. On a regular grid, edge pixels beyond the grid are clamped onto its border so a
    /// scene larger than the grid still covers the part it overlaps. A scene whose edge
    /// crosses the antimeridian spans the full grid width plus one column.
    pub fn estimate_window(
        &mut self,
        geo_coding: &dyn GeoCoding,
        width: usize,
        height: usize,
    ) -> Result<Window> {
        self.check_window_mutable()?;

        let geometry = self.locator.regular_geometry();
        let mut window = Window::empty();
        let mut previous_lon: Option<f64> = None;
        let mut crosses_antimeridian = false;

        for (x, y) in edge_pixels(width, height) {
            let pos = match geo_coding.geo_position(x as f64 + 0.5, y as f64 + 0.5) {
                Some(pos) => pos,
                None => continue,
            };
            if let Some(prev) = previous_lon {
                if (pos.lon - prev).abs() > 180.0 {
                    crosses_antimeridian = true;
                }
            }
            previous_lon = Some(pos.lon);

            let cell = match self.locator.position_to_cell(pos) {
                Some(cell) => Some(cell),
                None if pos.is_valid() => geometry.map(|g| g.clamped_cell(pos)),
                None => None,
            };
            if let Some(cell) = cell {
                window.extend(cell);
            }
        }

        if crosses_antimeridian && !window.is_empty() {
            window.col_min = 0;
            window.col_max = self.locator.width() as i32;
        }

        debug!(
            database = %self.name,
            row_min = window.row_min,
            row_max = window.row_max,
            col_min = window.col_min,
            col_max = window.col_max,
            crosses_antimeridian,
            "estimated window"
        );

        self.window = window;
        self.extent = window;
        Ok(window)
    }

    /// Set the window of a spatial database explicitly, before its store exists
    pub fn set_window(&mut self, window: Window) -> Result<()> {
        self.check_window_mutable()?;
        self.window = window;
        self.extent = window;
        Ok(())
    }

    pub fn create_store(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Err(BinningError::InvalidState(format!(
                "store of '{}' already exists",
                self.name
            )));
        }

        let dims = match self.kind {
            DatabaseKind::Spatial => {
                if self.window.is_empty() {
                    return Err(BinningError::EmptyWindow(self.name.clone()));
                }
                self.extent = self.window;
                StoreDimensions::new(self.extent.width(), self.extent.height(), self.num_fields)
            }
            DatabaseKind::Temporal => {
                self.extent = self.full_grid();
                self.window = Window::empty();
                StoreDimensions::new(self.extent.width(), self.extent.height(), self.num_fields)
            }
        };

        self.store = Some(self.location.create_store(&self.name, dims)?);
        info!(
            database = %self.name,
            kind = ?self.kind,
            width = dims.width,
            height = dims.height,
            fields = dims.fields,
            "created bin database"
        );
        Ok(())
    }

    /// Reopen a persisted database, restoring its window from the side-record
    pub fn open_store(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Err(BinningError::InvalidState(format!(
                "store of '{}' is already open",
                self.name
            )));
        }

        let store = self.location.open_store(&self.name)?;
        let dims = store.dimensions();
        if dims.fields != self.num_fields {
            return Err(BinningError::LayoutMismatch {
                expected: self.num_fields,
                actual: dims.fields,
            });
        }

        let record = match self.location.window_record_path(&self.name) {
            Some(path) => read_window_record(&path)?,
            None => None,
        };

        match self.kind {
            DatabaseKind::Spatial => {
                let window = record.ok_or_else(|| {
                    BinningError::MissingData(format!("window record of '{}'", self.name))
                })?;
                if window.width() != dims.width || window.height() != dims.height {
                    return Err(BinningError::GridMismatch(format!(
                        "window of '{}' is {}x{}, store is {}x{}",
                        self.name,
                        window.height(),
                        window.width(),
                        dims.height,
                        dims.width
                    )));
                }
                self.window = window;
                self.extent = window;
            }
            DatabaseKind::Temporal => {
                let extent = self.full_grid();
                if extent.width() != dims.width || extent.height() != dims.height {
                    return Err(BinningError::GridMismatch(format!(
                        "store of '{}' is {}x{}, grid needs {}x{}",
                        self.name,
                        dims.height,
                        dims.width,
                        extent.height(),
                        extent.width()
                    )));
                }
                self.extent = extent;
                self.window = record.unwrap_or_default();
            }
        }

        self.store = Some(store);
        info!(
            database = %self.name,
            kind = ?self.kind,
            rows = self.window.height(),
            cols = self.window.width(),
            "opened bin database"
        );
        Ok(())
    }

    /// Open the persisted store if there is one, create it otherwise.
    /// Returns `true` when an existing store was opened.
    pub fn open_or_create_store(&mut self) -> Result<bool> {
        if self.location.store_exists(&self.name) {
            self.open_store()?;
            Ok(true)
        } else {
            self.create_store()?;
            Ok(false)
        }
    }

    /// Load the bin of `cell` into `bin`.
    ///
    /// Cells rejected by the locator leave `bin` untouched; cells that were never written
    /// clear it.
    pub fn read(&self, cell: GridCell, bin: &mut Bin) -> Result<()> {
        let store = self.store()?;
        if !self.locator.is_valid(cell) {
            return Ok(());
        }
        self.check_layout(bin)?;

        if !self.window.contains(cell) {
            bin.clear();
            return Ok(());
        }
        match self.extent.to_local(cell) {
            Some((row, col)) => store.read(row, col, bin.as_mut_slice()),
            None => {
                bin.clear();
                Ok(())
            }
        }
    }

    /// Store `bin` at `cell`. Invalid cells, bins without data and cells outside a spatial
    /// window are skipped.
    pub fn write(&mut self, cell: GridCell, bin: &Bin) -> Result<()> {
        if self.store.is_none() {
            return Err(BinningError::StoreNotCreated(self.name.clone()));
        }
        if !self.locator.is_valid(cell) || !bin.contains_data() {
            return Ok(());
        }
        self.check_layout(bin)?;

        let (row, col) = match self.extent.to_local(cell) {
            Some(local) => local,
            None => return Ok(()),
        };
        self.store_mut()?.write(row, col, bin.as_slice())?;

        if self.kind == DatabaseKind::Temporal {
            self.window.extend(cell);
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.store_mut()?.flush()?;
        self.persist_window()
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(mut store) = self.store.take() {
            self.persist_window()?;
            store.close()?;
            info!(database = %self.name, "closed bin database");
        }
        Ok(())
    }

    /// Remove the store and window record of this database
    pub fn delete(&mut self) -> Result<()> {
        let store = match self.store.take() {
            Some(store) => Some(store),
            None => match self.location.open_store(&self.name) {
                Ok(store) => Some(store),
                Err(BinningError::StoreNotFound(_)) => None,
                Err(e) => return Err(e),
            },
        };
        if let Some(mut store) = store {
            store.delete()?;
        }
        if let Some(path) = self.location.window_record_path(&self.name) {
            remove_window_record(&path)?;
        }
        debug!(database = %self.name, "deleted bin database");
        Ok(())
    }

    /// Best-effort flush on an error path; the original error is what callers report
    pub fn flush_quietly(&mut self) {
        if self.store.is_none() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(database = %self.name, error = %e, "flush after failure did not succeed");
        }
    }

    /// Whether any cell of the window holds data
    pub fn holds_data(&self) -> Result<bool> {
        let mut bin = self.create_bin();
        for cell in self.window_cells() {
            self.read(cell, &mut bin)?;
            if bin.contains_data() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Attach a ready-made store over the current window
    #[cfg(test)]
    pub(crate) fn attach_store(&mut self, store: Box<dyn BinStore>) {
        self.extent = self.window;
        self.store = Some(store);
    }

    /// All cells of the current window, row by row
    pub fn window_cells(&self) -> impl Iterator<Item = GridCell> {
        let window = self.window;
        window
            .rows()
            .flat_map(move |row| window.cols().map(move |col| GridCell::new(row, col)))
    }

    fn full_grid(&self) -> Window {
        Window::new(
            0,
            self.locator.height() as i32 - 1,
            0,
            self.locator.width() as i32,
        )
    }

    fn persist_window(&self) -> Result<()> {
        if let Some(path) = self.location.window_record_path(&self.name) {
            write_window_record(&path, &self.window)?;
        }
        Ok(())
    }

    fn check_window_mutable(&self) -> Result<()> {
        if self.kind != DatabaseKind::Spatial {
            return Err(BinningError::InvalidState(format!(
                "'{}' is temporal, its window grows with writes",
                self.name
            )));
        }
        if self.store.is_some() {
            return Err(BinningError::InvalidState(format!(
                "window of '{}' is frozen once its store exists",
                self.name
            )));
        }
        Ok(())
    }

    fn check_layout(&self, bin: &Bin) -> Result<()> {
        if bin.num_fields() != self.num_fields {
            return Err(BinningError::LayoutMismatch {
                expected: self.num_fields,
                actual: bin.num_fields(),
            });
        }
        Ok(())
    }

    fn store(&self) -> Result<&dyn BinStore> {
        self.store
            .as_deref()
            .ok_or_else(|| BinningError::StoreNotCreated(self.name.clone()))
    }

    fn store_mut(&mut self) -> Result<&mut Box<dyn BinStore>> {
        let name = &self.name;
        self.store
            .as_mut()
            .ok_or_else(|| BinningError::StoreNotCreated(name.clone()))
    }
}

/// Edge pixels of a `width × height` scene in ring order: top, right, bottom, left
fn edge_pixels(width: usize, height: usize) -> Vec<(usize, usize)> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut pixels = Vec::with_capacity(2 * (width + height));
    pixels.extend((0..width).map(|x| (x, 0)));
    pixels.extend((1..height).map(|y| (width - 1, y)));
    if height > 1 {
        pixels.extend((0..width - 1).rev().map(|x| (x, height - 1)));
    }
    if width > 1 {
        pixels.extend((1..height - 1).rev().map(|y| (0, y)));
    }
    pixels
}
