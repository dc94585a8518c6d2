//! Persistent arrays of accumulator records keyed by local (row, col).

pub mod memory;
pub mod mmap;

pub use memory::MemoryBinStore;
pub use mmap::MmapBinStore;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BinningError, Result};
use crate::utils::constants::WINDOW_RECORD_SUFFIX;

/// Shape of a bin store: `width × height` records of `fields` floats each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDimensions {
    pub width: usize,
    pub height: usize,
    pub fields: usize,
}

impl StoreDimensions {
    pub fn new(width: usize, height: usize, fields: usize) -> Self {
        Self {
            width,
            height,
            fields,
        }
    }

    pub fn num_records(&self) -> usize {
        self.width * self.height
    }

    pub fn num_values(&self) -> usize {
        self.num_records() * self.fields
    }

    pub(crate) fn check(&self, row: usize, col: usize, len: usize) -> Result<()> {
        if row >= self.height || col >= self.width {
            return Err(BinningError::Store(format!(
                "record ({}, {}) outside store of {}x{}",
                row, col, self.height, self.width
            )));
        }
        if len != self.fields {
            return Err(BinningError::LayoutMismatch {
                expected: self.fields,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Storage backend for a bin database. Records that were never written read back as zeros.
pub trait BinStore: Send {
    fn dimensions(&self) -> StoreDimensions;

    fn read(&self, row: usize, col: usize, values: &mut [f32]) -> Result<()>;

    fn write(&mut self, row: usize, col: usize, values: &[f32]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Close the store and remove whatever it persisted
    fn delete(&mut self) -> Result<()>;
}

/// Where a database keeps its store and window record
#[derive(Debug, Clone, PartialEq)]
pub enum StorageLocation {
    Memory,
    Directory(PathBuf),
}

impl StorageLocation {
    pub fn directory(path: impl AsRef<Path>) -> Self {
        StorageLocation::Directory(path.as_ref().to_path_buf())
    }

    pub fn create_store(&self, name: &str, dims: StoreDimensions) -> Result<Box<dyn BinStore>> {
        match self {
            StorageLocation::Memory => Ok(Box::new(MemoryBinStore::new(dims))),
            StorageLocation::Directory(dir) => Ok(Box::new(MmapBinStore::create(dir, name, dims)?)),
        }
    }

    pub fn open_store(&self, name: &str) -> Result<Box<dyn BinStore>> {
        match self {
            StorageLocation::Memory => Err(BinningError::StoreNotFound(format!(
                "{} (in-memory stores cannot be reopened)",
                name
            ))),
            StorageLocation::Directory(dir) => Ok(Box::new(MmapBinStore::open(dir, name)?)),
        }
    }

    pub fn store_exists(&self, name: &str) -> bool {
        match self {
            StorageLocation::Memory => false,
            StorageLocation::Directory(dir) => MmapBinStore::exists(dir, name),
        }
    }

    /// Path of the window side-record, `None` for in-memory databases
    pub fn window_record_path(&self, name: &str) -> Option<PathBuf> {
        match self {
            StorageLocation::Memory => None,
            StorageLocation::Directory(dir) => {
                Some(dir.join(format!("{}.{}", name, WINDOW_RECORD_SUFFIX)))
            }
        }
    }
}
