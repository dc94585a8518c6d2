use std::collections::HashMap;

use crate::error::Result;
use crate::store::{BinStore, StoreDimensions};

/// Sparse in-memory store; only written records take memory.
#[derive(Debug)]
pub struct MemoryBinStore {
    dims: StoreDimensions,
    records: HashMap<(usize, usize), Vec<f32>>,
}

impl MemoryBinStore {
    pub fn new(dims: StoreDimensions) -> Self {
        Self {
            dims,
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl BinStore for MemoryBinStore {
    fn dimensions(&self) -> StoreDimensions {
        self.dims
    }

    fn read(&self, row: usize, col: usize, values: &mut [f32]) -> Result<()> {
        self.dims.check(row, col, values.len())?;
        match self.records.get(&(row, col)) {
            Some(record) => values.copy_from_slice(record),
            None => values.fill(0.0),
        }
        Ok(())
    }

    fn write(&mut self, row: usize, col: usize, values: &[f32]) -> Result<()> {
        self.dims.check(row, col, values.len())?;
        match self.records.get_mut(&(row, col)) {
            Some(record) => record.copy_from_slice(values),
            None => {
                self.records.insert((row, col), values.to_vec());
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}
