use memmap2::MmapMut;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BinningError, Result};
use crate::store::{BinStore, StoreDimensions};
use crate::utils::constants::{STORE_FILE_SUFFIX, STORE_HEADER_SUFFIX};

const VALUE_SIZE: usize = std::mem::size_of::<f32>();

/// File-backed store: a flat little-endian `f32` array mapped into memory, plus a JSON
/// header with the dimensions so the store can be reopened.
pub struct MmapBinStore {
    data_path: PathBuf,
    header_path: PathBuf,
    dims: StoreDimensions,
    mmap: Option<MmapMut>,
}

impl MmapBinStore {
    pub fn create(dir: &Path, name: &str, dims: StoreDimensions) -> Result<Self> {
        if dims.num_values() == 0 {
            return Err(BinningError::Store(format!(
                "cannot create empty store '{}' ({}x{}x{})",
                name, dims.height, dims.width, dims.fields
            )));
        }

        fs::create_dir_all(dir)?;
        let (data_path, header_path) = Self::paths(dir, name);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&data_path)?;
        file.set_len((dims.num_values() * VALUE_SIZE) as u64)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        fs::write(&header_path, serde_json::to_vec_pretty(&dims)?)?;
        debug!(
            store = %data_path.display(),
            width = dims.width,
            height = dims.height,
            fields = dims.fields,
            "created bin store"
        );

        Ok(Self {
            data_path,
            header_path,
            dims,
            mmap: Some(mmap),
        })
    }

    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        let (data_path, header_path) = Self::paths(dir, name);
        if !data_path.exists() || !header_path.exists() {
            return Err(BinningError::StoreNotFound(data_path.display().to_string()));
        }

        let dims: StoreDimensions = serde_json::from_slice(&fs::read(&header_path)?)?;
        let file = OpenOptions::new().read(true).write(true).open(&data_path)?;
        let expected = (dims.num_values() * VALUE_SIZE) as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(BinningError::Store(format!(
                "store file {} has {} bytes, header declares {}",
                data_path.display(),
                actual,
                expected
            )));
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            data_path,
            header_path,
            dims,
            mmap: Some(mmap),
        })
    }

    pub fn exists(dir: &Path, name: &str) -> bool {
        let (data_path, header_path) = Self::paths(dir, name);
        data_path.exists() && header_path.exists()
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn paths(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        (
            dir.join(format!("{}.{}", name, STORE_FILE_SUFFIX)),
            dir.join(format!("{}.{}", name, STORE_HEADER_SUFFIX)),
        )
    }

    fn byte_offset(&self, row: usize, col: usize) -> usize {
        (row * self.dims.width + col) * self.dims.fields * VALUE_SIZE
    }

    fn mapped(&self) -> Result<&MmapMut> {
        self.mmap
            .as_ref()
            .ok_or_else(|| BinningError::Store(format!("{} is closed", self.data_path.display())))
    }
}

impl BinStore for MmapBinStore {
    fn dimensions(&self) -> StoreDimensions {
        self.dims
    }

    fn read(&self, row: usize, col: usize, values: &mut [f32]) -> Result<()> {
        self.dims.check(row, col, values.len())?;
        let offset = self.byte_offset(row, col);
        let bytes = &self.mapped()?[offset..offset + values.len() * VALUE_SIZE];
        for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(VALUE_SIZE)) {
            *value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    fn write(&mut self, row: usize, col: usize, values: &[f32]) -> Result<()> {
        self.dims.check(row, col, values.len())?;
        let offset = self.byte_offset(row, col);
        let Self {
            mmap, data_path, ..
        } = self;
        let mmap = mmap
            .as_mut()
            .ok_or_else(|| BinningError::Store(format!("{} is closed", data_path.display())))?;
        let bytes = &mut mmap[offset..offset + values.len() * VALUE_SIZE];
        for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(VALUE_SIZE)) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mmap) = self.mmap {
            mmap.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.mmap = None;
        Ok(())
    }

    fn delete(&mut self) -> Result<()> {
        self.mmap = None;
        for path in [&self.data_path, &self.header_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(store = %self.data_path.display(), "deleted bin store");
        Ok(())
    }
}

impl Drop for MmapBinStore {
    fn drop(&mut self) {
        if let Some(ref mmap) = self.mmap {
            let _ = mmap.flush();
        }
    }
}
