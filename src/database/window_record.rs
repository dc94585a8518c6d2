use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::Result;
use crate::models::Window;

/// Persist the window side-record (`rowMin`, `rowMax`, `colMin`, `colMax`)
pub fn write_window_record(path: &Path, window: &Window) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(window)?)?;
    Ok(())
}

/// Read a window side-record, `None` if it was never written
pub fn read_window_record(path: &Path) -> Result<Option<Window>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn remove_window_record(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
