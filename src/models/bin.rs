use crate::error::{BinningError, Result};

/// Accumulator record for one grid cell.
///
/// One flat `f32` buffer is split into per-band field groups at construction. Every access
/// names its band explicitly; field indices inside a band are the caller's contract and are
/// only guarded by slice indexing, so inner binning loops stay cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    values: Vec<f32>,
    offsets: Vec<usize>,
    fields_per_band: Vec<usize>,
}

impl Bin {
    pub fn new(fields_per_band: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(fields_per_band.len());
        let mut total = 0;
        for &fields in fields_per_band {
            offsets.push(total);
            total += fields;
        }

        Self {
            values: vec![0.0; total],
            offsets,
            fields_per_band: fields_per_band.to_vec(),
        }
    }

    pub fn num_bands(&self) -> usize {
        self.fields_per_band.len()
    }

    pub fn num_fields(&self) -> usize {
        self.values.len()
    }

    pub fn fields_per_band(&self) -> &[usize] {
        &self.fields_per_band
    }

    #[inline]
    pub fn read(&self, band: usize, field: usize) -> f32 {
        self.values[self.offsets[band] + field]
    }

    #[inline]
    pub fn write(&mut self, band: usize, field: usize, value: f32) {
        let offset = self.offsets[band];
        self.values[offset + field] = value;
    }

    /// Checked view of one band's fields
    pub fn band(&self, band: usize) -> Result<&[f32]> {
        let range = self.band_range(band)?;
        Ok(&self.values[range])
    }

    pub fn band_mut(&mut self, band: usize) -> Result<&mut [f32]> {
        let range = self.band_range(band)?;
        Ok(&mut self.values[range])
    }

    pub fn contains_data(&self) -> bool {
        self.values.iter().any(|&v| v != 0.0)
    }

    /// True if any field of `band` is non-zero
    pub fn band_contains_data(&self, band: usize) -> bool {
        let start = self.offsets[band];
        self.values[start..start + self.fields_per_band[band]]
            .iter()
            .any(|&v| v != 0.0)
    }

    pub fn clear(&mut self) {
        self.values.fill(0.0);
    }

    pub fn clear_band(&mut self, band: usize) {
        let start = self.offsets[band];
        let end = start + self.fields_per_band[band];
        self.values[start..end].fill(0.0);
    }

    pub fn load_from(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.values.len() {
            return Err(BinningError::LayoutMismatch {
                expected: self.values.len(),
                actual: data.len(),
            });
        }
        self.values.copy_from_slice(data);
        Ok(())
    }

    /// Copy the fields out, reusing `recycle` when it already has the right length
    pub fn save_to(&self, recycle: Option<Vec<f32>>) -> Vec<f32> {
        match recycle {
            Some(mut buffer) if buffer.len() == self.values.len() => {
                buffer.copy_from_slice(&self.values);
                buffer
            }
            _ => self.values.clone(),
        }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Copy one band's fields from another bin with the same layout
    pub fn copy_band_from(&mut self, other: &Bin, band: usize) {
        let start = self.offsets[band];
        let end = start + self.fields_per_band[band];
        self.values[start..end].copy_from_slice(&other.values[start..end]);
    }

    fn band_range(&self, band: usize) -> Result<std::ops::Range<usize>> {
        if band >= self.fields_per_band.len() {
            return Err(BinningError::BandOutOfRange {
                band,
                bands: self.fields_per_band.len(),
            });
        }
        let start = self.offsets[band];
        Ok(start..start + self.fields_per_band[band])
    }
}
