use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::algorithms::{interpreted_variable_names, BandDefinition};
use crate::database::BinDatabase;
use crate::error::{BinningError, Result};
use crate::models::GridCell;

/// Writes the interpreted bins of a database as a CSV table.
///
/// One record per bin holding data: `row,col,index,lat,lon` followed by every band's
/// interpreted variables.
pub struct BinTableWriter {
    delimiter: u8,
    precision: usize,
}

impl BinTableWriter {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            precision: 6,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Write the table to `path`, returning the number of bins written
    pub fn write_database(
        &self,
        db: &BinDatabase,
        bands: &[BandDefinition],
        path: &Path,
    ) -> Result<usize> {
        let file = File::create(path)?;
        self.write_to(db, bands, file)
    }

    pub fn write_to<W: Write>(
        &self,
        db: &BinDatabase,
        bands: &[BandDefinition],
        out: W,
    ) -> Result<usize> {
        let layout: Vec<usize> = bands
            .iter()
            .map(|b| b.algorithm.accumulated_variable_count())
            .collect();
        if layout.as_slice() != db.fields_per_band() {
            return Err(BinningError::LayoutMismatch {
                expected: layout.iter().sum(),
                actual: db.fields_per_band().iter().sum(),
            });
        }

        let mut writer = WriterBuilder::new().delimiter(self.delimiter).from_writer(out);
        let mut header = vec![
            "row".to_string(),
            "col".to_string(),
            "index".to_string(),
            "lat".to_string(),
            "lon".to_string(),
        ];
        header.extend(interpreted_variable_names(bands));
        writer.write_record(&header)?;

        let locator = db.locator().clone();
        let window = db.window();
        let mut bin = db.create_bin();
        let mut record = Vec::with_capacity(header.len());
        let mut values = Vec::new();
        let mut count = 0;

        for row in window.rows() {
            for col in window.cols() {
                let cell = GridCell::new(row, col);
                if !locator.is_valid(cell) {
                    continue;
                }
                db.read(cell, &mut bin)?;
                if !bin.contains_data() {
                    continue;
                }

                let pos = locator.cell_to_position(cell);
                record.clear();
                record.push(row.to_string());
                record.push(col.to_string());
                record.push(locator.cell_to_index(cell).to_string());
                record.push(format!("{:.4}", pos.lat));
                record.push(format!("{:.4}", pos.lon));
                for (band, def) in bands.iter().enumerate() {
                    values.clear();
                    values.resize(def.algorithm.interpreted_variable_count(), 0.0f32);
                    def.algorithm.interpret(&bin, band, &mut values);
                    record.extend(values.iter().map(|v| format!("{:.*}", self.precision, v)));
                }
                writer.write_record(&record)?;
                count += 1;
            }
        }

        writer.flush()?;
        Ok(count)
    }
}

impl Default for BinTableWriter {
    fn default() -> Self {
        Self::new()
    }
}
