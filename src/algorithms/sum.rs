use crate::algorithms::{Algorithm, CombineTemporal};
use crate::models::Bin;

const SUM: usize = 0;

/// Plain sum of all samples, a single field
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Algorithm for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn accumulated_variable_count(&self) -> usize {
        1
    }

    fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize) {
        bin.write(band, SUM, bin.read(band, SUM) + value);
    }

    fn temporal_combine(&self) -> Option<&dyn CombineTemporal> {
        Some(self)
    }

    fn interpreted_variable_count(&self) -> usize {
        1
    }

    fn interpreted_variable_names(&self, band_name: &str) -> Vec<String> {
        vec![format!("{}_sum", band_name)]
    }

    fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]) {
        out[0] = bin.read(band, SUM);
    }
}

impl CombineTemporal for Sum {
    fn combine_temporal(&self, source: &Bin, target: &mut Bin, band: usize) {
        target.write(band, SUM, target.read(band, SUM) + source.read(band, SUM));
    }
}
