use crate::algorithms::{sample_weight, Algorithm, CombineTemporal, FinishSpatial};
use crate::models::Bin;

const SUM: usize = 0;
const SUM_SQ: usize = 1;
/// Sample count during the spatial scan, scene weight once finished
const WEIGHT: usize = 2;

/// Weighted arithmetic mean and standard deviation.
///
/// Each finished spatial bin carries a weight of `count^c`; the temporal mean is the
/// weight-averaged mean of the contributing scenes.
#[derive(Debug, Clone, Copy)]
pub struct ArithmeticMean {
    weight_coefficient: f64,
}

impl ArithmeticMean {
    pub fn new(weight_coefficient: f64) -> Self {
        Self { weight_coefficient }
    }
}

impl Algorithm for ArithmeticMean {
    fn name(&self) -> &'static str {
        "arithmetic_mean"
    }

    fn accumulated_variable_count(&self) -> usize {
        3
    }

    fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize) {
        bin.write(band, SUM, bin.read(band, SUM) + value);
        bin.write(band, SUM_SQ, bin.read(band, SUM_SQ) + value * value);
        bin.write(band, WEIGHT, bin.read(band, WEIGHT) + 1.0);
    }

    fn spatial_finish(&self) -> Option<&dyn FinishSpatial> {
        Some(self)
    }

    fn temporal_combine(&self) -> Option<&dyn CombineTemporal> {
        Some(self)
    }

    fn interpreted_variable_count(&self) -> usize {
        2
    }

    fn interpreted_variable_names(&self, band_name: &str) -> Vec<String> {
        vec![format!("{}_mean", band_name), format!("{}_sigma", band_name)]
    }

    fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]) {
        let weight = bin.read(band, WEIGHT);
        if weight <= 0.0 {
            out[0] = f32::NAN;
            out[1] = f32::NAN;
            return;
        }
        let mean = bin.read(band, SUM) / weight;
        let variance = bin.read(band, SUM_SQ) / weight - mean * mean;
        out[0] = mean;
        out[1] = variance.max(0.0).sqrt();
    }
}

impl FinishSpatial for ArithmeticMean {
    fn finish_spatial(&self, bin: &mut Bin, band: usize) {
        let count = bin.read(band, WEIGHT);
        if count <= 0.0 {
            return;
        }
        let weight = sample_weight(count, self.weight_coefficient);
        let scale = weight / count;
        bin.write(band, SUM, bin.read(band, SUM) * scale);
        bin.write(band, SUM_SQ, bin.read(band, SUM_SQ) * scale);
        bin.write(band, WEIGHT, weight);
    }
}

impl CombineTemporal for ArithmeticMean {
    fn combine_temporal(&self, source: &Bin, target: &mut Bin, band: usize) {
        for field in [SUM, SUM_SQ, WEIGHT] {
            target.write(band, field, target.read(band, field) + source.read(band, field));
        }
    }
}
