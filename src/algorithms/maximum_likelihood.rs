use crate::algorithms::{sample_weight, Algorithm, CombineTemporal, FinishSpatial};
use crate::models::Bin;

const SUM_LN: usize = 0;
const SUM_LN_SQ: usize = 1;
const WEIGHT: usize = 2;

/// Log-normal maximum likelihood estimator.
///
/// Samples are accumulated in log space; non-positive samples cannot be represented and are
/// ignored.
#[derive(Debug, Clone, Copy)]
pub struct MaximumLikelihood {
    weight_coefficient: f64,
}

impl MaximumLikelihood {
    pub fn new(weight_coefficient: f64) -> Self {
        Self { weight_coefficient }
    }
}

impl Algorithm for MaximumLikelihood {
    fn name(&self) -> &'static str {
        "maximum_likelihood"
    }

    fn accumulated_variable_count(&self) -> usize {
        3
    }

    fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize) {
        if !(value > 0.0) || !value.is_finite() {
            return;
        }
        let ln = value.ln();
        bin.write(band, SUM_LN, bin.read(band, SUM_LN) + ln);
        bin.write(band, SUM_LN_SQ, bin.read(band, SUM_LN_SQ) + ln * ln);
        bin.write(band, WEIGHT, bin.read(band, WEIGHT) + 1.0);
    }

    fn spatial_finish(&self) -> Option<&dyn FinishSpatial> {
        Some(self)
    }

    fn temporal_combine(&self) -> Option<&dyn CombineTemporal> {
        Some(self)
    }

    fn interpreted_variable_count(&self) -> usize {
        4
    }

    fn interpreted_variable_names(&self, band_name: &str) -> Vec<String> {
        ["mean", "sigma", "median", "mode"]
            .iter()
            .map(|suffix| format!("{}_{}", band_name, suffix))
            .collect()
    }

    fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]) {
        let weight = bin.read(band, WEIGHT);
        if weight <= 0.0 {
            out[..4].fill(f32::NAN);
            return;
        }
        let mu = (bin.read(band, SUM_LN) / weight) as f64;
        let variance = ((bin.read(band, SUM_LN_SQ) / weight) as f64 - mu * mu).max(0.0);

        let mean = (mu + 0.5 * variance).exp();
        out[0] = mean as f32;
        out[1] = (mean * (variance.exp() - 1.0).sqrt()) as f32;
        out[2] = mu.exp() as f32;
        out[3] = (mu - variance).exp() as f32;
    }
}

impl FinishSpatial for MaximumLikelihood {
    fn finish_spatial(&self, bin: &mut Bin, band: usize) {
        let count = bin.read(band, WEIGHT);
        if count <= 0.0 {
            return;
        }
        let weight = sample_weight(count, self.weight_coefficient);
        let scale = weight / count;
        bin.write(band, SUM_LN, bin.read(band, SUM_LN) * scale);
        bin.write(band, SUM_LN_SQ, bin.read(band, SUM_LN_SQ) * scale);
        bin.write(band, WEIGHT, weight);
    }
}

impl CombineTemporal for MaximumLikelihood {
    fn combine_temporal(&self, source: &Bin, target: &mut Bin, band: usize) {
        for field in [SUM_LN, SUM_LN_SQ, WEIGHT] {
            target.write(band, field, target.read(band, field) + source.read(band, field));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_samples() {
        let algo = MaximumLikelihood::new(0.5);
        let mut bin = Bin::new(&[3]);
        for _ in 0..4 {
            algo.accumulate_spatial(2.0, &mut bin, 0);
        }
        algo.finish_spatial(&mut bin, 0);

        let mut out = [0.0; 4];
        algo.interpret(&bin, 0, &mut out);
        for v in [out[0], out[2], out[3]] {
            assert!((v - 2.0).abs() < 1e-4, "{:?}", out);
        }
        assert!(out[1].abs() < 1e-3);
    }

    #[test]
    fn test_non_positive_samples_ignored() {
        let algo = MaximumLikelihood::new(0.5);
        let mut bin = Bin::new(&[3]);
        algo.accumulate_spatial(0.0, &mut bin, 0);
        algo.accumulate_spatial(-3.0, &mut bin, 0);
        algo.accumulate_spatial(f32::NAN, &mut bin, 0);
        assert!(!bin.contains_data());

        let mut out = [0.0; 4];
        algo.interpret(&bin, 0, &mut out);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_names() {
        let algo = MaximumLikelihood::new(0.5);
        assert_eq!(
            algo.interpreted_variable_names("chl"),
            vec!["chl_mean", "chl_sigma", "chl_median", "chl_mode"]
        );
    }
}
