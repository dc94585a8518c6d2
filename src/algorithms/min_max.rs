use crate::algorithms::{Algorithm, CombineTemporal};
use crate::models::Bin;

const MIN: usize = 0;
const MAX: usize = 1;
const COUNT: usize = 2;

/// Minimum and maximum of all samples
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMax;

impl Algorithm for MinMax {
    fn name(&self) -> &'static str {
        "min_max"
    }

    fn accumulated_variable_count(&self) -> usize {
        3
    }

    fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize) {
        let count = bin.read(band, COUNT);
        if count == 0.0 {
            bin.write(band, MIN, value);
            bin.write(band, MAX, value);
        } else {
            bin.write(band, MIN, bin.read(band, MIN).min(value));
            bin.write(band, MAX, bin.read(band, MAX).max(value));
        }
        bin.write(band, COUNT, count + 1.0);
    }

    fn temporal_combine(&self) -> Option<&dyn CombineTemporal> {
        Some(self)
    }

    fn interpreted_variable_count(&self) -> usize {
        2
    }

    fn interpreted_variable_names(&self, band_name: &str) -> Vec<String> {
        vec![format!("{}_min", band_name), format!("{}_max", band_name)]
    }

    fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]) {
        if bin.read(band, COUNT) == 0.0 {
            out[0] = f32::NAN;
            out[1] = f32::NAN;
        } else {
            out[0] = bin.read(band, MIN);
            out[1] = bin.read(band, MAX);
        }
    }
}

impl CombineTemporal for MinMax {
    fn combine_temporal(&self, source: &Bin, target: &mut Bin, band: usize) {
        let source_count = source.read(band, COUNT);
        if source_count == 0.0 {
            return;
        }
        let target_count = target.read(band, COUNT);
        if target_count == 0.0 {
            target.copy_band_from(source, band);
            return;
        }
        target.write(band, MIN, target.read(band, MIN).min(source.read(band, MIN)));
        target.write(band, MAX, target.read(band, MAX).max(source.read(band, MAX)));
        target.write(band, COUNT, target_count + source_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_tracks_extremes() {
        let mut bin = Bin::new(&[3]);
        for v in [3.0, -1.0, 8.0, 0.0] {
            MinMax.accumulate_spatial(v, &mut bin, 0);
        }
        let mut out = [0.0; 2];
        MinMax.interpret(&bin, 0, &mut out);
        assert_eq!(out, [-1.0, 8.0]);
    }

    #[test]
    fn test_zero_sample_still_counts_as_data() {
        let mut bin = Bin::new(&[3]);
        MinMax.accumulate_spatial(0.0, &mut bin, 0);
        assert!(bin.contains_data());
    }

    #[test]
    fn test_combine_into_empty_target_copies() {
        let mut source = Bin::new(&[3]);
        MinMax.accumulate_spatial(5.0, &mut source, 0);
        MinMax.accumulate_spatial(7.0, &mut source, 0);

        let mut target = Bin::new(&[3]);
        MinMax.combine_temporal(&source, &mut target, 0);
        assert_eq!(target, source);

        let mut other = Bin::new(&[3]);
        MinMax.accumulate_spatial(2.0, &mut other, 0);
        MinMax.combine_temporal(&other, &mut target, 0);
        let mut out = [0.0; 2];
        MinMax.interpret(&target, 0, &mut out);
        assert_eq!(out, [2.0, 7.0]);
        assert_eq!(target.read(0, COUNT), 3.0);
    }
}
