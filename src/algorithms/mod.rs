//! Per-band binning algorithms.
//!
//! An algorithm owns the layout of its band's fields inside a [`Bin`]: how samples are
//! accumulated spatially, how a finished spatial bin is combined into a temporal one, and how
//! accumulated fields are interpreted as output variables. The optional steps are exposed as
//! capabilities rather than no-op methods.

pub mod arithmetic_mean;
pub mod maximum_likelihood;
pub mod min_max;
pub mod sum;

pub use arithmetic_mean::ArithmeticMean;
pub use maximum_likelihood::MaximumLikelihood;
pub use min_max::MinMax;
pub use sum::Sum;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Bin;
use crate::utils::constants::DEFAULT_WEIGHT_COEFFICIENT;

pub trait Algorithm: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of fields this algorithm occupies in a bin
    fn accumulated_variable_count(&self) -> usize;

    fn accumulate_spatial(&self, value: f32, bin: &mut Bin, band: usize);

    /// Post-pass normalization applied once per bin after a spatial scan
    fn spatial_finish(&self) -> Option<&dyn FinishSpatial> {
        None
    }

    /// Merge step used when folding spatial bins into a temporal database
    fn temporal_combine(&self) -> Option<&dyn CombineTemporal> {
        None
    }

    fn interpreted_variable_count(&self) -> usize;

    fn interpreted_variable_names(&self, band_name: &str) -> Vec<String>;

    /// Write `interpreted_variable_count()` values for `band` into `out`
    fn interpret(&self, bin: &Bin, band: usize, out: &mut [f32]);
}

pub trait FinishSpatial {
    fn finish_spatial(&self, bin: &mut Bin, band: usize);
}

pub trait CombineTemporal {
    fn combine_temporal(&self, source: &Bin, target: &mut Bin, band: usize);
}

/// Algorithms selectable from a binning request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Sum,
    ArithmeticMean,
    MinMax,
    MaximumLikelihood,
}

impl AlgorithmKind {
    pub fn create(&self, weight_coefficient: f64) -> Box<dyn Algorithm> {
        match self {
            AlgorithmKind::Sum => Box::new(Sum),
            AlgorithmKind::ArithmeticMean => Box::new(ArithmeticMean::new(weight_coefficient)),
            AlgorithmKind::MinMax => Box::new(MinMax),
            AlgorithmKind::MaximumLikelihood => {
                Box::new(MaximumLikelihood::new(weight_coefficient))
            }
        }
    }
}

/// A scene band paired with the algorithm that bins it
pub struct BandDefinition {
    pub name: String,
    pub algorithm: Box<dyn Algorithm>,
}

impl BandDefinition {
    pub fn new(name: impl Into<String>, algorithm: Box<dyn Algorithm>) -> Self {
        Self {
            name: name.into(),
            algorithm,
        }
    }

    pub fn from_kind(name: impl Into<String>, kind: AlgorithmKind) -> Self {
        Self::new(name, kind.create(DEFAULT_WEIGHT_COEFFICIENT))
    }
}

impl fmt::Debug for BandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BandDefinition")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

/// Field layout of a bin holding every band's accumulated variables
pub fn fields_per_band(bands: &[BandDefinition]) -> Vec<usize> {
    bands
        .iter()
        .map(|b| b.algorithm.accumulated_variable_count())
        .collect()
}

/// Output variable names of all bands, in band order
pub fn interpreted_variable_names(bands: &[BandDefinition]) -> Vec<String> {
    bands
        .iter()
        .flat_map(|b| b.algorithm.interpreted_variable_names(&b.name))
        .collect()
}

/// Weight of `count` samples under a weight coefficient, `count^coefficient`
pub(crate) fn sample_weight(count: f32, coefficient: f64) -> f32 {
    (count as f64).powf(coefficient) as f32
}
