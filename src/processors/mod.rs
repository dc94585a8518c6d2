pub mod batch;
pub mod clipping;
pub mod clipping_resampler;
pub mod spatial_binner;
pub mod temporal_merger;

pub use batch::{BatchProcessor, BatchReport, SceneOutcome};
pub use spatial_binner::{BinningSummary, ResamplingMode, RunStatus, SpatialBinner};
pub use temporal_merger::{scan_borders, MergeSummary, TemporalMerger};
