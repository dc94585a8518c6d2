/// Mean equatorial Earth radius used by the equal-area grid, in kilometres
pub const EARTH_RADIUS_KM: f64 = 6378.145;

/// Clipping resampler coverage scale (permille of a cell)
pub const PERMILLE: f32 = 1000.0;
pub const HALF_PERMILLE: f32 = 500.0;

/// Scratch fields per band used by the clipping resampler
pub const RESAMPLING_FIELDS_PER_BAND: usize = 2;
pub const RESAMPLING_VALUE: usize = 0;
pub const RESAMPLING_COVERAGE: usize = 1;

/// Grid edges closer than this to ±180° trigger longitude unwrapping in the resampler.
/// Heuristic kept for compatibility, it does not make the clip topology-aware.
pub const ANTIMERIDIAN_MARGIN_DEG: f64 = 10.0;

/// File name suffixes inside a database directory
pub const STORE_FILE_SUFFIX: &str = "bins";
pub const STORE_HEADER_SUFFIX: &str = "bins.json";
pub const WINDOW_RECORD_SUFFIX: &str = "window.json";

/// Binning defaults
pub const DEFAULT_WEIGHT_COEFFICIENT: f64 = 0.5;
pub const DEFAULT_CELLS_PER_DEGREE: f64 = 12.0;
pub const DEFAULT_CELL_SIZE_KM: f64 = 9.28;

/// Environment prefix for request overrides (e.g. L3BIN__DATABASE_DIR)
pub const ENV_PREFIX: &str = "L3BIN";
