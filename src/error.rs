use thiserror::Error;

pub type Result<T> = std::result::Result<T, BinningError>;

#[derive(Error, Debug)]
pub enum BinningError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Product '{0}' has no geo-coding, pixels cannot be placed on the grid")]
    MissingGeoCoding(String),

    #[error("Invalid grid cell size: {0} (must be positive)")]
    InvalidCellSize(f64),

    #[error("Band index {band} out of range (bin declares {bands} bands)")]
    BandOutOfRange { band: usize, bands: usize },

    #[error("Bin layout mismatch: expected {expected} fields, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("Bin store error: {0}")]
    Store(String),

    #[error("Bin store '{0}' not found")]
    StoreNotFound(String),

    #[error("Database '{0}' has no store, call create_store or open_store first")]
    StoreNotCreated(String),

    #[error("Database '{0}' covers no grid cells")]
    EmptyWindow(String),

    #[error("Invalid database state: {0}")]
    InvalidState(String),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing cancelled by user")]
    Cancelled,
}
