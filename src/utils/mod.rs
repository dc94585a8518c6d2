pub mod cancel;
pub mod constants;
pub mod coordinates;
pub mod progress;

pub use cancel::CancelFlag;
pub use constants::*;
pub use coordinates::{normalize_longitude, unwrap_longitude, wrap_longitude_from};
pub use progress::ProgressReporter;
