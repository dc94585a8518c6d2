pub mod bin;
pub mod geo;
pub mod period;
pub mod window;

pub use bin::Bin;
pub use geo::{BorderPolygon, GeoPosition, GridCell, LatLonBounds};
pub use period::{DateRange, ObservationTime};
pub use window::Window;
