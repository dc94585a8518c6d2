pub mod geocoding;
pub mod scene;
pub mod scene_reader;

pub use geocoding::{AffineGeoCoding, GeoCoding, TiePointGeoCoding};
pub use scene::{PixelSource, RasterScene};
pub use scene_reader::SceneReader;
