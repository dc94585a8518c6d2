use serde::{Deserialize, Serialize};

use crate::utils::coordinates::wrap_longitude_from;

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Cell address relative to the global grid. Signed so that positions left of or above
/// a window translate to negative local coordinates instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: i32,
    pub col: i32,
}

impl GridCell {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }
}

/// Axis-aligned lat/lon box. `lon_max` may exceed 180 for boxes that cross the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLonBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl LatLonBounds {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    pub fn global() -> Self {
        Self::new(-90.0, 90.0, -180.0, 180.0)
    }

    pub fn lat_span(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    pub fn is_global_in_longitude(&self) -> bool {
        self.lon_span() >= 360.0
    }

    /// Inclusive containment; longitudes are compared after wrapping from `lon_min`.
    pub fn contains(&self, pos: GeoPosition) -> bool {
        if pos.lat < self.lat_min || pos.lat > self.lat_max {
            return false;
        }
        if self.is_global_in_longitude() {
            return pos.lon.is_finite();
        }
        let lon = wrap_longitude_from(pos.lon, self.lon_min);
        lon <= self.lon_max
    }
}

/// Geographic footprint of a scene or of a cumulative product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorderPolygon {
    vertices: Vec<GeoPosition>,
    bounds: LatLonBounds,
    rectangular: bool,
}

impl BorderPolygon {
    /// Build a polygon from an ordered vertex ring. The ring is closed implicitly.
    pub fn new(vertices: Vec<GeoPosition>) -> Self {
        let bounds = Self::compute_bounds(&vertices);
        Self {
            vertices,
            bounds,
            rectangular: false,
        }
    }

    /// Rectangle with corners ordered (south-west, north-west, north-east, south-east)
    pub fn from_bounds(bounds: LatLonBounds) -> Self {
        let vertices = vec![
            GeoPosition::new(bounds.lat_min, bounds.lon_min),
            GeoPosition::new(bounds.lat_max, bounds.lon_min),
            GeoPosition::new(bounds.lat_max, bounds.lon_max),
            GeoPosition::new(bounds.lat_min, bounds.lon_max),
        ];
        Self {
            vertices,
            bounds,
            rectangular: true,
        }
    }

    pub fn global() -> Self {
        Self::from_bounds(LatLonBounds::global())
    }

    pub fn vertices(&self) -> &[GeoPosition] {
        &self.vertices
    }

    pub fn bounds(&self) -> LatLonBounds {
        self.bounds
    }

    pub fn contains(&self, pos: GeoPosition) -> bool {
        if !self.bounds.contains(pos) {
            return false;
        }
        if self.rectangular || self.vertices.len() < 3 {
            return self.rectangular;
        }

        // Even-odd rule in the plane of wrapped longitudes
        let x = wrap_longitude_from(pos.lon, self.bounds.lon_min);
        let y = pos.lat;
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.plane(i);
            let (xj, yj) = self.plane(j);
            if (yi > y) != (yj > y) {
                let x_cross = xi + (y - yi) * (xj - xi) / (yj - yi);
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn plane(&self, index: usize) -> (f64, f64) {
        let v = self.vertices[index];
        (wrap_longitude_from(v.lon, self.bounds.lon_min), v.lat)
    }

    fn compute_bounds(vertices: &[GeoPosition]) -> LatLonBounds {
        let mut bounds = LatLonBounds::new(f64::MAX, f64::MIN, f64::MAX, f64::MIN);
        for v in vertices {
            bounds.lat_min = bounds.lat_min.min(v.lat);
            bounds.lat_max = bounds.lat_max.max(v.lat);
            bounds.lon_min = bounds.lon_min.min(v.lon);
            bounds.lon_max = bounds.lon_max.max(v.lon);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = LatLonBounds::new(40.0, 60.0, -10.0, 10.0);
        assert!(bounds.contains(GeoPosition::new(50.0, 0.0)));
        assert!(bounds.contains(GeoPosition::new(60.0, 10.0)));
        assert!(!bounds.contains(GeoPosition::new(61.0, 0.0)));
        assert!(!bounds.contains(GeoPosition::new(50.0, 11.0)));
    }

    #[test]
    fn test_bounds_across_antimeridian() {
        let bounds = LatLonBounds::new(-10.0, 10.0, 170.0, 190.0);
        assert!(bounds.contains(GeoPosition::new(0.0, 175.0)));
        assert!(bounds.contains(GeoPosition::new(0.0, -175.0)));
        assert!(!bounds.contains(GeoPosition::new(0.0, -160.0)));
    }

    #[test]
    fn test_global_polygon_contains_everything() {
        let border = BorderPolygon::global();
        assert!(border.contains(GeoPosition::new(89.9, -180.0)));
        assert!(border.contains(GeoPosition::new(-90.0, 179.99)));
        assert!(!border.contains(GeoPosition::new(f64::NAN, 0.0)));
    }

    #[test]
    fn test_triangle_contains() {
        let border = BorderPolygon::new(vec![
            GeoPosition::new(0.0, 0.0),
            GeoPosition::new(10.0, 5.0),
            GeoPosition::new(0.0, 10.0),
        ]);
        assert!(border.contains(GeoPosition::new(2.0, 5.0)));
        assert!(!border.contains(GeoPosition::new(9.0, 1.0)));
        assert!(!border.contains(GeoPosition::new(-1.0, 5.0)));
    }
}
