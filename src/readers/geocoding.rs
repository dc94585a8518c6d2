use crate::models::GeoPosition;
use crate::utils::coordinates::{normalize_longitude, unwrap_longitude};

/// Pixel-to-geographic mapping of a scene.
///
/// Pixel coordinates are continuous: (0, 0) is the top-left corner of the first pixel and
/// pixel centres sit at +0.5.
pub trait GeoCoding: Send + Sync {
    fn geo_position(&self, x: f64, y: f64) -> Option<GeoPosition>;
}

/// Geo-coding of a regular lat/lon raster
#[derive(Debug, Clone, Copy)]
pub struct AffineGeoCoding {
    /// Latitude of the top edge
    pub lat_origin: f64,
    /// Longitude of the left edge
    pub lon_origin: f64,
    /// Degrees per pixel southwards
    pub lat_step: f64,
    /// Degrees per pixel eastwards
    pub lon_step: f64,
}

impl AffineGeoCoding {
    pub fn new(lat_origin: f64, lon_origin: f64, lat_step: f64, lon_step: f64) -> Self {
        Self {
            lat_origin,
            lon_origin,
            lat_step,
            lon_step,
        }
    }
}

impl GeoCoding for AffineGeoCoding {
    fn geo_position(&self, x: f64, y: f64) -> Option<GeoPosition> {
        let lat = self.lat_origin - y * self.lat_step;
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(GeoPosition::new(
            lat,
            normalize_longitude(self.lon_origin + x * self.lon_step),
        ))
    }
}

/// Geo-coding from per-pixel centre positions.
///
/// Positions between centres are interpolated bilinearly; positions beyond the outer centres
/// (pixel corners on the scene edge) are extrapolated from the outermost pixel pair.
#[derive(Debug, Clone)]
pub struct TiePointGeoCoding {
    width: usize,
    height: usize,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl TiePointGeoCoding {
    /// `lats`/`lons` are row-major, `width × height`; NaN marks an unknown position
    pub fn new(width: usize, height: usize, lats: Vec<f64>, lons: Vec<f64>) -> Option<Self> {
        if width == 0 || height == 0 || lats.len() != width * height || lons.len() != lats.len()
        {
            return None;
        }
        Some(Self {
            width,
            height,
            lats,
            lons,
        })
    }

    fn interpolation_cell(coord: f64, size: usize) -> (usize, usize, f64) {
        if size == 1 {
            return (0, 0, 0.0);
        }
        let centre = coord - 0.5;
        let lower = centre.floor().clamp(0.0, (size - 2) as f64);
        (lower as usize, lower as usize + 1, centre - lower)
    }

    fn at(&self, row: usize, col: usize) -> (f64, f64) {
        let index = row * self.width + col;
        (self.lats[index], self.lons[index])
    }
}

impl GeoCoding for TiePointGeoCoding {
    fn geo_position(&self, x: f64, y: f64) -> Option<GeoPosition> {
        let (c0, c1, tx) = Self::interpolation_cell(x, self.width);
        let (r0, r1, ty) = Self::interpolation_cell(y, self.height);

        let (lat00, lon00) = self.at(r0, c0);
        let (lat01, lon01) = self.at(r0, c1);
        let (lat10, lon10) = self.at(r1, c0);
        let (lat11, lon11) = self.at(r1, c1);

        let lon01 = unwrap_longitude(lon01, lon00);
        let lon10 = unwrap_longitude(lon10, lon00);
        let lon11 = unwrap_longitude(lon11, lon00);

        let bilinear = |v00: f64, v01: f64, v10: f64, v11: f64| {
            let top = v00 + (v01 - v00) * tx;
            let bottom = v10 + (v11 - v10) * tx;
            top + (bottom - top) * ty
        };

        let lat = bilinear(lat00, lat01, lat10, lat11);
        let lon = bilinear(lon00, lon01, lon10, lon11);
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }

        Some(GeoPosition::new(
            lat.clamp(-90.0, 90.0),
            normalize_longitude(lon),
        ))
    }
}
