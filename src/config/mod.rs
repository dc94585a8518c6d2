//! Binning request: grid, resampling mode, bands, region, date range and storage, loaded
//! from a TOML file with `L3BIN__*` environment overrides.

use ::config::{Config, Environment, File, FileFormat};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::algorithms::{AlgorithmKind, BandDefinition};
use crate::error::{BinningError, Result};
use crate::grid::{EqualAreaGrid, GridLocator, LatLonGrid};
use crate::models::{BorderPolygon, DateRange, GeoPosition, LatLonBounds};
use crate::processors::ResamplingMode;
use crate::store::StorageLocation;
use crate::utils::coordinates::validate_lat_lon;
use crate::utils::constants::{
    DEFAULT_CELLS_PER_DEGREE, DEFAULT_CELL_SIZE_KM, DEFAULT_WEIGHT_COEFFICIENT, ENV_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridConfig {
    Regular {
        #[serde(default = "default_cells_per_degree")]
        cells_per_degree: f64,
        #[serde(default)]
        bounds: Option<BoundsConfig>,
    },
    EqualArea {
        #[serde(default = "default_cell_size_km")]
        cell_size_km: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct BoundsConfig {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_min: f64,

    #[validate(range(min = -90.0, max = 90.0))]
    pub lat_max: f64,

    #[validate(range(min = -180.0, max = 360.0))]
    pub lon_min: f64,

    #[validate(range(min = -180.0, max = 360.0))]
    pub lon_max: f64,
}

impl From<BoundsConfig> for LatLonBounds {
    fn from(b: BoundsConfig) -> Self {
        LatLonBounds::new(b.lat_min, b.lat_max, b.lon_min, b.lon_max)
    }
}

/// Region of interest: either a lat/lon box or a polygon ring of `{ lat, lon }` vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionConfig {
    Polygon { vertices: Vec<GeoPosition> },
    Bounds(BoundsConfig),
}

impl RegionConfig {
    fn check(&self) -> Result<()> {
        match self {
            RegionConfig::Bounds(bounds) => bounds.validate()?,
            RegionConfig::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(BinningError::Config(format!(
                        "region polygon needs at least 3 vertices, got {}",
                        vertices.len()
                    )));
                }
                for v in vertices {
                    validate_lat_lon(v.lat, v.lon)?;
                }
            }
        }
        Ok(())
    }

    pub fn border(&self) -> BorderPolygon {
        match self {
            RegionConfig::Bounds(bounds) => BorderPolygon::from_bounds((*bounds).into()),
            RegionConfig::Polygon { vertices } => BorderPolygon::new(vertices.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BandConfig {
    #[validate(length(min = 1))]
    pub name: String,

    pub algorithm: AlgorithmKind,

    #[serde(default = "default_weight_coefficient")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub weight_coefficient: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BinningConfig {
    pub grid: GridConfig,

    #[serde(default)]
    pub resampling: ResamplingMode,

    #[validate(length(min = 1), nested)]
    pub bands: Vec<BandConfig>,

    /// Region of interest; pixels outside are ignored
    #[serde(default)]
    pub region: Option<RegionConfig>,

    /// First day (UTC) of the product period; earlier scenes are skipped
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last day (UTC) of the product period, inclusive
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,

    /// Name of the temporal database inside `database_dir`
    #[serde(default = "default_database_name")]
    #[validate(length(min = 1))]
    pub database_name: String,

    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_workers: Option<usize>,
}

fn default_cells_per_degree() -> f64 {
    DEFAULT_CELLS_PER_DEGREE
}

fn default_cell_size_km() -> f64 {
    DEFAULT_CELL_SIZE_KM
}

fn default_weight_coefficient() -> f64 {
    DEFAULT_WEIGHT_COEFFICIENT
}

fn default_database_dir() -> PathBuf {
    PathBuf::from("bins")
}

fn default_database_name() -> String {
    "l3_temporal".to_string()
}

impl BinningConfig {
    /// Load a request file, applying environment overrides such as `L3BIN__DATABASE_DIR`
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        let request: BinningConfig = settings.try_deserialize()?;
        request.check()?;
        debug!(path = %path.display(), bands = request.bands.len(), "loaded binning request");
        Ok(request)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let request: BinningConfig = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        request.check()?;
        Ok(request)
    }

    /// Field validation plus the grid, region, date and band checks the derive cannot express
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if let Some(region) = &self.region {
            region.check()?;
        }
        self.date_range()?;

        match &self.grid {
            GridConfig::Regular {
                cells_per_degree,
                bounds,
            } => {
                if !(*cells_per_degree > 0.0) {
                    return Err(BinningError::InvalidCellSize(*cells_per_degree));
                }
                if let Some(bounds) = bounds {
                    bounds.validate()?;
                }
            }
            GridConfig::EqualArea { cell_size_km } => {
                if !(*cell_size_km > 0.0) {
                    return Err(BinningError::InvalidCellSize(*cell_size_km));
                }
            }
        }

        let mut seen = HashSet::new();
        for band in &self.bands {
            if !seen.insert(band.name.as_str()) {
                return Err(BinningError::Config(format!(
                    "band '{}' is listed more than once",
                    band.name
                )));
            }
        }

        if self.resampling == ResamplingMode::Clipping
            && matches!(self.grid, GridConfig::EqualArea { .. })
        {
            return Err(BinningError::Config(
                "clipping resampling needs a regular lat/lon grid".to_string(),
            ));
        }
        Ok(())
    }

    pub fn build_locator(&self) -> Result<Arc<dyn GridLocator>> {
        match &self.grid {
            GridConfig::Regular {
                cells_per_degree,
                bounds,
            } => {
                let bounds = bounds.map(LatLonBounds::from).unwrap_or_else(LatLonBounds::global);
                Ok(Arc::new(LatLonGrid::new(*cells_per_degree, bounds)?))
            }
            GridConfig::EqualArea { cell_size_km } => {
                Ok(Arc::new(EqualAreaGrid::new(*cell_size_km)?))
            }
        }
    }

    /// Region border, the whole globe when no region is configured
    pub fn border(&self) -> BorderPolygon {
        self.region
            .as_ref()
            .map(RegionConfig::border)
            .unwrap_or_else(BorderPolygon::global)
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.start_date, self.end_date)
    }

    pub fn band_definitions(&self) -> Vec<BandDefinition> {
        self.bands
            .iter()
            .map(|b| BandDefinition::new(&b.name, b.algorithm.create(b.weight_coefficient)))
            .collect()
    }

    pub fn storage_location(&self) -> StorageLocation {
        StorageLocation::directory(&self.database_dir)
    }

    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REQUEST: &str = r#"
        resampling = "clipping"
        database_dir = "/tmp/l3"
        max_workers = 2

        [grid]
        kind = "regular"
        cells_per_degree = 4.0

        [grid.bounds]
        lat_min = -10.0
        lat_max = 10.0
        lon_min = 100.0
        lon_max = 140.0

        [[bands]]
        name = "chl"
        algorithm = "arithmetic_mean"
        weight_coefficient = 1.0

        [[bands]]
        name = "sst"
        algorithm = "min_max"
    "#;

    #[test]
    fn test_parse_request() {
        let request = BinningConfig::from_toml_str(REQUEST).unwrap();
        assert_eq!(request.resampling, ResamplingMode::Clipping);
        assert_eq!(request.database_dir, PathBuf::from("/tmp/l3"));
        assert_eq!(request.database_name, "l3_temporal");
        assert_eq!(request.workers(), 2);
        assert_eq!(request.bands[1].weight_coefficient, DEFAULT_WEIGHT_COEFFICIENT);

        let locator = request.build_locator().unwrap();
        assert_eq!((locator.width(), locator.height()), (160, 80));

        let bands = request.band_definitions();
        assert_eq!(bands[0].algorithm.name(), "arithmetic_mean");
        assert_eq!(bands[1].algorithm.name(), "min_max");
        assert_eq!(request.border(), BorderPolygon::global());
    }

    #[test]
    fn test_equal_area_defaults() {
        let request = BinningConfig::from_toml_str(
            r#"
            [grid]
            kind = "equal_area"

            [[bands]]
            name = "chl"
            algorithm = "sum"
            "#,
        )
        .unwrap();
        assert_eq!(
            request.grid,
            GridConfig::EqualArea {
                cell_size_km: DEFAULT_CELL_SIZE_KM
            }
        );
        assert_eq!(request.resampling, ResamplingMode::Point);
        assert_eq!(request.build_locator().unwrap().height(), 2160);
    }

    #[test]
    fn test_region_border() {
        let request = BinningConfig::from_toml_str(
            r#"
            [grid]
            kind = "regular"

            [region]
            lat_min = 40.0
            lat_max = 50.0
            lon_min = -10.0
            lon_max = 5.0

            [[bands]]
            name = "chl"
            algorithm = "sum"
            "#,
        )
        .unwrap();
        let border = request.border();
        assert_eq!(border.bounds(), LatLonBounds::new(40.0, 50.0, -10.0, 5.0));
        assert!(request.date_range().unwrap().is_unbounded());
    }

    #[test]
    fn test_polygon_region_and_dates() {
        let request = BinningConfig::from_toml_str(
            r#"
            start_date = "2024-03-01"
            end_date = "2024-03-31"

            [grid]
            kind = "regular"

            [region]
            vertices = [
                { lat = 0.0, lon = 0.0 },
                { lat = 10.0, lon = 0.0 },
                { lat = 0.0, lon = 10.0 },
            ]

            [[bands]]
            name = "chl"
            algorithm = "sum"
            "#,
        )
        .unwrap();

        let border = request.border();
        assert_eq!(border.vertices().len(), 3);
        assert!(border.contains(GeoPosition::new(2.0, 2.0)));
        assert!(!border.contains(GeoPosition::new(8.0, 8.0)));

        let range = request.date_range().unwrap();
        assert_eq!(range.start(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(range.end(), NaiveDate::from_ymd_opt(2024, 3, 31));
    }

    #[test]
    fn test_invalid_requests() {
        let no_bands = r#"
            bands = []
            [grid]
            kind = "regular"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(no_bands),
            Err(BinningError::Validation(_))
        ));

        let bad_weight = r#"
            [grid]
            kind = "regular"
            [[bands]]
            name = "chl"
            algorithm = "arithmetic_mean"
            weight_coefficient = 2.0
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(bad_weight),
            Err(BinningError::Validation(_))
        ));

        let zero_cells = r#"
            [grid]
            kind = "equal_area"
            cell_size_km = 0.0
            [[bands]]
            name = "chl"
            algorithm = "sum"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(zero_cells),
            Err(BinningError::InvalidCellSize(_))
        ));

        let duplicate = r#"
            [grid]
            kind = "regular"
            [[bands]]
            name = "chl"
            algorithm = "sum"
            [[bands]]
            name = "chl"
            algorithm = "min_max"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(duplicate),
            Err(BinningError::Config(_))
        ));

        let reversed_dates = r#"
            start_date = "2024-03-02"
            end_date = "2024-03-01"
            [grid]
            kind = "regular"
            [[bands]]
            name = "chl"
            algorithm = "sum"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(reversed_dates),
            Err(BinningError::Config(_))
        ));

        let degenerate_region = r#"
            [grid]
            kind = "regular"
            [region]
            vertices = [{ lat = 0.0, lon = 0.0 }, { lat = 1.0, lon = 1.0 }]
            [[bands]]
            name = "chl"
            algorithm = "sum"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(degenerate_region),
            Err(BinningError::Config(_))
        ));

        let bad_bounds = r#"
            [grid]
            kind = "regular"
            [region]
            lat_min = -95.0
            lat_max = 10.0
            lon_min = 0.0
            lon_max = 10.0
            [[bands]]
            name = "chl"
            algorithm = "sum"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(bad_bounds),
            Err(BinningError::Validation(_))
        ));

        let clipping_equal_area = r#"
            resampling = "clipping"
            [grid]
            kind = "equal_area"
            [[bands]]
            name = "chl"
            algorithm = "sum"
        "#;
        assert!(matches!(
            BinningConfig::from_toml_str(clipping_equal_area),
            Err(BinningError::Config(_))
        ));
    }
}
