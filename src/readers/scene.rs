use crate::error::{BinningError, Result};
use crate::models::ObservationTime;
use crate::readers::GeoCoding;

/// Scanline access to a swath product.
///
/// Samples are read one band and one scanline at a time; validity masks are optional.
pub trait PixelSource: Send + Sync {
    fn name(&self) -> &str;

    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn band_index(&self, band_name: &str) -> Option<usize>;

    fn read_line(&self, band: usize, line: usize, values: &mut [f32]) -> Result<()>;

    /// Fill `valid` for one scanline. Returns `false` when the band has no mask, in which
    /// case every pixel counts as valid and `valid` is left untouched.
    fn read_valid_mask(&self, band: usize, line: usize, valid: &mut [bool]) -> Result<bool>;

    fn geo_coding(&self) -> Option<&dyn GeoCoding>;

    /// When the scene was observed, if known
    fn observation_time(&self) -> Option<ObservationTime> {
        None
    }
}

struct SceneBand {
    name: String,
    values: Vec<f32>,
    valid: Option<Vec<bool>>,
}

/// In-memory swath product
pub struct RasterScene {
    name: String,
    width: usize,
    height: usize,
    bands: Vec<SceneBand>,
    geo_coding: Option<Box<dyn GeoCoding>>,
    observation_time: Option<ObservationTime>,
}

impl RasterScene {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            bands: Vec::new(),
            geo_coding: None,
            observation_time: None,
        }
    }

    pub fn with_band(mut self, name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        let name = name.into();
        self.check_len(&name, values.len())?;
        self.bands.push(SceneBand {
            name,
            values,
            valid: None,
        });
        Ok(self)
    }

    pub fn with_valid_mask(mut self, band_name: &str, valid: Vec<bool>) -> Result<Self> {
        self.check_len(band_name, valid.len())?;
        let band = self
            .bands
            .iter_mut()
            .find(|b| b.name == band_name)
            .ok_or_else(|| BinningError::MissingData(format!("band '{}'", band_name)))?;
        band.valid = Some(valid);
        Ok(self)
    }

    pub fn with_geo_coding(mut self, geo_coding: Box<dyn GeoCoding>) -> Self {
        self.geo_coding = Some(geo_coding);
        self
    }

    pub fn with_observation_time(mut self, time: ObservationTime) -> Self {
        self.observation_time = Some(time);
        self
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    fn check_len(&self, band: &str, len: usize) -> Result<()> {
        if len != self.width * self.height {
            return Err(BinningError::InvalidFormat(format!(
                "band '{}' of '{}' has {} samples, expected {}x{}",
                band, self.name, len, self.width, self.height
            )));
        }
        Ok(())
    }

    fn line_range(&self, band: usize, line: usize, len: usize) -> Result<std::ops::Range<usize>> {
        if band >= self.bands.len() {
            return Err(BinningError::BandOutOfRange {
                band,
                bands: self.bands.len(),
            });
        }
        if line >= self.height || len != self.width {
            return Err(BinningError::InvalidFormat(format!(
                "scanline {} of '{}' requested with {} samples (scene is {}x{})",
                line, self.name, len, self.width, self.height
            )));
        }
        let start = line * self.width;
        Ok(start..start + self.width)
    }
}

impl PixelSource for RasterScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn band_index(&self, band_name: &str) -> Option<usize> {
        self.bands.iter().position(|b| b.name == band_name)
    }

    fn read_line(&self, band: usize, line: usize, values: &mut [f32]) -> Result<()> {
        let range = self.line_range(band, line, values.len())?;
        values.copy_from_slice(&self.bands[band].values[range]);
        Ok(())
    }

    fn read_valid_mask(&self, band: usize, line: usize, valid: &mut [bool]) -> Result<bool> {
        let range = self.line_range(band, line, valid.len())?;
        match self.bands[band].valid {
            Some(ref mask) => {
                valid.copy_from_slice(&mask[range]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn geo_coding(&self) -> Option<&dyn GeoCoding> {
        self.geo_coding.as_deref()
    }

    fn observation_time(&self) -> Option<ObservationTime> {
        self.observation_time
    }
}
