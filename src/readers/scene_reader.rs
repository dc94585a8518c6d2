use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::debug;

use crate::error::{BinningError, Result};
use crate::models::ObservationTime;
use crate::readers::{RasterScene, TiePointGeoCoding};

const LEADING_COLUMNS: [&str; 4] = ["line", "pixel", "lat", "lon"];
const TIME_COLUMN: &str = "time";

/// Reads swath scenes from CSV files.
///
/// Expected header: `line,pixel,lat,lon[,time],<band>,<band>,…`. One record per pixel; an
/// empty or non-finite band sample marks that pixel invalid for the band, pixels without a
/// record have no position. The optional `time` column holds RFC 3339 pixel acquisition
/// times; the scene is observed from the earliest to the latest of them.
pub struct SceneReader {
    delimiter: u8,
}

impl SceneReader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn read_scene(&self, path: &Path) -> Result<RasterScene> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BinningError::InvalidFormat(format!("Invalid scene path: {}", path.display())))?
            .to_string();

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let layout = self.parse_headers(&headers, path)?;
        let band_names = &layout.bands;

        let mut pixels = Vec::new();
        let mut width = 0;
        let mut height = 0;
        let mut observed: Option<ObservationTime> = None;
        for (row_number, result) in reader.records().enumerate() {
            let record = result?;
            let pixel = self.parse_record(&record, &layout, row_number + 2)?;
            width = width.max(pixel.x + 1);
            height = height.max(pixel.y + 1);
            if let Some(time) = pixel.time {
                let instant = ObservationTime::new(time, time);
                observed = Some(observed.map_or(instant, |o| o.union(&instant)));
            }
            pixels.push(pixel);
        }

        if pixels.is_empty() {
            return Err(BinningError::MissingData(format!(
                "scene {} contains no pixels",
                path.display()
            )));
        }

        let size = width * height;
        let mut lats = vec![f64::NAN; size];
        let mut lons = vec![f64::NAN; size];
        let mut values = vec![vec![f32::NAN; size]; band_names.len()];
        let mut valid = vec![vec![false; size]; band_names.len()];

        for pixel in pixels {
            let index = pixel.y * width + pixel.x;
            lats[index] = pixel.lat;
            lons[index] = pixel.lon;
            for (band, sample) in pixel.samples.into_iter().enumerate() {
                if let Some(v) = sample {
                    values[band][index] = v;
                    valid[band][index] = true;
                }
            }
        }

        debug!(
            scene = %name,
            width,
            height,
            bands = band_names.len(),
            timed = observed.is_some(),
            "read scene"
        );

        let mut scene = RasterScene::new(name, width, height);
        for ((band_name, band_values), band_valid) in band_names.iter().zip(values).zip(valid) {
            scene = scene
                .with_band(band_name.clone(), band_values)?
                .with_valid_mask(band_name, band_valid)?;
        }

        if let Some(coding) = TiePointGeoCoding::new(width, height, lats, lons) {
            scene = scene.with_geo_coding(Box::new(coding));
        }
        if let Some(time) = observed {
            scene = scene.with_observation_time(time);
        }

        Ok(scene)
    }

    fn parse_headers(&self, headers: &StringRecord, path: &Path) -> Result<ColumnLayout> {
        for (index, expected) in LEADING_COLUMNS.iter().enumerate() {
            match headers.get(index) {
                Some(h) if h.eq_ignore_ascii_case(expected) => {}
                other => {
                    return Err(BinningError::InvalidFormat(format!(
                        "{}: column {} must be '{}', found '{}'",
                        path.display(),
                        index + 1,
                        expected,
                        other.unwrap_or("")
                    )))
                }
            }
        }

        let timed = headers
            .get(LEADING_COLUMNS.len())
            .is_some_and(|h| h.eq_ignore_ascii_case(TIME_COLUMN));
        let first_band = LEADING_COLUMNS.len() + usize::from(timed);

        let bands: Vec<String> = headers
            .iter()
            .skip(first_band)
            .map(|h| h.to_string())
            .collect();
        if bands.is_empty() {
            return Err(BinningError::MissingData(format!(
                "{} declares no band columns",
                path.display()
            )));
        }
        Ok(ColumnLayout {
            timed,
            first_band,
            bands,
        })
    }

    fn parse_record(
        &self,
        record: &StringRecord,
        layout: &ColumnLayout,
        row: usize,
    ) -> Result<ScenePixel> {
        let columns = layout.first_band + layout.bands.len();
        if record.len() != columns {
            return Err(BinningError::InvalidFormat(format!(
                "row {}: expected {} columns, found {}",
                row,
                columns,
                record.len()
            )));
        }

        let field = |index: usize| record.get(index).unwrap_or("");
        let parse_index = |index: usize| {
            field(index).parse::<usize>().map_err(|_| {
                BinningError::InvalidFormat(format!(
                    "row {}: invalid {} '{}'",
                    row,
                    LEADING_COLUMNS[index],
                    field(index)
                ))
            })
        };
        let parse_coord = |index: usize| {
            field(index).parse::<f64>().map_err(|_| {
                BinningError::InvalidFormat(format!(
                    "row {}: invalid {} '{}'",
                    row,
                    LEADING_COLUMNS[index],
                    field(index)
                ))
            })
        };

        let y = parse_index(0)?;
        let x = parse_index(1)?;
        let lat = parse_coord(2)?;
        let lon = parse_coord(3)?;

        let time = match field(LEADING_COLUMNS.len()) {
            text if layout.timed && !text.is_empty() => Some(
                DateTime::parse_from_rfc3339(text)
                    .map_err(|e| {
                        BinningError::InvalidFormat(format!(
                            "row {}: invalid time '{}': {}",
                            row, text, e
                        ))
                    })?
                    .with_timezone(&Utc),
            ),
            _ => None,
        };

        let samples = (0..layout.bands.len())
            .map(|band| {
                field(layout.first_band + band)
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
            })
            .collect();

        Ok(ScenePixel {
            x,
            y,
            lat,
            lon,
            time,
            samples,
        })
    }
}

impl Default for SceneReader {
    fn default() -> Self {
        Self::new()
    }
}

struct ColumnLayout {
    timed: bool,
    first_band: usize,
    bands: Vec<String>,
}

struct ScenePixel {
    x: usize,
    y: usize,
    lat: f64,
    lon: f64,
    time: Option<DateTime<Utc>>,
    samples: Vec<Option<f32>>,
}
