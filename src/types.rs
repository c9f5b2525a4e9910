use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Spectral magnitude in raw instrument units
pub type RadReal = f64;

/// A 1-D spectrum sampled at discrete points
pub type SpectrumArray = Array1<f64>;

/// Radiometric channel recorded by the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Upwelling radiance
    Lu,
    /// Sky radiance
    Lsky,
    /// Downwelling irradiance
    Ed,
}

impl ChannelKind {
    /// The three channels in canonical order (one record per channel per sample)
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Lu, ChannelKind::Lsky, ChannelKind::Ed];
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Lu => write!(f, "Lu"),
            ChannelKind::Lsky => write!(f, "Lsky"),
            ChannelKind::Ed => write!(f, "Ed"),
        }
    }
}

impl FromStr for ChannelKind {
    type Err = RadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Lu" => Ok(ChannelKind::Lu),
            "Lsky" => Ok(ChannelKind::Lsky),
            "Ed" => Ok(ChannelKind::Ed),
            other => Err(RadError::Parse(format!("unknown channel id: '{}'", other))),
        }
    }
}

/// Per-sample auxiliary fields, denormalized onto every pixel row of a sample.
///
/// Required fields are always present in valid logs; `voltage` and
/// `temperature` are absent in early firmware revisions and stay optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleMeta {
    pub sample_no: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub solar_azimuth: f64,
    pub solar_elevation: f64,
    pub rel_azimuth: f64,
    pub heading: f64,
    pub pitch: f64,
    pub roll: f64,
    pub integration_time_ms: f64,
    pub saturated: bool,
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
}

/// One long-format row: a single spectral pixel of a single channel reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralRecord {
    pub timestamp: DateTime<Utc>,
    pub channel: ChannelKind,
    pub pixel: u32,
    pub magnitude: f64,
    pub meta: SampleMeta,
}

/// A per-channel slice of magnitudes indexed by spectral pixel,
/// extracted from one (timestamp, channel) group
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpectrum {
    pub pixels: Vec<u32>,
    pub magnitudes: Vec<f64>,
}

/// The canonical long-format table threaded through the pipeline.
///
/// Rows are kept sorted by (timestamp, channel, pixel); every valid
/// (timestamp, channel) group holds exactly `pixel_count` rows once the
/// quality filter has run.
#[derive(Debug, Clone, Default)]
pub struct LongFormatLog {
    records: Vec<SpectralRecord>,
}

impl LongFormatLog {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn from_records(mut records: Vec<SpectralRecord>) -> Self {
        sort_records(&mut records);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SpectralRecord] {
        &self.records
    }

    /// Append another log's rows and restore chronological order
    pub fn extend(&mut self, other: LongFormatLog) {
        self.records.extend(other.records);
        sort_records(&mut self.records);
    }

    /// Keep only the rows for which `keep` returns true
    pub fn retain<F: FnMut(&SpectralRecord) -> bool>(&mut self, keep: F) {
        self.records.retain(keep);
    }

    /// Distinct sample timestamps in ascending order
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        let mut ts: Vec<DateTime<Utc>> = self.records.iter().map(|r| r.timestamp).collect();
        ts.sort();
        ts.dedup();
        ts
    }

    /// Extract the pixel-ordered spectrum of one (timestamp, channel) group.
    ///
    /// Returns `None` when the group is absent from the table.
    pub fn spectrum(
        &self,
        timestamp: DateTime<Utc>,
        channel: ChannelKind,
    ) -> Option<ChannelSpectrum> {
        let mut rows: Vec<(u32, f64)> = self
            .records
            .iter()
            .filter(|r| r.timestamp == timestamp && r.channel == channel)
            .map(|r| (r.pixel, r.magnitude))
            .collect();

        if rows.is_empty() {
            return None;
        }
        rows.sort_by_key(|&(pixel, _)| pixel);

        let (pixels, magnitudes) = rows.into_iter().unzip();
        Some(ChannelSpectrum { pixels, magnitudes })
    }
}

fn sort_records(records: &mut [SpectralRecord]) {
    records.sort_by(|a, b| (a.timestamp, a.channel, a.pixel).cmp(&(b.timestamp, b.channel, b.pixel)));
}

/// Per-channel mapping from spectral pixel index to physical wavelength (nm).
///
/// Loaded once per instrument calibration. Each channel's table is
/// monotonically increasing over the shared pixel index domain
/// `0..pixel_count`; monotonicity is a calibration precondition, not a
/// runtime check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelWavelengthMap {
    pub pixel_count: usize,
    pub lu_nm: Vec<f64>,
    pub lsky_nm: Vec<f64>,
    pub ed_nm: Vec<f64>,
}

impl PixelWavelengthMap {
    /// Wavelengths (nm) indexed by pixel for one channel
    pub fn wavelengths(&self, channel: ChannelKind) -> &[f64] {
        match channel {
            ChannelKind::Lu => &self.lu_nm,
            ChannelKind::Lsky => &self.lsky_nm,
            ChannelKind::Ed => &self.ed_nm,
        }
    }
}

/// A strictly regular wavelength grid: `steps` equally spaced points on
/// [min_nm, max_nm]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthGrid {
    pub min_nm: f64,
    pub max_nm: f64,
    pub steps: usize,
}

impl Default for WavelengthGrid {
    fn default() -> Self {
        // 1 nm spacing over the instrument's usable domain
        Self {
            min_nm: 400.0,
            max_nm: 1000.0,
            steps: 601,
        }
    }
}

impl WavelengthGrid {
    /// Materialize the grid points
    pub fn points(&self) -> SpectrumArray {
        Array1::linspace(self.min_nm, self.max_nm, self.steps)
    }
}

/// A spectrum resampled onto a uniform wavelength grid.
///
/// Produced only by interpolation; a derived, terminal artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSpectrum {
    pub wavelengths: SpectrumArray,
    pub values: SpectrumArray,
}

impl UniformSpectrum {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One sensor band's spectral response curve on the parent sensor's
/// wavelength domain
#[derive(Debug, Clone, PartialEq)]
pub struct SrfBand {
    pub name: String,
    pub response: SpectrumArray,
}

/// A target sensor described by its named bands, each with a spectral
/// response function on a shared wavelength domain
#[derive(Debug, Clone, PartialEq)]
pub struct SensorResponse {
    pub wavelengths: SpectrumArray,
    pub bands: Vec<SrfBand>,
}

impl SensorResponse {
    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }
}

/// Error types for radiometry processing
#[derive(Debug, thiserror::Error)]
pub enum RadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("wavelength {requested} nm outside source domain [{min}, {max}] nm")]
    OutOfDomain { requested: f64, min: f64, max: f64 },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for radiometry operations
pub type RadResult<T> = Result<T, RadError>;
