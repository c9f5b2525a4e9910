//! hydrospec: A Fast, Modular Above-Water Hyperspectral Radiometry Processor
//!
//! This library ingests serial ASCII transect logs from an above-water
//! hyperspectral radiometer and turns them into uniformly-gridded,
//! quality-filtered, time-resampled remote-sensing reflectance suitable for
//! comparison against satellite multispectral surface-reflectance products.
//!
//! The pipeline: raw log files are parsed into a canonical long-format
//! table ([`io::LogReader`]), quality-filtered (`core::quality`),
//! aggregated into time buckets (`core::resample`), interpolated onto a
//! uniform wavelength grid (`core::regrid`), combined into Rrs
//! (`core::reflectance`), and optionally convolved against a satellite
//! sensor's spectral response functions (`core::convolve`).

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    ChannelKind, ChannelSpectrum, LongFormatLog, PixelWavelengthMap, RadError, RadResult,
    SampleMeta, SensorResponse, SpectralRecord, SrfBand, UniformSpectrum, WavelengthGrid,
};

pub use io::{LogFormat, LogReader};
pub use crate::core::{
    DomainPolicy, QualityPolicy, ReflectanceParams, Statistic, SummaryMode, TableConfig,
};
