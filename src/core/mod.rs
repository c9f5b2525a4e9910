//! Core spectral processing modules

pub mod convolve;
pub mod quality;
pub mod reflectance;
pub mod regrid;
pub mod resample;
pub mod stats;
pub mod table;

// Re-export main types
pub use convolve::{band_convolve, BandValue};
pub use quality::{apply_quality_filter, QualityPolicy, QualityReport};
pub use reflectance::{remote_sensing_reflectance, ReflectanceParams, RHO_SKY_GLINT};
pub use regrid::{regrid_spectrum, DomainPolicy};
pub use resample::{resample, ResampledLog, Statistic};
pub use stats::{summarize_rrs, RrsSummary, SummaryConfig, SummaryMode};
pub use table::{banded_table, gridded_table, BandedRow, GriddedRow, TableConfig};
