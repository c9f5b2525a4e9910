//! Interface to satellite surface-reflectance rasters.
//!
//! Raster file access and coordinate reprojection live outside this crate;
//! the pipeline only consumes per-band reflectance spectra sampled at
//! projected points. Implementations wrap whatever raster stack the caller
//! uses and hand back values already scaled to [0, 1].

use crate::types::RadResult;

/// Native integer encoding width of the reference surface-reflectance
/// products
pub const DEFAULT_BIT_DEPTH: u32 = 16;

/// Band-center wavelengths (nm) of the SuperDoves 8-band instrument,
/// in band order
pub const SUPERDOVES_BAND_CENTERS_NM: [f64; 8] =
    [443.0, 490.0, 531.0, 565.0, 610.0, 665.0, 705.0, 865.0];

/// SuperDoves band names, in band order
pub const SUPERDOVES_BAND_NAMES: [&str; 8] = [
    "Coastal Blue",
    "Blue",
    "Green I",
    "Green",
    "Yellow",
    "Red",
    "Red Edge",
    "NIR",
];

/// Scale a raw digital number to [0, 1] reflectance using the image's
/// integer bit depth
pub fn scale_dn(dn: u32, bit_depth: u32) -> f64 {
    dn as f64 / (1u64 << bit_depth) as f64
}

/// A sampler over one multi-band surface-reflectance image.
///
/// Query points are in the image's projected CRS; reprojection from the
/// survey CRS is the implementor's concern. Each sample is one reflectance
/// value per band, in the sensor's band order, scaled to [0, 1].
pub trait ReflectanceSampler {
    /// Band names in image band order
    fn band_names(&self) -> &[String];

    /// Band-center wavelengths (nm) in image band order
    fn band_centers_nm(&self) -> &[f64];

    /// Per-band reflectance at each query point
    fn sample(&mut self, points: &[(f64, f64)]) -> RadResult<Vec<Vec<f64>>>;

    /// Per-band reflectance over an N x M pixel neighborhood centered on
    /// one point, row-major
    fn sample_grid(&mut self, center: (f64, f64), shape: (usize, usize)) -> RadResult<Vec<Vec<f64>>>;
}
