use crate::core::reflectance::{rrs_elementwise, ReflectanceParams};
use crate::core::regrid::{interp_linear, regrid_spectrum, DomainPolicy};
use crate::core::resample::Statistic;
use crate::types::{
    ChannelKind, LongFormatLog, PixelWavelengthMap, RadError, RadResult, SpectrumArray,
    WavelengthGrid,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// How to compute grouped reflectance statistics across many samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryMode {
    /// Compute Rrs per sample on the raw per-channel pixel basis, take
    /// statistics per pixel index, then interpolate the summarized curves
    /// onto the uniform grid once.
    ///
    /// This is the cheap path and the historical default, but it is
    /// statistically distorted: Rrs is a nonlinear combination, and
    /// summarizing before regridding is not equivalent to regridding
    /// before summarizing (order statistics in particular do not commute
    /// with interpolation).
    Fast,
    /// Regrid every sample's Lu/Lsky/Ed onto the uniform grid first,
    /// compute Rrs per sample on the common grid, then take statistics
    /// per wavelength bin. Correct, but costs one interpolation per
    /// channel per sample.
    Accurate,
}

/// Tuning knobs for the summary computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub reflectance: ReflectanceParams,
    pub domain: DomainPolicy,
    /// Lower/upper percentile pair reported alongside mean/median
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            reflectance: ReflectanceParams::default(),
            domain: DomainPolicy::default(),
            lower_percentile: 5.0,
            upper_percentile: 95.0,
        }
    }
}

/// Per-wavelength descriptive statistics of Rrs across samples.
///
/// NaN Rrs sentinels (saturated Ed floor) are excluded per bin; a bin with
/// no finite values reports NaN throughout.
#[derive(Debug, Clone)]
pub struct RrsSummary {
    pub wavelengths: SpectrumArray,
    pub mean: SpectrumArray,
    pub std: SpectrumArray,
    pub median: SpectrumArray,
    pub lower: SpectrumArray,
    pub upper: SpectrumArray,
    pub sample_count: usize,
}

/// Summarize remote-sensing reflectance across every sample of a log.
///
/// The mode is deliberately a required argument: `Fast` and `Accurate`
/// produce different numbers (see `SummaryMode`), and the caller must own
/// that trade-off.
pub fn summarize_rrs(
    log: &LongFormatLog,
    calibration: &PixelWavelengthMap,
    grid: &WavelengthGrid,
    mode: SummaryMode,
    config: &SummaryConfig,
) -> RadResult<RrsSummary> {
    let timestamps = log.timestamps();
    log::info!(
        "summarizing Rrs over {} samples ({:?} mode)",
        timestamps.len(),
        mode
    );

    // One Rrs curve per sample, on the grid basis (Accurate) or the pixel
    // basis (Fast)
    let mut curves: Vec<Vec<f64>> = Vec::new();
    for ts in &timestamps {
        let (lu, lsky, ed) = match (
            log.spectrum(*ts, ChannelKind::Lu),
            log.spectrum(*ts, ChannelKind::Lsky),
            log.spectrum(*ts, ChannelKind::Ed),
        ) {
            (Some(lu), Some(lsky), Some(ed)) => (lu, lsky, ed),
            _ => {
                log::warn!("sample at {} missing a channel, excluded from summary", ts);
                continue;
            }
        };

        let curve = match mode {
            SummaryMode::Accurate => {
                let lu = regrid_spectrum(&lu, &calibration.lu_nm, grid, config.domain)?;
                let lsky = regrid_spectrum(&lsky, &calibration.lsky_nm, grid, config.domain)?;
                let ed = regrid_spectrum(&ed, &calibration.ed_nm, grid, config.domain)?;
                rrs_elementwise(
                    lu.values.as_slice().unwrap_or(&[]),
                    lsky.values.as_slice().unwrap_or(&[]),
                    ed.values.as_slice().unwrap_or(&[]),
                    &config.reflectance,
                )?
            }
            SummaryMode::Fast => rrs_elementwise(
                &lu.magnitudes,
                &lsky.magnitudes,
                &ed.magnitudes,
                &config.reflectance,
            )?,
        };
        curves.push(curve);
    }

    if curves.is_empty() {
        return Err(RadError::Processing(
            "no complete samples to summarize".to_string(),
        ));
    }
    let bins = curves[0].len();
    if curves.iter().any(|c| c.len() != bins) {
        return Err(RadError::Schema(
            "samples summarize on different bases".to_string(),
        ));
    }

    // Statistics per bin across samples
    let mut summary = BinSummaries::with_bins(bins);
    for bin in 0..bins {
        let mut values: Vec<f64> = curves
            .iter()
            .map(|c| c[bin])
            .filter(|v| v.is_finite())
            .collect();
        summary.push(bin, &mut values, config);
    }

    let sample_count = curves.len();
    match mode {
        SummaryMode::Accurate => Ok(summary.into_summary(grid.points(), sample_count)),
        SummaryMode::Fast => {
            // One interpolation of each summarized curve onto the grid.
            // The Lu map carries the curves to wavelength; the three
            // channel maps agree to well under the grid step.
            let targets = grid.points();
            let interp_curve = |curve: &Array1<f64>| -> RadResult<SpectrumArray> {
                let mut out = Array1::zeros(targets.len());
                let values = curve.to_vec();
                for (i, &nm) in targets.iter().enumerate() {
                    out[i] = interp_linear(&calibration.lu_nm, &values, nm, config.domain)?;
                }
                Ok(out)
            };

            Ok(RrsSummary {
                wavelengths: targets.clone(),
                mean: interp_curve(&summary.mean)?,
                std: interp_curve(&summary.std)?,
                median: interp_curve(&summary.median)?,
                lower: interp_curve(&summary.lower)?,
                upper: interp_curve(&summary.upper)?,
                sample_count,
            })
        }
    }
}

/// Accumulator for the five per-bin statistic curves
struct BinSummaries {
    mean: Array1<f64>,
    std: Array1<f64>,
    median: Array1<f64>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl BinSummaries {
    fn with_bins(bins: usize) -> Self {
        Self {
            mean: Array1::from_elem(bins, f64::NAN),
            std: Array1::from_elem(bins, f64::NAN),
            median: Array1::from_elem(bins, f64::NAN),
            lower: Array1::from_elem(bins, f64::NAN),
            upper: Array1::from_elem(bins, f64::NAN),
        }
    }

    fn push(&mut self, bin: usize, values: &mut Vec<f64>, config: &SummaryConfig) {
        if values.is_empty() {
            return; // stays NaN
        }
        self.mean[bin] = Statistic::Mean.reduce(values);
        self.std[bin] = Statistic::Std.reduce(values);
        self.median[bin] = Statistic::Median.reduce(values);
        // reduce(Median) leaves the slice sorted
        self.lower[bin] = percentile(values, config.lower_percentile);
        self.upper[bin] = percentile(values, config.upper_percentile);
    }

    fn into_summary(self, wavelengths: SpectrumArray, sample_count: usize) -> RrsSummary {
        RrsSummary {
            wavelengths,
            mean: self.mean,
            std: self.std,
            median: self.median,
            lower: self.lower,
            upper: self.upper,
            sample_count,
        }
    }
}

/// Percentile of an ascending-sorted slice, linearly interpolated between
/// order statistics
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    if below == above {
        return sorted[below];
    }
    let weight = rank - below as f64;
    sorted[below] * (1.0 - weight) + sorted[above] * weight
}
