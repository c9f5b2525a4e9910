use crate::core::convolve::{band_convolve, trapz};
use crate::core::reflectance::{remote_sensing_reflectance, ReflectanceParams};
use crate::core::regrid::{regrid_spectrum, DomainPolicy};
use crate::core::resample::ResampledLog;
use crate::types::{
    ChannelKind, PixelWavelengthMap, RadError, RadResult, SensorResponse, UniformSpectrum,
    WavelengthGrid,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for terminal table assembly
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub grid: WavelengthGrid,
    pub domain: DomainPolicy,
    pub reflectance: ReflectanceParams,
}

/// One row of the uniform-grid output table: all radiometric quantities of
/// one time bucket at one wavelength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedRow {
    pub bucket: DateTime<Utc>,
    pub wavelength_nm: f64,
    pub lu: f64,
    pub lsky: f64,
    pub ed: f64,
    pub rrs: f64,
}

/// One row of the band-convolved output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandedRow {
    pub bucket: DateTime<Utc>,
    pub band: String,
    pub center_nm: f64,
    pub rrs: f64,
}

/// Regrid every bucket of a resampled log onto the uniform wavelength grid
/// and derive Rrs, producing the pipeline's terminal long table keyed by
/// (bucket, wavelength).
///
/// Buckets missing a channel are skipped with a warning; with the quality
/// filter upstream this only happens when a whole channel saturated out of
/// a bucket.
pub fn gridded_table(
    resampled: &ResampledLog,
    calibration: &PixelWavelengthMap,
    config: &TableConfig,
) -> RadResult<Vec<GriddedRow>> {
    let buckets = resampled.buckets();
    log::info!(
        "gridding {} buckets onto {} wavelengths",
        buckets.len(),
        config.grid.steps
    );

    let mut rows = Vec::with_capacity(buckets.len() * config.grid.steps);
    for bucket in buckets {
        let Some((lu, lsky, ed)) = bucket_spectra(resampled, bucket, calibration, config)? else {
            continue;
        };
        let rrs = remote_sensing_reflectance(&lu, &lsky, &ed, &config.reflectance)?;

        for (i, &nm) in rrs.wavelengths.iter().enumerate() {
            rows.push(GriddedRow {
                bucket,
                wavelength_nm: nm,
                lu: lu.values[i],
                lsky: lsky.values[i],
                ed: ed.values[i],
                rrs: rrs.values[i],
            });
        }
    }

    Ok(rows)
}

/// Band-convolved variant of the terminal table: one row per
/// (bucket, sensor band).
///
/// `sensor` must already be resampled onto `config.grid` (see
/// `io::srf::resample_response`); the convolver does not interpolate.
pub fn banded_table(
    resampled: &ResampledLog,
    calibration: &PixelWavelengthMap,
    sensor: &SensorResponse,
    config: &TableConfig,
) -> RadResult<Vec<BandedRow>> {
    if sensor.wavelengths.len() != config.grid.steps {
        return Err(RadError::Schema(format!(
            "sensor SRFs on {} points but grid has {}; resample the sensor first",
            sensor.wavelengths.len(),
            config.grid.steps
        )));
    }

    // Effective band centers: SRF-weighted wavelength centroids
    let x = sensor.wavelengths.as_slice().unwrap_or(&[]);
    let centers: Vec<f64> = sensor
        .bands
        .iter()
        .map(|band| {
            let s = band.response.as_slice().unwrap_or(&[]);
            let weighted: Vec<f64> = x.iter().zip(s).map(|(&x, &s)| x * s).collect();
            trapz(&weighted, x) / trapz(s, x)
        })
        .collect();

    let mut rows = Vec::new();
    for bucket in resampled.buckets() {
        let Some((lu, lsky, ed)) = bucket_spectra(resampled, bucket, calibration, config)? else {
            continue;
        };
        let rrs = remote_sensing_reflectance(&lu, &lsky, &ed, &config.reflectance)?;

        for (band, center_nm) in band_convolve(&rrs, sensor)?.into_iter().zip(&centers) {
            rows.push(BandedRow {
                bucket,
                band: band.name,
                center_nm: *center_nm,
                rrs: band.value,
            });
        }
    }

    Ok(rows)
}

/// Regrid the three channels of one bucket, or `None` when the bucket is
/// incomplete
fn bucket_spectra(
    resampled: &ResampledLog,
    bucket: DateTime<Utc>,
    calibration: &PixelWavelengthMap,
    config: &TableConfig,
) -> RadResult<Option<(UniformSpectrum, UniformSpectrum, UniformSpectrum)>> {
    let (Some(lu), Some(lsky), Some(ed)) = (
        resampled.spectrum(bucket, ChannelKind::Lu),
        resampled.spectrum(bucket, ChannelKind::Lsky),
        resampled.spectrum(bucket, ChannelKind::Ed),
    ) else {
        log::warn!("bucket {} missing a channel, skipped", bucket);
        return Ok(None);
    };

    Ok(Some((
        regrid_spectrum(&lu, &calibration.lu_nm, &config.grid, config.domain)?,
        regrid_spectrum(&lsky, &calibration.lsky_nm, &config.grid, config.domain)?,
        regrid_spectrum(&ed, &calibration.ed_nm, &config.grid, config.domain)?,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resample::{resample, Statistic};
    use crate::types::{LongFormatLog, SampleMeta, SpectralRecord, SrfBand};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};
    use ndarray::Array1;

    fn toy_calibration() -> PixelWavelengthMap {
        PixelWavelengthMap {
            pixel_count: 3,
            lu_nm: vec![400.0, 700.0, 1000.0],
            lsky_nm: vec![400.0, 700.0, 1000.0],
            ed_nm: vec![400.0, 700.0, 1000.0],
        }
    }

    fn toy_resampled() -> ResampledLog {
        let ts = Utc.with_ymd_and_hms(2021, 7, 14, 10, 3, 0).unwrap();
        let meta = SampleMeta {
            sample_no: 1,
            latitude: 56.0,
            longitude: -3.9,
            solar_azimuth: 0.0,
            solar_elevation: 0.0,
            rel_azimuth: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            integration_time_ms: 256.0,
            saturated: false,
            voltage: None,
            temperature: None,
        };

        let mut records = Vec::new();
        for pixel in 0..3u32 {
            for (channel, magnitude) in [
                (ChannelKind::Lu, 4.0),
                (ChannelKind::Lsky, 0.0),
                (ChannelKind::Ed, 2.0),
            ] {
                records.push(SpectralRecord {
                    timestamp: ts,
                    channel,
                    pixel,
                    magnitude,
                    meta,
                });
            }
        }
        let log = LongFormatLog::from_records(records);
        resample(&log, Duration::minutes(10), Statistic::Mean).unwrap()
    }

    fn toy_config() -> TableConfig {
        TableConfig {
            grid: WavelengthGrid {
                min_nm: 400.0,
                max_nm: 1000.0,
                steps: 3,
            },
            ..TableConfig::default()
        }
    }

    #[test]
    fn test_gridded_table_keyed_by_bucket_and_wavelength() {
        let rows = gridded_table(&toy_resampled(), &toy_calibration(), &toy_config()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].wavelength_nm, 400.0);
        assert_eq!(rows[2].wavelength_nm, 1000.0);
        for row in &rows {
            assert_eq!(
                row.bucket,
                Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap()
            );
            assert_relative_eq!(row.lu, 4.0);
            assert_relative_eq!(row.ed, 2.0);
            assert_relative_eq!(row.rrs, 2.0);
        }
    }

    #[test]
    fn test_banded_table_with_boxcar_sensor() {
        let config = toy_config();
        let sensor = SensorResponse {
            wavelengths: config.grid.points(),
            bands: vec![SrfBand {
                name: "Box".to_string(),
                response: Array1::from_vec(vec![1.0, 1.0, 1.0]),
            }],
        };

        let rows =
            banded_table(&toy_resampled(), &toy_calibration(), &sensor, &config).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].band, "Box");
        // flat Rrs = 2 convolves to 2; boxcar centroid sits mid-grid
        assert_relative_eq!(rows[0].rrs, 2.0);
        assert_relative_eq!(rows[0].center_nm, 700.0);
    }

    #[test]
    fn test_banded_table_requires_matching_grid() {
        let config = toy_config();
        let sensor = SensorResponse {
            wavelengths: Array1::from_vec(vec![400.0, 1000.0]),
            bands: vec![],
        };
        assert!(matches!(
            banded_table(&toy_resampled(), &toy_calibration(), &sensor, &config).unwrap_err(),
            RadError::Schema(_)
        ));
    }
}
