use crate::core::regrid::{interp_linear, DomainPolicy};
use crate::types::{RadError, RadResult, SensorResponse, SpectrumArray, SrfBand, WavelengthGrid};
use ndarray::Array1;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Load a sensor's spectral response functions from CSV.
///
/// Expected layout: a header row, a wavelength column first, then one
/// response column per band. Band order in the file is the declared band
/// order everywhere downstream.
pub fn load_sensor_response(path: &Path) -> RadResult<SensorResponse> {
    log::info!("loading sensor response functions from {}", path.display());
    let file = File::open(path).map_err(|e| {
        RadError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    read_sensor_response(BufReader::new(file))
}

/// Read sensor response functions from any reader
pub fn read_sensor_response<R: Read>(reader: R) -> RadResult<SensorResponse> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(RadError::Schema(
            "sensor response file needs a wavelength column and at least one band".to_string(),
        ));
    }
    let band_names: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

    let mut wavelengths: Vec<f64> = Vec::new();
    let mut responses: Vec<Vec<f64>> = vec![Vec::new(); band_names.len()];

    for (row, result) in csv_reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(RadError::Schema(format!(
                "sensor response row {} has {} fields, expected {}",
                row,
                record.len(),
                headers.len()
            )));
        }

        let nm: f64 = record[0]
            .parse()
            .map_err(|_| RadError::Parse(format!("row {}: bad wavelength '{}'", row, &record[0])))?;
        if let Some(&last) = wavelengths.last() {
            if nm <= last {
                return Err(RadError::Schema(format!(
                    "sensor response wavelengths must be ascending (row {}: {} after {})",
                    row, nm, last
                )));
            }
        }
        wavelengths.push(nm);

        for (band, values) in responses.iter_mut().enumerate() {
            let field = &record[band + 1];
            values.push(field.parse().map_err(|_| {
                RadError::Parse(format!(
                    "row {}: bad response '{}' for band '{}'",
                    row, field, band_names[band]
                ))
            })?);
        }
    }

    if wavelengths.len() < 2 {
        return Err(RadError::Schema(
            "sensor response file has fewer than two wavelength rows".to_string(),
        ));
    }

    let bands = band_names
        .into_iter()
        .zip(responses)
        .map(|(name, values)| SrfBand {
            name,
            response: Array1::from_vec(values),
        })
        .collect();

    Ok(SensorResponse {
        wavelengths: Array1::from_vec(wavelengths),
        bands,
    })
}

/// Resample every band's response onto a uniform grid so spectra regridded
/// to the same grid can be convolved directly.
///
/// Grid points beyond the tabulated domain get zero response: a sensor is
/// insensitive outside its published curve, so zero-fill is physical where
/// spectrum extrapolation would not be.
pub fn resample_response(sensor: &SensorResponse, grid: &WavelengthGrid) -> RadResult<SensorResponse> {
    let source: Vec<f64> = sensor.wavelengths.to_vec();
    let (min, max) = (source[0], source[source.len() - 1]);
    let targets = grid.points();

    let mut bands = Vec::with_capacity(sensor.bands.len());
    for band in &sensor.bands {
        let values = band.response.as_slice().ok_or_else(|| {
            RadError::Processing(format!("band '{}' response is not contiguous", band.name))
        })?;

        let mut resampled: SpectrumArray = Array1::zeros(targets.len());
        for (i, &nm) in targets.iter().enumerate() {
            resampled[i] = if nm < min || nm > max {
                0.0
            } else {
                interp_linear(&source, values, nm, DomainPolicy::Reject)?
            };
        }

        bands.push(SrfBand {
            name: band.name.clone(),
            response: resampled,
        });
    }

    Ok(SensorResponse {
        wavelengths: targets,
        bands,
    })
}
