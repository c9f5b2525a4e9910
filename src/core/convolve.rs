use crate::types::{RadError, RadResult, SensorResponse, UniformSpectrum};

/// One band's convolved equivalent value
#[derive(Debug, Clone, PartialEq)]
pub struct BandValue {
    pub name: String,
    pub value: f64,
}

/// Convolve a spectrum against each of a sensor's spectral response
/// functions: `integral(R * S_b) / integral(S_b)` per band, trapezoidal.
///
/// The spectrum and every SRF must already be sampled on the exact same
/// wavelength grid; this function performs no interpolation. Returns one
/// value per band, in declared band order.
pub fn band_convolve(spectrum: &UniformSpectrum, sensor: &SensorResponse) -> RadResult<Vec<BandValue>> {
    if spectrum.len() != sensor.wavelengths.len() {
        return Err(RadError::Schema(format!(
            "spectrum on {} points but sensor SRFs on {}; regrid both to a common domain first",
            spectrum.len(),
            sensor.wavelengths.len()
        )));
    }
    if spectrum.len() < 2 {
        return Err(RadError::Processing(
            "band convolution needs at least two grid points".to_string(),
        ));
    }

    let x = sensor.wavelengths.as_slice().unwrap_or(&[]);
    let r = spectrum.values.as_slice().unwrap_or(&[]);

    let mut out = Vec::with_capacity(sensor.bands.len());
    for band in &sensor.bands {
        let s = band.response.as_slice().unwrap_or(&[]);
        if s.len() != x.len() {
            return Err(RadError::Schema(format!(
                "band '{}' SRF has {} points, expected {}",
                band.name,
                s.len(),
                x.len()
            )));
        }

        let weighted: Vec<f64> = r.iter().zip(s).map(|(&r, &s)| r * s).collect();
        let norm = trapz(s, x);
        if norm == 0.0 {
            return Err(RadError::Processing(format!(
                "band '{}' SRF integrates to zero",
                band.name
            )));
        }

        out.push(BandValue {
            name: band.name.clone(),
            value: trapz(&weighted, x) / norm,
        });
    }

    Ok(out)
}

/// Trapezoidal numerical integration of y over x
pub fn trapz(y: &[f64], x: &[f64]) -> f64 {
    debug_assert_eq!(y.len(), x.len());
    let mut sum = 0.0;
    for i in 1..x.len() {
        sum += (x[i] - x[i - 1]) * (y[i] + y[i - 1]) / 2.0;
    }
    sum
}
