use crate::types::{RadError, RadResult, UniformSpectrum};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Fresnel sky-glint reflectance for the instrument's typical viewing
/// geometry (40 deg from nadir, 135 deg relative azimuth), after
/// Mobley (1999).
pub const RHO_SKY_GLINT: f64 = 0.028;

/// Parameters for the remote-sensing reflectance calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectanceParams {
    /// Fixed sky-glint correction coefficient
    pub rho: f64,
    /// |Ed| at or below this value yields a NaN sentinel instead of a
    /// division blow-up
    pub ed_floor: f64,
}

impl Default for ReflectanceParams {
    fn default() -> Self {
        Self {
            rho: RHO_SKY_GLINT,
            ed_floor: 1e-9,
        }
    }
}

/// Compute Rrs(lambda) = (Lu - rho * Lsky) / Ed element-wise.
///
/// All three slices must share one wavelength basis; mismatched lengths are
/// a schema error. Invalid divisions produce `f64::NAN`, never infinity.
pub fn rrs_elementwise(
    lu: &[f64],
    lsky: &[f64],
    ed: &[f64],
    params: &ReflectanceParams,
) -> RadResult<Vec<f64>> {
    if lu.len() != lsky.len() || lu.len() != ed.len() {
        return Err(RadError::Schema(format!(
            "channel spectra on different bases: Lu {}, Lsky {}, Ed {}",
            lu.len(),
            lsky.len(),
            ed.len()
        )));
    }

    let rrs = lu
        .iter()
        .zip(lsky)
        .zip(ed)
        .map(|((&lu, &lsky), &ed)| {
            if ed.abs() <= params.ed_floor {
                f64::NAN
            } else {
                (lu - params.rho * lsky) / ed
            }
        })
        .collect();

    Ok(rrs)
}

/// Remote-sensing reflectance of three spectra regridded to the same
/// uniform wavelength basis
pub fn remote_sensing_reflectance(
    lu: &UniformSpectrum,
    lsky: &UniformSpectrum,
    ed: &UniformSpectrum,
    params: &ReflectanceParams,
) -> RadResult<UniformSpectrum> {
    let values = rrs_elementwise(
        lu.values.as_slice().unwrap_or(&[]),
        lsky.values.as_slice().unwrap_or(&[]),
        ed.values.as_slice().unwrap_or(&[]),
        params,
    )?;

    Ok(UniformSpectrum {
        wavelengths: lu.wavelengths.clone(),
        values: Array1::from_vec(values),
    })
}
