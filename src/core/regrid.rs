use crate::types::{ChannelSpectrum, RadError, RadResult, UniformSpectrum, WavelengthGrid};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// What to do when a grid point falls outside the source wavelength domain.
///
/// Linear interpolation is undefined beyond the outermost calibration
/// points, so the choice must be explicit: `Reject` (default) fails the
/// regrid, `Clamp` holds the edge value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DomainPolicy {
    #[default]
    Reject,
    Clamp,
}

/// Resample one channel's pixel-indexed spectrum onto a uniform wavelength
/// grid by 1-D linear interpolation.
///
/// `wavelengths_nm` maps each pixel of `spectrum` to a physical wavelength
/// and must be monotonically increasing (a calibration precondition; not
/// checked here). The two slices are aligned through the pixel indices
/// carried by `spectrum`, so partial groups regrid against the wavelengths
/// they actually cover.
pub fn regrid_spectrum(
    spectrum: &ChannelSpectrum,
    wavelengths_nm: &[f64],
    grid: &WavelengthGrid,
    policy: DomainPolicy,
) -> RadResult<UniformSpectrum> {
    if spectrum.pixels.is_empty() {
        return Err(RadError::Processing("empty spectrum".to_string()));
    }

    // Gather the (wavelength, magnitude) source points for the pixels present
    let mut x = Vec::with_capacity(spectrum.pixels.len());
    for &pixel in &spectrum.pixels {
        let nm = wavelengths_nm.get(pixel as usize).ok_or_else(|| {
            RadError::Schema(format!(
                "pixel {} outside calibration domain of {} pixels",
                pixel,
                wavelengths_nm.len()
            ))
        })?;
        x.push(*nm);
    }
    let y = &spectrum.magnitudes;

    let targets = grid.points();
    let mut values = Array1::zeros(targets.len());
    for (i, &nm) in targets.iter().enumerate() {
        values[i] = interp_linear(&x, y, nm, policy)?;
    }

    Ok(UniformSpectrum {
        wavelengths: targets,
        values,
    })
}

/// Interpolate a single point on a piecewise-linear curve.
///
/// `x` must be ascending. Out-of-domain queries follow `policy`.
pub fn interp_linear(x: &[f64], y: &[f64], at: f64, policy: DomainPolicy) -> RadResult<f64> {
    debug_assert_eq!(x.len(), y.len());
    let (min, max) = (x[0], x[x.len() - 1]);

    if at < min || at > max {
        return match policy {
            DomainPolicy::Reject => Err(RadError::OutOfDomain {
                requested: at,
                min,
                max,
            }),
            DomainPolicy::Clamp => Ok(if at < min { y[0] } else { y[y.len() - 1] }),
        };
    }

    // Binary search for the bracketing source points
    let mut left = 0;
    let mut right = x.len();
    while left < right {
        let mid = (left + right) / 2;
        if x[mid] <= at {
            left = mid + 1;
        } else {
            right = mid;
        }
    }

    let after = left.min(x.len() - 1);
    let before = after.saturating_sub(1);

    if x[after] == x[before] {
        return Ok(y[before]);
    }

    let weight = (at - x[before]) / (x[after] - x[before]);
    Ok(y[before] * (1.0 - weight) + y[after] * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn toy_spectrum() -> ChannelSpectrum {
        ChannelSpectrum {
            pixels: vec![0, 1, 2],
            magnitudes: vec![10.0, 20.0, 40.0],
        }
    }

    #[test]
    fn test_regrid_hits_source_points_exactly() {
        // Toy map: pixel 0 -> 400 nm, 1 -> 700 nm, 2 -> 1000 nm
        let map = [400.0, 700.0, 1000.0];
        let grid = WavelengthGrid {
            min_nm: 400.0,
            max_nm: 1000.0,
            steps: 3,
        };

        let out = regrid_spectrum(&toy_spectrum(), &map, &grid, DomainPolicy::Reject).unwrap();
        assert_eq!(out.values.to_vec(), vec![10.0, 20.0, 40.0]);
    }

    #[test]
    fn test_regrid_interpolates_between_points() {
        let map = [400.0, 700.0, 1000.0];
        let grid = WavelengthGrid {
            min_nm: 550.0,
            max_nm: 850.0,
            steps: 2,
        };

        let out = regrid_spectrum(&toy_spectrum(), &map, &grid, DomainPolicy::Reject).unwrap();
        assert_relative_eq!(out.values[0], 15.0); // halfway 400->700
        assert_relative_eq!(out.values[1], 30.0); // halfway 700->1000
    }

    #[test]
    fn test_regrid_idempotent_on_uniform_grid() {
        let grid = WavelengthGrid {
            min_nm: 400.0,
            max_nm: 800.0,
            steps: 5,
        };
        let map: Vec<f64> = grid.points().to_vec();
        let spectrum = ChannelSpectrum {
            pixels: (0..5).collect(),
            magnitudes: vec![1.0, 4.0, 9.0, 16.0, 25.0],
        };

        let once = regrid_spectrum(&spectrum, &map, &grid, DomainPolicy::Reject).unwrap();
        let again = regrid_spectrum(
            &ChannelSpectrum {
                pixels: (0..5).collect(),
                magnitudes: once.values.to_vec(),
            },
            &map,
            &grid,
            DomainPolicy::Reject,
        )
        .unwrap();

        for (a, b) in once.values.iter().zip(again.values.iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_out_of_domain_rejected_by_default() {
        let map = [450.0, 700.0, 950.0];
        let grid = WavelengthGrid::default(); // 400-1000 exceeds the map

        let err = regrid_spectrum(&toy_spectrum(), &map, &grid, DomainPolicy::Reject).unwrap_err();
        match err {
            RadError::OutOfDomain { min, max, .. } => {
                assert_eq!(min, 450.0);
                assert_eq!(max, 950.0);
            }
            other => panic!("expected OutOfDomain, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_domain_clamps_when_configured() {
        let map = [450.0, 700.0, 950.0];
        let grid = WavelengthGrid {
            min_nm: 400.0,
            max_nm: 1000.0,
            steps: 2,
        };

        let out = regrid_spectrum(&toy_spectrum(), &map, &grid, DomainPolicy::Clamp).unwrap();
        assert_eq!(out.values[0], 10.0); // clamped to first source point
        assert_eq!(out.values[1], 40.0); // clamped to last source point
    }

    #[test]
    fn test_pixel_outside_calibration_is_schema_error() {
        let map = [400.0, 700.0]; // only 2 pixels calibrated
        let grid = WavelengthGrid {
            min_nm: 400.0,
            max_nm: 700.0,
            steps: 2,
        };

        let err = regrid_spectrum(&toy_spectrum(), &map, &grid, DomainPolicy::Reject).unwrap_err();
        assert!(matches!(err, RadError::Schema(_)));
    }
}
