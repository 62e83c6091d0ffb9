//! Wavefront (aberration) distribution and aperture phase maps.
//!
//! A wavefront is a linear combination of Zernike circle polynomials weighted
//! by a coefficient vector in the canonical layout of
//! [`zernike_indices`](crate::zernike::zernike_indices). Phase maps are the
//! wavefront scaled to radians and masked to the primary dish; they are the
//! quantity both the fit routines and the actuator transform operate on.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, RoofError};
use crate::grid::{cart2pol, linspace, meshgrid, zero_outside_radius};
use crate::zernike::{self, zernike_indices};

/// A real-valued map over an explicit spatial axis pair, in meters.
///
/// `map[(i, j)]` is sampled at `(x[j], y[i])`. For phase-error maps the
/// values are radians.
#[derive(Debug, Clone)]
pub struct PhaseMap {
    /// x axis in meters.
    pub x: DVector<f64>,
    /// y axis in meters.
    pub y: DVector<f64>,
    /// Map values, shape `(y.len(), x.len())`.
    pub map: DMatrix<f64>,
}

/// Weighted sum of Zernike circle polynomials over polar coordinate maps.
///
/// The order is inferred from the coefficient count; a count that matches no
/// enumeration is a [`RoofError::DimensionMismatch`]. `rho` must already be
/// normalized by the aperture radius.
pub fn wavefront(coeffs: &[f64], theta: &DMatrix<f64>, rho: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    wavefront_filtered(coeffs, theta, rho, false, false)
}

/// [`wavefront`] with optional suppression of the tilt (`n = 1`) and piston
/// (`n = 0`) components.
///
/// Piston and tilt carry no surface-quality information, so reported
/// phase-error maps usually drop them; fitting always retains them.
pub fn wavefront_filtered(
    coeffs: &[f64],
    theta: &DMatrix<f64>,
    rho: &DMatrix<f64>,
    exclude_tilt: bool,
    exclude_piston: bool,
) -> Result<DMatrix<f64>> {
    let order = zernike::order_for_len(coeffs.len())?;
    if theta.shape() != rho.shape() {
        return Err(RoofError::DimensionMismatch {
            expected: format!("theta shape {:?}", theta.shape()),
            found: format!("rho shape {:?}", rho.shape()),
        });
    }

    let mut sum = DMatrix::zeros(rho.nrows(), rho.ncols());
    for (k, idx) in zernike_indices(order).into_iter().enumerate() {
        if coeffs[k] == 0.0
            || (exclude_piston && idx.n == 0)
            || (exclude_tilt && idx.n == 1)
        {
            continue;
        }
        let basis = zernike::evaluate(idx.l, idx.n, theta, rho)?;
        sum += basis * coeffs[k];
    }
    Ok(sum)
}

/// Aperture phase-error map on a fresh square grid over the primary dish.
///
/// Builds axes over `[-pr, pr]` with `resolution` samples, evaluates the
/// wavefront with `rho` normalized by `pr`, zeroes everything outside the
/// dish and scales to radians by `2 pi`.
pub fn phase_map(
    coeffs: &[f64],
    pr: f64,
    resolution: usize,
    exclude_tilt: bool,
    exclude_piston: bool,
) -> Result<PhaseMap> {
    let x = linspace(-pr, pr, resolution);
    let y = x.clone();
    let (xg, yg) = meshgrid(&x, &y);
    let (rho, theta) = cart2pol(&xg, &yg);

    let rho_norm = rho / pr;
    let mut map = wavefront_filtered(coeffs, &theta, &rho_norm, exclude_tilt, exclude_piston)?;
    zero_outside_radius(&mut map, &xg, &yg, pr);
    map *= 2.0 * std::f64::consts::PI;

    Ok(PhaseMap { x, y, map })
}

/// RMS of a phase map over the dish interior (radius `pr`), in the map units.
pub fn phase_rms(phase: &PhaseMap, pr: f64) -> f64 {
    let mut sum_sq = 0.0;
    let mut count = 0usize;
    for j in 0..phase.map.ncols() {
        for i in 0..phase.map.nrows() {
            let (xv, yv) = (phase.x[j], phase.y[i]);
            if xv * xv + yv * yv <= pr * pr {
                let v = phase.map[(i, j)];
                sum_sq += v * v;
                count += 1;
            }
        }
    }
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}

/// Ruze random-surface-error efficiency `exp(-rms^2)` for an RMS phase error
/// in radians.
pub fn ruze_efficiency(rms_rad: f64) -> f64 {
    (-rms_rad * rms_rad).exp()
}
