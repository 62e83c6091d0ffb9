//! FFT-based diffraction engine: aperture distribution to far-field
//! radiation and power patterns.
//!
//! The aperture is sampled on a square spatial grid of half-width
//! `box_factor * primary_radius`, Fourier transformed in 2-D, and the
//! zero-frequency component shifted to the center. The wave-vector axes
//! follow the standard frequency-bin formula from the spatial step, shifted
//! consistently with the spectrum.
//!
//! Numerical contract: no renormalization by sample count is applied to the
//! raw spectrum. Callers comparing simulated and measured maps either keep
//! both unnormalized or normalize both power patterns to unit peak.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;
use rustfft::FftPlanner;

use crate::aperture::{aperture, Illumination};
use crate::error::{Result, RoofError};
use crate::geometry::TelescopeGeometry;
use crate::grid::{linspace, meshgrid};

/// Far-field radiation pattern: a complex spectrum over its own wave-vector
/// axis pair, in inverse meters.
#[derive(Debug, Clone)]
pub struct RadiationPattern {
    /// u axis (1/m), conjugate to x, zero-frequency centered.
    pub u: DVector<f64>,
    /// v axis (1/m), conjugate to y, zero-frequency centered.
    pub v: DVector<f64>,
    /// Complex (field) radiation pattern, shape `(resolution, resolution)`.
    pub field: DMatrix<Complex64>,
}

/// Compute the radiation pattern of an aberrated, defocused aperture.
///
/// `resolution` is the number of samples per axis; a power of two keeps the
/// transform fast but is not required for correctness. Fails with
/// [`RoofError::InvalidResolution`] when fewer than 2 samples are requested,
/// since a single sample carries no spatial step.
#[allow(clippy::too_many_arguments)]
pub fn radiation_pattern(
    coeffs: &[f64],
    illum: &Illumination,
    geometry: &TelescopeGeometry,
    d_z: f64,
    wavelength: f64,
    resolution: usize,
    box_factor: f64,
) -> Result<RadiationPattern> {
    if resolution < 2 {
        return Err(RoofError::InvalidResolution(resolution));
    }

    let box_size = geometry.primary_radius * box_factor;
    let x = linspace(-box_size, box_size, resolution);
    let y = x.clone();
    let dx = x[1] - x[0];

    let (xg, yg) = meshgrid(&x, &y);
    let mut field = aperture(&xg, &yg, coeffs, illum, geometry, d_z, wavelength)?;

    fft2_inplace(&mut field);
    let field = fftshift2(&field);

    let u = fftshift_vec(&fftfreq(resolution, dx));
    let v = u.clone();

    Ok(RadiationPattern { u, v, field })
}

/// Power pattern `|F|^2` of a complex spectrum, optionally normalized to
/// unit peak (used before shape comparison; leave unnormalized for residual
/// diagnostics).
pub fn power_pattern(field: &DMatrix<Complex64>, normalize: bool) -> DMatrix<f64> {
    let mut power = field.map(|c| c.norm_sqr());
    if normalize {
        let peak = power.max();
        if peak > 0.0 {
            power /= peak;
        }
    }
    power
}

/// Discrete Fourier transform sample frequencies for `n` samples with step
/// `d`: `[0, 1, ..., n/2-1, -n/2, ..., -1] / (n d)` (even `n` shown).
pub fn fftfreq(n: usize, d: f64) -> DVector<f64> {
    let scale = 1.0 / (n as f64 * d);
    let half = (n - 1) / 2 + 1; // number of non-negative frequencies
    DVector::from_fn(n, |i, _| {
        if i < half {
            i as f64 * scale
        } else {
            (i as f64 - n as f64) * scale
        }
    })
}

/// Shift the zero-frequency element to the center of the axis.
pub fn fftshift_vec(v: &DVector<f64>) -> DVector<f64> {
    let n = v.len();
    let s = n / 2;
    DVector::from_fn(n, |i, _| v[(i + n - s) % n])
}

/// 2-D fftshift: swap quadrants so the zero-frequency bin lands at the
/// center of the spectrum.
pub fn fftshift2(m: &DMatrix<Complex64>) -> DMatrix<Complex64> {
    let (nr, nc) = m.shape();
    let (sr, sc) = (nr / 2, nc / 2);
    DMatrix::from_fn(nr, nc, |i, j| m[((i + nr - sr) % nr, (j + nc - sc) % nc)])
}

/// In-place 2-D FFT, rows then columns.
fn fft2_inplace(m: &mut DMatrix<Complex64>) {
    let (nr, nc) = m.shape();
    let mut planner = FftPlanner::new();
    let mut scratch = vec![Complex64::new(0.0, 0.0); nr.max(nc)];

    let fft_row = planner.plan_fft_forward(nc);
    for i in 0..nr {
        for j in 0..nc {
            scratch[j] = m[(i, j)];
        }
        fft_row.process(&mut scratch[..nc]);
        for j in 0..nc {
            m[(i, j)] = scratch[j];
        }
    }

    let fft_col = planner.plan_fft_forward(nr);
    for j in 0..nc {
        for i in 0..nr {
            scratch[i] = m[(i, j)];
        }
        fft_col.process(&mut scratch[..nr]);
        for i in 0..nr {
            m[(i, j)] = scratch[i];
        }
    }
}
