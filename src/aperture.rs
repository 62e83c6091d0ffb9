//! Aperture distribution: illumination, blockage, aberration and defocus
//! combined into a complex field over the primary reflector.
//!
//! The amplitude is illumination times blockage; the phase is
//! `2 pi (W + OPD / lambda)` where `W` is the Zernike wavefront and OPD the
//! defocus path difference. The Fourier transform of this field is the
//! far-field radiation pattern (see [`crate::diffraction`]).

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::Result;
use crate::geometry::TelescopeGeometry;
use crate::grid::cart2pol;
use crate::wavefront::wavefront;

/// Closed set of illumination taper shapes.
///
/// The original tool passes illumination functions around as callables; here
/// the choice is a configuration value dispatched by match, which keeps the
/// set extensible without dynamic dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IlluminationKind {
    /// Parabolic taper on a pedestal,
    /// `Ea = amp (c + (1 - c)(1 - (r/pr)^2)^q)` with `c = 10^(taper_dB/20)`.
    ParabolicPedestal {
        /// Taper order `q`, commonly 2.
        order: f64,
    },
    /// Gaussian taper, `Ea = amp exp(-r^2 / (2 (sigma pr)^2))` with
    /// `sigma = 10^(taper_dB/20)`.
    Gaussian,
}

/// Illumination (apodization) of the primary reflector by the receiver.
#[derive(Debug, Clone)]
pub struct Illumination {
    /// Peak amplitude `amp`.
    pub amplitude: f64,
    /// Edge taper in dB; negative, typically -25 to -8.
    pub taper_db: f64,
    /// Illumination center offset `(x0, y0)` in meters.
    pub offset: (f64, f64),
    /// Taper shape.
    pub kind: IlluminationKind,
}

impl Default for Illumination {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            taper_db: -14.0,
            offset: (0.0, 0.0),
            kind: IlluminationKind::ParabolicPedestal { order: 2.0 },
        }
    }
}

impl Illumination {
    /// Evaluate the illumination over coordinate maps, for a primary
    /// reflector of radius `pr`.
    pub fn evaluate(&self, x: &DMatrix<f64>, y: &DMatrix<f64>, pr: f64) -> DMatrix<f64> {
        let (x0, y0) = self.offset;
        match self.kind {
            IlluminationKind::ParabolicPedestal { order } => {
                let c = 10f64.powf(self.taper_db / 20.0);
                x.zip_map(y, |xv, yv| {
                    let r2 = (xv - x0).powi(2) + (yv - y0).powi(2);
                    // Clamped at the pedestal beyond the dish edge, where a
                    // fractional taper order would otherwise be undefined.
                    let taper = (1.0 - r2 / (pr * pr)).max(0.0).powf(order);
                    self.amplitude * (c + (1.0 - c) * taper)
                })
            }
            IlluminationKind::Gaussian => {
                let sigma = 10f64.powf(self.taper_db / 20.0);
                let two_s2 = 2.0 * (sigma * pr).powi(2);
                x.zip_map(y, |xv, yv| {
                    let r2 = (xv - x0).powi(2) + (yv - y0).powi(2);
                    self.amplitude * (-r2 / two_s2).exp()
                })
            }
        }
    }
}

/// Complex aperture distribution over coordinate maps `(x, y)`.
///
/// `E = B Ea exp(i 2 pi (W + OPD / lambda))`; exactly zero wherever the
/// blockage mask is zero, in particular everywhere outside the primary
/// radius. `rho` is normalized by the primary radius before the wavefront
/// evaluation so the Zernike basis stays orthogonal over the dish.
pub fn aperture(
    x: &DMatrix<f64>,
    y: &DMatrix<f64>,
    coeffs: &[f64],
    illum: &Illumination,
    geometry: &TelescopeGeometry,
    d_z: f64,
    wavelength: f64,
) -> Result<DMatrix<Complex64>> {
    let pr = geometry.primary_radius;
    let (rho, theta) = cart2pol(x, y);
    let rho_norm = rho / pr;

    let w = wavefront(coeffs, &theta, &rho_norm)?;
    let opd = geometry.opd(x, y, d_z);
    let ea = illum.evaluate(x, y, pr);
    let b = geometry.blockage(x, y);

    let out = DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
        if b[(i, j)] == 0.0 {
            return Complex64::new(0.0, 0.0);
        }
        let amp = b[(i, j)] * ea[(i, j)];
        let phase = 2.0 * std::f64::consts::PI * (w[(i, j)] + opd[(i, j)] / wavelength);
        Complex64::from_polar(amp, phase)
    });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::grid::{linspace, meshgrid};

    #[test]
    fn test_illumination_peak_value() {
        let x = DMatrix::from_element(1, 1, 0.0);
        let y = DMatrix::from_element(1, 1, 0.0);

        let pedestal = Illumination::default();
        // At the center r = 0: c + (1 - c) = 1, scaled by the amplitude.
        assert_relative_eq!(pedestal.evaluate(&x, &y, 50.0)[(0, 0)], 1.0);

        let gauss = Illumination {
            amplitude: 0.7,
            kind: IlluminationKind::Gaussian,
            ..Default::default()
        };
        assert_relative_eq!(gauss.evaluate(&x, &y, 50.0)[(0, 0)], 0.7);
    }

    #[test]
    fn test_illumination_edge_taper() {
        let pr = 50.0;
        let x = DMatrix::from_element(1, 1, pr);
        let y = DMatrix::from_element(1, 1, 0.0);
        let illum = Illumination {
            taper_db: -20.0,
            ..Default::default()
        };
        // At the dish edge only the pedestal remains: 10^(-20/20) = 0.1.
        assert_relative_eq!(illum.evaluate(&x, &y, pr)[(0, 0)], 0.1, epsilon = 1e-12);
    }

    /// The aperture must vanish exactly in every blocked region, for any
    /// coefficient and illumination input.
    #[test]
    fn test_aperture_blockage_zeros() {
        let mut rng = StdRng::seed_from_u64(7);
        let geo = TelescopeGeometry::effelsberg();
        let coeffs: Vec<f64> = (0..21).map(|_| rng.gen_range(-0.06..0.06)).collect();
        let illum = Illumination::default();

        let axis = linspace(-125.0, 125.0, 65);
        let (xg, yg) = meshgrid(&axis, &axis);
        let e = aperture(&xg, &yg, &coeffs, &illum, &geo, 0.022, 0.00937).unwrap();
        let b = geo.blockage(&xg, &yg);

        for j in 0..e.ncols() {
            for i in 0..e.nrows() {
                if b[(i, j)] == 0.0 {
                    assert_eq!(e[(i, j)].norm(), 0.0, "nonzero field in blocked region");
                } else {
                    assert!(e[(i, j)].norm() > 0.0);
                }
            }
        }
    }
}
