//! Telescope geometry: blockage distribution and optical path difference.
//!
//! Geometry constants (reflector radii, support-leg dimensions, focal
//! lengths) are plain values carried by [`TelescopeGeometry`] and passed
//! explicitly wherever they are needed, so the model stays parametrizable to
//! other telescopes. The [`TelescopeGeometry::effelsberg`] preset holds the
//! Effelsberg 100 m constants.

use nalgebra::DMatrix;

/// Fixed optical/mechanical geometry of one telescope, all lengths in meters.
#[derive(Debug, Clone)]
pub struct TelescopeGeometry {
    /// Primary reflector radius.
    pub primary_radius: f64,
    /// Secondary reflector radius (its shadow blocks the aperture center).
    pub secondary_radius: f64,
    /// Half thickness of each support leg strip.
    pub support_half_width: f64,
    /// Half length of the support leg strips, measured from the axis.
    pub support_length: f64,
    /// Focal length of the primary reflector.
    pub primary_focus: f64,
    /// Effective total focal length of the Gregorian system.
    pub total_focus: f64,
}

impl TelescopeGeometry {
    /// Effelsberg 100 m Gregorian telescope.
    pub fn effelsberg() -> Self {
        Self {
            primary_radius: 50.0,
            secondary_radius: 3.25,
            support_half_width: 1.0,
            support_length: 20.0,
            primary_focus: 30.0,
            total_focus: 387.66,
        }
    }

    /// Mechanical blockage mask over coordinate maps `(x, y)`.
    ///
    /// 1 inside the primary radius and outside the secondary-reflector
    /// shadow; 0 in the shadow, outside the dish, and inside the two
    /// orthogonal support-leg strips.
    pub fn blockage(&self, x: &DMatrix<f64>, y: &DMatrix<f64>) -> DMatrix<f64> {
        let pr2 = self.primary_radius * self.primary_radius;
        let sr2 = self.secondary_radius * self.secondary_radius;
        let (a, l) = (self.support_half_width, self.support_length);

        x.zip_map(y, |xv, yv| {
            let r2 = xv * xv + yv * yv;
            let in_dish = r2 < pr2 && r2 > sr2;
            let in_legs = (xv.abs() < l && yv.abs() < a) || (yv.abs() < l && xv.abs() < a);
            if in_dish && !in_legs {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Optical path difference from a sub-reflector axial offset `d_z`
    /// (meters), for the focused Gregorian system:
    /// `d_z ((1 - a^2)/(1 + a^2) + (1 - b^2)/(1 + b^2))` with
    /// `a = r / 2 f1` and `b = r / 2 F`.
    pub fn opd(&self, x: &DMatrix<f64>, y: &DMatrix<f64>, d_z: f64) -> DMatrix<f64> {
        let f1 = self.primary_focus;
        let big_f = self.total_focus;
        x.zip_map(y, |xv, yv| {
            let r = (xv * xv + yv * yv).sqrt();
            let a = r / (2.0 * f1);
            let b = r / (2.0 * big_f);
            let a2 = a * a;
            let b2 = b * b;
            d_z * ((1.0 - a2) / (1.0 + a2) + (1.0 - b2) / (1.0 + b2))
        })
    }
}
