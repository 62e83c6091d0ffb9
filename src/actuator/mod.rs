//! Active-surface actuator transform.
//!
//! The phase-error maps recovered for the primary dish are corrected by an
//! active surface in the sub-reflector: a fixed layout of actuators pushed
//! perpendicular to the surface. This module maps between the two spaces —
//! a device-calibrated rotation (a 90 degree multiple), a sign convention
//! and the `lambda / 4 pi` phase-to-displacement factor — and builds/writes
//! the sparse lookup table the control system consumes.
//!
//! The rotation count and sign are calibration constants, not derived
//! quantities; a mismatch silently misorients the map, which is why the
//! round-trip contract is covered by tests rather than runtime checks.

pub mod interpolate;

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::error::{Result, RoofError};
use crate::grid::linspace;

pub use interpolate::{interpolate_regular_bilinear, interpolate_scattered_cubic};

/// Fixed ring-and-angle actuator layout of an active sub-reflector surface.
#[derive(Debug, Clone)]
pub struct ActuatorLayout {
    /// Ring radii in meters, used when reading/building lookup tables.
    pub ring_radii: Vec<f64>,
    /// Ring radii used when writing lookup tables; the control system quotes
    /// the outermost ring slightly inward of its nominal radius.
    pub write_ring_radii: Vec<f64>,
    /// Angular positions in radians, shared by every ring.
    pub angles: Vec<f64>,
    /// Elevation angles (radians) at which the lookup table is tabulated.
    pub elevations: Vec<f64>,
}

impl ActuatorLayout {
    /// Effelsberg active surface: 4 rings of 24 actuators (96 total),
    /// angles every 15 degrees starting at 7.5, lookup tabulated at 11
    /// elevations between 7 and 90 degrees.
    pub fn effelsberg() -> Self {
        let angles = (0..24)
            .map(|k| (7.5 + 15.0 * k as f64).to_radians())
            .collect();
        let elevations = [7.0f64, 10.0, 20.0, 30.0, 32.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]
            .iter()
            .map(|d| d.to_radians())
            .collect();
        Self {
            ring_radii: vec![3.250, 2.600, 1.880, 1.210],
            write_ring_radii: vec![3.245, 2.600, 1.880, 1.210],
            angles,
            elevations,
        }
    }

    /// Number of actuators (rings times angles).
    pub fn len(&self) -> usize {
        self.ring_radii.len() * self.angles.len()
    }

    /// True when the layout carries no actuators.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian actuator positions in ring-major order, read layout.
    pub fn positions(&self) -> (Vec<f64>, Vec<f64>) {
        Self::ring_positions(&self.ring_radii, &self.angles)
    }

    /// Cartesian actuator positions in ring-major order, write layout.
    pub fn write_positions(&self) -> (Vec<f64>, Vec<f64>) {
        Self::ring_positions(&self.write_ring_radii, &self.angles)
    }

    fn ring_positions(radii: &[f64], angles: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut px = Vec::with_capacity(radii.len() * angles.len());
        let mut py = Vec::with_capacity(radii.len() * angles.len());
        for &r in radii {
            for &t in angles {
                px.push(r * t.cos());
                py.push(r * t.sin());
            }
        }
        (px, py)
    }
}

/// Geometric transform between primary-dish phase-error maps and
/// sub-reflector actuator displacement maps.
#[derive(Debug, Clone)]
pub struct ActuatorTransform {
    /// Observation wavelength in meters.
    pub wavelength: f64,
    /// Device rotation between the two maps, in 90 degree steps.
    pub rotation_steps: u32,
    /// Displacement sign convention as seen from the active surface.
    pub sign: f64,
    /// Sub-reflector radius in meters; displacements outside it are zero.
    pub secondary_radius: f64,
    /// Samples per axis of the dense working grid.
    pub resolution: usize,
    /// Integer unit of the lookup table, in meters (1 um for Effelsberg).
    pub displacement_unit: f64,
    /// Actuator layout of the active surface.
    pub layout: ActuatorLayout,
}

impl ActuatorTransform {
    /// Effelsberg active surface conventions: rotation of 3 steps, negative
    /// sign, 6.5 m sub-reflector, micrometer lookup unit.
    pub fn effelsberg(wavelength: f64) -> Self {
        Self {
            wavelength,
            rotation_steps: 3,
            sign: -1.0,
            secondary_radius: 3.25,
            resolution: 1000,
            displacement_unit: 1e-6,
            layout: ActuatorLayout::effelsberg(),
        }
    }

    /// Dense working axis over the sub-reflector, `[-sr, sr]`.
    pub fn grid_axis(&self) -> DVector<f64> {
        linspace(-self.secondary_radius, self.secondary_radius, self.resolution)
    }

    /// Phase-error map (radians) to actuator perpendicular displacement map
    /// (meters): `sign (lambda / 4 pi) rot90(phase, -rotation_steps)`.
    pub fn to_actuator(&self, phase: &DMatrix<f64>) -> DMatrix<f64> {
        let factor = self.sign * self.wavelength / (4.0 * std::f64::consts::PI);
        rot90(phase, -(self.rotation_steps as i32)) * factor
    }

    /// Exact algebraic inverse of [`to_actuator`](Self::to_actuator):
    /// displacement map (meters) to phase-error map (radians).
    pub fn to_phase(&self, displacement: &DMatrix<f64>) -> DMatrix<f64> {
        let factor = self.sign * 4.0 * std::f64::consts::PI / self.wavelength;
        rot90(displacement, self.rotation_steps as i32) * factor
    }

    /// Build dense displacement maps from raw per-elevation actuator
    /// measurements (ring-major order matching
    /// [`ActuatorLayout::positions`]).
    ///
    /// Each elevation slice is interpolated independently with the
    /// scattered-data cubic interpolant; values outside the measured
    /// coverage (the sample convex hull) and outside the sub-reflector
    /// radius are zero — no actuator correction where nothing was measured.
    pub fn build_lookup(&self, samples: &[Vec<f64>]) -> Result<Vec<DMatrix<f64>>> {
        let (px, py) = self.layout.positions();
        let axis = self.grid_axis();
        let sr2 = self.secondary_radius * self.secondary_radius;

        let mut maps = Vec::with_capacity(samples.len());
        for (slice, values) in samples.iter().enumerate() {
            if values.len() != self.layout.len() {
                return Err(RoofError::DimensionMismatch {
                    expected: format!("{} actuator values", self.layout.len()),
                    found: format!("{} in elevation slice {slice}", values.len()),
                });
            }
            let mut map = interpolate_scattered_cubic(&px, &py, values, &axis, &axis)?;
            for j in 0..map.ncols() {
                for i in 0..map.nrows() {
                    if axis[j] * axis[j] + axis[i] * axis[i] > sr2 {
                        map[(i, j)] = 0.0;
                    }
                }
            }
            maps.push(map);
        }
        debug!(
            "Built dense lookup: {} elevation slices, {} actuators, {}x{} grid",
            maps.len(),
            self.layout.len(),
            self.resolution,
            self.resolution
        );
        Ok(maps)
    }

    /// Regrid dense displacement maps back to the physical actuators.
    ///
    /// Uses the regular-grid bilinear interpolant at the write-layout
    /// positions and rounds to the lookup table's integer unit. Returns one
    /// row per actuator with one value per elevation slice, the layout of
    /// the control-system table. This is a near-inverse of
    /// [`build_lookup`](Self::build_lookup) only, bounded by interpolation
    /// error.
    pub fn write_lookup(&self, maps: &[DMatrix<f64>]) -> Result<Vec<Vec<i64>>> {
        let (px, py) = self.layout.write_positions();
        let axis = self.grid_axis();

        let mut per_slice = Vec::with_capacity(maps.len());
        for map in maps {
            let values = interpolate_regular_bilinear(&axis, &axis, map, &px, &py)?;
            per_slice.push(values);
        }

        let rows = (0..self.layout.len())
            .map(|k| {
                per_slice
                    .iter()
                    .map(|values| (values[k] / self.displacement_unit).round() as i64)
                    .collect()
            })
            .collect();
        Ok(rows)
    }
}

/// Rotate a square map by `k` 90 degree steps about its center;
/// positive `k` is counterclockwise.
pub fn rot90(m: &DMatrix<f64>, k: i32) -> DMatrix<f64> {
    let (nr, nc) = m.shape();
    match k.rem_euclid(4) {
        0 => m.clone(),
        1 => DMatrix::from_fn(nc, nr, |i, j| m[(j, nc - 1 - i)]),
        2 => DMatrix::from_fn(nr, nc, |i, j| m[(nr - 1 - i, nc - 1 - j)]),
        _ => DMatrix::from_fn(nc, nr, |i, j| m[(nr - 1 - j, i)]),
    }
}
