//! # roof
//!
//! **Out-of-focus (OOF) holography** for radio telescopes, written in Rust.
//!
//! Given beam maps observed with a deliberate sub-reflector axial offset,
//! OOF holography reconstructs the phase-error (wavefront aberration) of the
//! primary reflector and converts it into physical corrections — actuator
//! perpendicular displacements — for an active sub-reflector surface. This
//! crate implements the numerical core of that pipeline:
//!
//! - **Zernike circle polynomials** — the orthogonal basis parametrizing the
//!   aberration wavefront ([`zernike`], [`wavefront`])
//! - **Aperture distribution** — illumination, mechanical blockage and
//!   defocus combined into a complex field over the dish ([`aperture`],
//!   [`geometry`])
//! - **Diffraction** — FFT of the aperture into far-field radiation and
//!   power patterns ([`diffraction`])
//! - **Least-squares inversion** — Zernike coefficients from observed phase
//!   maps, and a per-coefficient gravitational deformation model across
//!   elevation angles ([`fitting`])
//! - **Active surface** — phase-error maps to actuator displacement maps and
//!   lookup tables ([`actuator`])
//!
//! File parsing, configuration loading, plotting and report writing are
//! deliberately out of scope: every entry point takes in-memory grids plus
//! explicit axis/wavelength context (meters and radians throughout) and
//! returns values. Nothing is cached or mutated after construction, so
//! repeated calls with equal inputs reproduce fits bit-for-bit.
//!
//! ## Example
//!
//! ```
//! use roof::{
//!     fit_phase_set, fit_gravity_model, phase_map, LeastSquaresConfig,
//! };
//!
//! // Synthetic phase-error maps for three elevations (21 coefficients = order 5).
//! let coeffs = vec![0.02; 21];
//! let elevations: Vec<f64> = [10.0, 50.0, 90.0_f64]
//!     .iter()
//!     .map(|d| d.to_radians())
//!     .collect();
//! let maps: Vec<_> = elevations
//!     .iter()
//!     .map(|_| phase_map(&coeffs, 50.0, 64, false, false).unwrap())
//!     .collect();
//!
//! // Recover the coefficients per elevation, then the gravity model.
//! let config = LeastSquaresConfig::default();
//! let reports = fit_phase_set(&maps, 5, 50.0, &config).unwrap();
//! let coeffs_by_elevation: Vec<_> =
//!     reports.into_iter().map(|r| r.params).collect();
//! let gravity = fit_gravity_model(&coeffs_by_elevation, &elevations, &config).unwrap();
//! assert_eq!(gravity.len(), 21);
//! ```

pub mod actuator;
pub mod aperture;
pub mod diffraction;
pub mod error;
pub mod fitting;
pub mod geometry;
pub mod grid;
pub mod wavefront;
pub mod zernike;

pub use actuator::{ActuatorLayout, ActuatorTransform};
pub use aperture::{aperture, Illumination, IlluminationKind};
pub use diffraction::{power_pattern, radiation_pattern, RadiationPattern};
pub use error::{Result, RoofError};
pub use fitting::{
    fit_gravity_model, fit_phase, fit_phase_set, levenberg_marquardt, predict_coefficients,
    predict_phase_maps, FitReport, GravityModel, LeastSquaresConfig,
};
pub use geometry::TelescopeGeometry;
pub use wavefront::{
    phase_map, phase_rms, ruze_efficiency, wavefront, wavefront_filtered, PhaseMap,
};
pub use zernike::{num_coefficients, order_for_len, zernike_indices, ZernikeIndex};

// Commonly used types.
// All core math is 64-bit: the fits compare phase residuals at the 1e-3
// radian level after FFTs over 256x256 grids, where 32-bit floats have shown
// to be insufficiently accurate.
pub type Map = nalgebra::DMatrix<f64>;
pub type ComplexMap = nalgebra::DMatrix<num_complex::Complex64>;
pub type Coefficients = nalgebra::DVector<f64>;
