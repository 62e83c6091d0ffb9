//! Error taxonomy for the numeric core.
//!
//! Every failure is raised at the point of detection and propagated to the
//! caller unmodified. The core never retries and never substitutes a default
//! value for a failed computation; in particular a non-convergent fit is an
//! error, not a zero coefficient vector.

/// Errors produced by the holography core.
#[derive(Debug, thiserror::Error)]
pub enum RoofError {
    /// Malformed Zernike index: requires `|l| <= n` and `n - |l|` even.
    #[error("invalid Zernike index (l={l}, n={n}): requires |l| <= n and n - |l| even")]
    InvalidIndex { l: i32, n: u32 },

    /// Array shapes or coefficient counts disagree.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },

    /// FFT grid size too small to carry a spatial step.
    #[error("invalid FFT resolution {0}: need at least 2 samples per axis")]
    InvalidResolution(usize),

    /// Scattered samples cannot support a surface (too few or collinear).
    #[error("scattered interpolation is degenerate: {points} usable points (need at least 4, not all collinear)")]
    InterpolationDegenerate { points: usize },

    /// Least-squares solver exhausted its iteration budget.
    #[error("fit did not converge after {iterations} iterations (residual norm {residual_norm:.3e})")]
    FitNotConverged { residual_norm: f64, iterations: u32 },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RoofError>;
