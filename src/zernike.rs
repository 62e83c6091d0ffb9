//! Zernike circle polynomials.
//!
//! The aberration wavefront across the primary reflector is parametrized by
//! Zernike circle polynomials `U(l, n)` on the unit disk, indexed by radial
//! order `n >= 0` and azimuthal index `l` with `|l| <= n` and `n - |l|` even.
//!
//! The canonical coefficient-vector layout is fixed by [`zernike_indices`]:
//! outer loop over `n = 0..=N`, inner loop over `l = -n..=n` in steps of 2.
//! Every coefficient vector in the crate uses this ordering, so position `i`
//! always weights the same `(l, n)` pair regardless of which fit or
//! simulation produced it.

use nalgebra::DMatrix;

use crate::error::{Result, RoofError};

/// A single `(azimuthal, radial)` polynomial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZernikeIndex {
    /// Azimuthal index; negative selects the `sin` branch, non-negative `cos`.
    pub l: i32,
    /// Radial order, `n >= 0`.
    pub n: u32,
}

/// Number of polynomials up to and including radial order `n`:
/// `(n + 1)(n + 2) / 2`.
pub fn num_coefficients(order: u32) -> usize {
    ((order as usize + 1) * (order as usize + 2)) / 2
}

/// Canonical enumeration of polynomial indices up to `max_order`.
///
/// The enumeration for order `N` is a strict prefix of the enumeration for
/// any order above `N`, so coefficient vectors of different orders are
/// layout-compatible.
pub fn zernike_indices(max_order: u32) -> Vec<ZernikeIndex> {
    let mut indices = Vec::with_capacity(num_coefficients(max_order));
    for n in 0..=max_order as i32 {
        let mut l = -n;
        while l <= n {
            indices.push(ZernikeIndex { l, n: n as u32 });
            l += 2;
        }
    }
    indices
}

/// Radial order whose enumeration has exactly `len` entries.
///
/// Inverts `len = (n + 1)(n + 2) / 2`; a `len` that lands between orders is a
/// [`RoofError::DimensionMismatch`] since no valid coefficient vector has
/// that length.
pub fn order_for_len(len: usize) -> Result<u32> {
    let n = (((1.0 + 8.0 * len as f64).sqrt() - 3.0) / 2.0).round();
    if n < 0.0 || num_coefficients(n as u32) != len {
        return Err(RoofError::DimensionMismatch {
            expected: "a coefficient count of the form (n+1)(n+2)/2".into(),
            found: format!("{len}"),
        });
    }
    Ok(n as u32)
}

/// Evaluate `U(l, n)` elementwise over equal-shaped polar coordinate maps.
///
/// The radial part is the closed-form sum
/// `R(rho) = sum_s (-1)^s (n-s)! / (s! ((n+|l|)/2 - s)! ((n-|l|)/2 - s)!) rho^(n-2s)`,
/// multiplied by `sin(|l| theta)` for `l < 0` and `cos(|l| theta)` otherwise.
///
/// `rho` must be normalized by the aperture radius for the polynomials to be
/// orthogonal over the dish; the caller owns that normalization.
pub fn evaluate(l: i32, n: u32, theta: &DMatrix<f64>, rho: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let m = l.unsigned_abs();
    if m > n || (n - m) % 2 != 0 {
        return Err(RoofError::InvalidIndex { l, n });
    }
    if theta.shape() != rho.shape() {
        return Err(RoofError::DimensionMismatch {
            expected: format!("theta shape {:?}", theta.shape()),
            found: format!("rho shape {:?}", rho.shape()),
        });
    }

    let a = (n + m) / 2;
    let b = (n - m) / 2;

    // Radial expansion coefficients, one per power of rho.
    let radial: Vec<(f64, i32)> = (0..=b)
        .map(|s| {
            let sign = if s % 2 == 0 { 1.0 } else { -1.0 };
            let c = sign * factorial(n - s) / (factorial(s) * factorial(a - s) * factorial(b - s));
            (c, (n - 2 * s) as i32)
        })
        .collect();

    let m_f = m as f64;
    let out = DMatrix::from_fn(rho.nrows(), rho.ncols(), |i, j| {
        let r = rho[(i, j)];
        let radial_sum: f64 = radial.iter().map(|&(c, p)| c * r.powi(p)).sum();
        let angular = if l < 0 {
            (m_f * theta[(i, j)]).sin()
        } else {
            (m_f * theta[(i, j)]).cos()
        };
        radial_sum * angular
    });
    Ok(out)
}

fn factorial(k: u32) -> f64 {
    (1..=k).fold(1.0, |acc, v| acc * v as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    use crate::grid::{cart2pol, linspace, meshgrid};

    fn scalar(v: f64) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, v)
    }

    #[test]
    fn test_enumeration_length_and_prefix() {
        for order in 0..8u32 {
            let idx = zernike_indices(order);
            assert_eq!(idx.len(), num_coefficients(order));
            let next = zernike_indices(order + 1);
            assert_eq!(&next[..idx.len()], &idx[..], "order {order} not a prefix");
        }
    }

    #[test]
    fn test_enumeration_order_matches_convention() {
        // First entries: (0,0), (-1,1), (1,1), (-2,2), (0,2), (2,2), ...
        let idx = zernike_indices(2);
        assert_eq!(idx[0], ZernikeIndex { l: 0, n: 0 });
        assert_eq!(idx[1], ZernikeIndex { l: -1, n: 1 });
        assert_eq!(idx[2], ZernikeIndex { l: 1, n: 1 });
        assert_eq!(idx[3], ZernikeIndex { l: -2, n: 2 });
        assert_eq!(idx[4], ZernikeIndex { l: 0, n: 2 });
        assert_eq!(idx[5], ZernikeIndex { l: 2, n: 2 });
    }

    #[test]
    fn test_order_for_len() {
        assert_eq!(order_for_len(1).unwrap(), 0);
        assert_eq!(order_for_len(3).unwrap(), 1);
        assert_eq!(order_for_len(21).unwrap(), 5);
        assert!(order_for_len(0).is_err());
        assert!(order_for_len(4).is_err());
        assert!(order_for_len(20).is_err());
    }

    #[test]
    fn test_invalid_index_rejected() {
        let t = scalar(0.0);
        let r = scalar(0.5);
        // n - |l| odd
        assert!(matches!(
            evaluate(1, 2, &t, &r),
            Err(crate::RoofError::InvalidIndex { l: 1, n: 2 })
        ));
        // |l| > n
        assert!(evaluate(3, 1, &t, &r).is_err());
    }

    #[test]
    fn test_known_polynomials() {
        let t = scalar(0.3);
        let r = scalar(0.7);
        // Piston U(0,0) = 1 everywhere.
        assert_relative_eq!(evaluate(0, 0, &t, &r).unwrap()[(0, 0)], 1.0);
        // Tilt U(1,1) = rho cos(theta).
        assert_relative_eq!(
            evaluate(1, 1, &t, &r).unwrap()[(0, 0)],
            0.7 * 0.3f64.cos()
        );
        // Defocus U(0,2) = 2 rho^2 - 1.
        assert_relative_eq!(
            evaluate(0, 2, &t, &r).unwrap()[(0, 0)],
            2.0 * 0.49 - 1.0,
            epsilon = 1e-12
        );
        // Astigmatism U(-2,2) = rho^2 sin(2 theta).
        assert_relative_eq!(
            evaluate(-2, 2, &t, &r).unwrap()[(0, 0)],
            0.49 * 0.6f64.sin(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_center_values() {
        let t = scalar(1.1);
        let r = scalar(0.0);
        // Piston is a nonzero constant at the center.
        assert_relative_eq!(evaluate(0, 0, &t, &r).unwrap()[(0, 0)], 1.0);
        // Every polynomial with azimuthal dependence vanishes at rho = 0.
        for ZernikeIndex { l, n } in zernike_indices(6) {
            if l != 0 {
                let v = evaluate(l, n, &t, &r).unwrap()[(0, 0)];
                assert_relative_eq!(v, 0.0, epsilon = 1e-12);
            }
        }
    }

    /// Numerical orthogonality over the unit disk for a sample of index pairs.
    #[test]
    fn test_orthogonality_on_unit_disk() {
        let n_samples = 501;
        let axis: DVector<f64> = linspace(-1.0, 1.0, n_samples);
        let (xg, yg) = meshgrid(&axis, &axis);
        let (rho, theta) = cart2pol(&xg, &yg);
        let da = {
            let h = axis[1] - axis[0];
            h * h
        };

        let pairs = [
            ((0, 0), (0, 2)),
            ((-1, 1), (1, 1)),
            ((0, 2), (0, 4)),
            ((1, 1), (1, 3)),
            ((-2, 2), (2, 2)),
        ];
        for ((l1, n1), (l2, n2)) in pairs {
            let u1 = evaluate(l1, n1, &theta, &rho).unwrap();
            let u2 = evaluate(l2, n2, &theta, &rho).unwrap();
            let mut cross = 0.0;
            let mut norm1 = 0.0;
            let mut norm2 = 0.0;
            for j in 0..n_samples {
                for i in 0..n_samples {
                    if rho[(i, j)] <= 1.0 {
                        cross += u1[(i, j)] * u2[(i, j)] * da;
                        norm1 += u1[(i, j)] * u1[(i, j)] * da;
                        norm2 += u2[(i, j)] * u2[(i, j)] * da;
                    }
                }
            }
            // Tolerance dominated by the pixelated disk boundary at this
            // sampling, well below any genuinely non-orthogonal pairing.
            let bound = 0.05 * (norm1 * norm2).sqrt();
            assert!(
                cross.abs() < bound,
                "U({l1},{n1}) . U({l2},{n2}) = {cross:.4e}, bound {bound:.4e}"
            );
        }
    }
}
