//! Interpolation between the sparse actuator layout and the dense working
//! grid.
//!
//! Forward direction (lookup construction): scattered-data cubic
//! interpolation — a cubic radial-basis surface (`phi(r) = r^3` plus an
//! affine term) through the per-actuator samples, evaluated on the dense
//! grid and zeroed outside the convex hull of the samples, which reproduces
//! the no-correction-outside-measured-coverage rule.
//!
//! Inverse direction (lookup writing): regular-grid bilinear interpolation
//! of a dense map back at the fixed actuator positions. The two directions
//! are near-inverses only; the disagreement is bounded by interpolation
//! error and is a documented property, not a defect.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, RoofError};

/// Scattered-data cubic interpolation onto a dense grid.
///
/// `px`, `py`, `values` are the sample positions and values (equal lengths).
/// The result has shape `(y_axis.len(), x_axis.len())` with zeros at every
/// grid node outside the convex hull of the samples.
///
/// Fails with [`RoofError::InterpolationDegenerate`] when fewer than 4
/// samples are given or the samples are collinear, since no surface is
/// supported in either case.
pub fn interpolate_scattered_cubic(
    px: &[f64],
    py: &[f64],
    values: &[f64],
    x_axis: &DVector<f64>,
    y_axis: &DVector<f64>,
) -> Result<DMatrix<f64>> {
    let n = px.len();
    if py.len() != n || values.len() != n {
        return Err(RoofError::DimensionMismatch {
            expected: format!("{n} sample positions and values"),
            found: format!("py: {}, values: {}", py.len(), values.len()),
        });
    }
    if n < 4 || is_collinear(px, py) {
        return Err(RoofError::InterpolationDegenerate { points: n });
    }

    // Radial-basis system with affine side conditions:
    //   [ A  P ] [w]   [f]
    //   [ P' 0 ] [c] = [0]
    // where A[i][j] = |p_i - p_j|^3 and P = [1, x, y].
    let dim = n + 3;
    let mut a = DMatrix::<f64>::zeros(dim, dim);
    let mut rhs = DVector::<f64>::zeros(dim);
    for i in 0..n {
        for j in 0..n {
            a[(i, j)] = dist(px[i], py[i], px[j], py[j]).powi(3);
        }
        a[(i, n)] = 1.0;
        a[(i, n + 1)] = px[i];
        a[(i, n + 2)] = py[i];
        a[(n, i)] = 1.0;
        a[(n + 1, i)] = px[i];
        a[(n + 2, i)] = py[i];
        rhs[i] = values[i];
    }

    let svd = a.svd(true, true);
    let sol = svd
        .solve(&rhs, 1e-12)
        .map_err(|_| RoofError::InterpolationDegenerate { points: n })?;

    let hull = convex_hull(px, py);
    let out = DMatrix::from_fn(y_axis.len(), x_axis.len(), |i, j| {
        let (qx, qy) = (x_axis[j], y_axis[i]);
        if !inside_hull(&hull, qx, qy) {
            return 0.0;
        }
        let mut v = sol[n] + sol[n + 1] * qx + sol[n + 2] * qy;
        for k in 0..n {
            v += sol[k] * dist(qx, qy, px[k], py[k]).powi(3);
        }
        v
    });
    Ok(out)
}

/// Bilinear interpolation of a regular-grid map at scattered query points.
///
/// `map[(i, j)]` is sampled at `(x_axis[j], y_axis[i])`; axes must be
/// evenly spaced ascending. Queries are clamped to the grid boundary.
pub fn interpolate_regular_bilinear(
    x_axis: &DVector<f64>,
    y_axis: &DVector<f64>,
    map: &DMatrix<f64>,
    qx: &[f64],
    qy: &[f64],
) -> Result<Vec<f64>> {
    if x_axis.len() < 2 || y_axis.len() < 2 {
        return Err(RoofError::InvalidResolution(x_axis.len().min(y_axis.len())));
    }
    if map.shape() != (y_axis.len(), x_axis.len()) {
        return Err(RoofError::DimensionMismatch {
            expected: format!("map shape ({}, {})", y_axis.len(), x_axis.len()),
            found: format!("{:?}", map.shape()),
        });
    }
    if qx.len() != qy.len() {
        return Err(RoofError::DimensionMismatch {
            expected: format!("{} query x positions", qx.len()),
            found: format!("{} query y positions", qy.len()),
        });
    }

    let out = qx
        .iter()
        .zip(qy)
        .map(|(&x, &y)| {
            let (j0, tx) = cell(x_axis, x);
            let (i0, ty) = cell(y_axis, y);
            let v00 = map[(i0, j0)];
            let v01 = map[(i0, j0 + 1)];
            let v10 = map[(i0 + 1, j0)];
            let v11 = map[(i0 + 1, j0 + 1)];
            (1.0 - ty) * ((1.0 - tx) * v00 + tx * v01) + ty * ((1.0 - tx) * v10 + tx * v11)
        })
        .collect();
    Ok(out)
}

/// Locate the grid cell containing `q` and the fractional position within
/// it, clamped to the axis range.
fn cell(axis: &DVector<f64>, q: f64) -> (usize, f64) {
    let n = axis.len();
    let step = axis[1] - axis[0];
    let t = ((q - axis[0]) / step).clamp(0.0, (n - 1) as f64);
    let i = (t.floor() as usize).min(n - 2);
    (i, t - i as f64)
}

fn dist(x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    ((x0 - x1).powi(2) + (y0 - y1).powi(2)).sqrt()
}

/// True when all points lie on one line (within a relative tolerance).
fn is_collinear(px: &[f64], py: &[f64]) -> bool {
    let n = px.len() as f64;
    let mx = px.iter().sum::<f64>() / n;
    let my = py.iter().sum::<f64>() / n;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (&x, &y) in px.iter().zip(py) {
        sxx += (x - mx) * (x - mx);
        sxy += (x - mx) * (y - my);
        syy += (y - my) * (y - my);
    }
    let det = sxx * syy - sxy * sxy;
    let trace = sxx + syy;
    trace == 0.0 || det < 1e-12 * trace * trace
}

/// Convex hull of the sample points (monotone chain), counterclockwise.
fn convex_hull(px: &[f64], py: &[f64]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = px.iter().copied().zip(py.iter().copied()).collect();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    pts.dedup();

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Point-in-convex-polygon test; boundary points count as inside.
fn inside_hull(hull: &[(f64, f64)], x: f64, y: f64) -> bool {
    if hull.len() < 3 {
        return false;
    }
    let m = hull.len();
    for i in 0..m {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % m];
        let cross = (x1 - x0) * (y - y0) - (y1 - y0) * (x - x0);
        let scale = dist(x0, y0, x1, y1).max(1.0);
        if cross < -1e-9 * scale {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    use crate::grid::linspace;

    #[test]
    fn test_scattered_reproduces_affine_fields() {
        // Ring of 12 samples of f = 2x + 3y - 1; the affine term of the
        // radial-basis surface must reproduce it exactly inside the hull.
        let n = 12;
        let (mut px, mut py, mut values) = (Vec::new(), Vec::new(), Vec::new());
        for k in 0..n {
            let ang = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            let (x, y) = (2.0 * ang.cos(), 2.0 * ang.sin());
            px.push(x);
            py.push(y);
            values.push(2.0 * x + 3.0 * y - 1.0);
        }
        let axis = linspace(-2.0, 2.0, 21);
        let map = interpolate_scattered_cubic(&px, &py, &values, &axis, &axis).unwrap();

        for j in 0..21 {
            for i in 0..21 {
                let (x, y) = (axis[j], axis[i]);
                if x * x + y * y <= 1.5 * 1.5 {
                    // Comfortably inside the hull.
                    assert_relative_eq!(map[(i, j)], 2.0 * x + 3.0 * y - 1.0, epsilon = 1e-7);
                }
            }
        }
        // Grid corners are outside the hull and forced to zero.
        assert_eq!(map[(0, 0)], 0.0);
        assert_eq!(map[(20, 20)], 0.0);
    }

    #[test]
    fn test_scattered_exact_at_samples() {
        let px = [0.0, 1.0, 0.0, -1.0, 0.0, 0.6];
        let py = [0.0, 0.0, 1.0, 0.0, -1.0, 0.4];
        let values = [1.0, -0.5, 2.0, 0.3, 0.8, 1.4];
        // Evaluate on axes that pass exactly through two sample positions.
        let x_axis = DVector::from_vec(vec![0.0, 0.6]);
        let y_axis = DVector::from_vec(vec![0.0, 0.4]);
        let map = interpolate_scattered_cubic(&px, &py, &values, &x_axis, &y_axis).unwrap();
        assert_relative_eq!(map[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(map[(1, 1)], 1.4, epsilon = 1e-9);
    }

    #[test]
    fn test_scattered_degenerate_inputs() {
        let axis = linspace(-1.0, 1.0, 5);
        // Too few points.
        let err = interpolate_scattered_cubic(
            &[0.0, 1.0, 0.5],
            &[0.0, 0.0, 1.0],
            &[1.0, 2.0, 3.0],
            &axis,
            &axis,
        );
        assert!(matches!(
            err,
            Err(RoofError::InterpolationDegenerate { points: 3 })
        ));
        // Collinear points.
        let px: Vec<f64> = (0..10).map(|k| k as f64).collect();
        let py: Vec<f64> = px.iter().map(|x| 0.5 * x + 1.0).collect();
        let values = vec![1.0; 10];
        let err = interpolate_scattered_cubic(&px, &py, &values, &axis, &axis);
        assert!(matches!(
            err,
            Err(RoofError::InterpolationDegenerate { points: 10 })
        ));
    }

    #[test]
    fn test_bilinear_reproduces_plane() {
        let axis = linspace(-3.0, 3.0, 13);
        let map = DMatrix::from_fn(13, 13, |i, j| 0.7 * axis[j] - 1.3 * axis[i] + 0.2);
        let qx = [0.25, -2.7, 1.9];
        let qy = [-0.75, 2.1, 0.0];
        let out = interpolate_regular_bilinear(&axis, &axis, &map, &qx, &qy).unwrap();
        for (k, v) in out.iter().enumerate() {
            assert_relative_eq!(*v, 0.7 * qx[k] - 1.3 * qy[k] + 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bilinear_clamps_outside_queries() {
        let axis = linspace(0.0, 1.0, 2);
        let map = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 2.0, 3.0]);
        let out = interpolate_regular_bilinear(&axis, &axis, &map, &[5.0], &[5.0]).unwrap();
        assert_relative_eq!(out[0], 3.0);
    }
}
