//! Shared grid helpers: axis construction, meshing and polar conversion.
//!
//! Grids are values, recomputed per call and never mutated in place. The map
//! convention throughout the crate is `map[(row, col)]` sampled at
//! `(x = x_axis[col], y = y_axis[row])`, matching the row-major beam-map
//! layout of the measured data.

use nalgebra::{DMatrix, DVector};

/// `n` evenly spaced samples covering `[start, end]` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> DVector<f64> {
    if n == 1 {
        return DVector::from_element(1, start);
    }
    let step = (end - start) / (n - 1) as f64;
    DVector::from_fn(n, |i, _| start + step * i as f64)
}

/// Cartesian product of two axes into coordinate maps.
///
/// Returns `(x_grid, y_grid)` of shape `(y.len(), x.len())` where
/// `x_grid[(i, j)] = x[j]` and `y_grid[(i, j)] = y[i]`.
pub fn meshgrid(x: &DVector<f64>, y: &DVector<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let (nr, nc) = (y.len(), x.len());
    let x_grid = DMatrix::from_fn(nr, nc, |_, j| x[j]);
    let y_grid = DMatrix::from_fn(nr, nc, |i, _| y[i]);
    (x_grid, y_grid)
}

/// Elementwise Cartesian to polar conversion: `(rho, theta)` with
/// `theta = atan2(y, x)`.
pub fn cart2pol(x: &DMatrix<f64>, y: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let rho = x.zip_map(y, |xv, yv| (xv * xv + yv * yv).sqrt());
    let theta = x.zip_map(y, |xv, yv| yv.atan2(xv));
    (rho, theta)
}

/// Zero every element of `map` strictly outside the circle of `radius`
/// centered on the origin of the `(x, y)` coordinate maps.
pub fn zero_outside_radius(map: &mut DMatrix<f64>, x: &DMatrix<f64>, y: &DMatrix<f64>, radius: f64) {
    let r2 = radius * radius;
    for j in 0..map.ncols() {
        for i in 0..map.nrows() {
            let (xv, yv) = (x[(i, j)], y[(i, j)]);
            if xv * xv + yv * yv > r2 {
                map[(i, j)] = 0.0;
            }
        }
    }
}
