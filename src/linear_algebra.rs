//! Linear algebra for likelihood inference.
//!
//! Central-difference Hessians of an objective, Fisher-information covariance
//! (the inverted Hessian of a negative log-likelihood), delta-method standard errors
//! of derived quantities, and SVD least squares.

use crate::errors::{EstimationError, EstimationResult};
use nalgebra::{DMatrix, DVector};

/// Default finite-difference step for [`numerical_hessian`].
pub const HESSIAN_EPSILON: f64 = 1e-5;

/// Hessian of `f` at `x` by symmetric central differences.
///
/// `H[i][j] = (f(x+εeᵢ+εeⱼ) − f(x+εeᵢ−εeⱼ) − f(x−εeᵢ+εeⱼ) + f(x−εeᵢ−εeⱼ)) / 4ε²`,
/// which on the diagonal reduces to a second difference with step 2ε.
pub fn numerical_hessian<F>(f: F, x: &[f64], epsilon: f64) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = x.len();
    let mut hessian = DMatrix::zeros(n, n);
    let mut point = x.to_vec();

    let mut eval = |di: f64, i: usize, dj: f64, j: usize| {
        point.copy_from_slice(x);
        point[i] += di;
        point[j] += dj;
        f(&point)
    };

    for i in 0..n {
        for j in i..n {
            let f_pp = eval(epsilon, i, epsilon, j);
            let f_pm = eval(epsilon, i, -epsilon, j);
            let f_mp = eval(-epsilon, i, epsilon, j);
            let f_mm = eval(-epsilon, i, -epsilon, j);
            let value = (f_pp - f_pm - f_mp + f_mm) / (4.0 * epsilon * epsilon);
            hessian[(i, j)] = value;
            hessian[(j, i)] = value;
        }
    }
    hessian
}

/// Covariance matrix as the inverse of a negative log-likelihood Hessian.
///
/// `None` when the Hessian is singular or contains non-finite entries.
pub fn covariance_from_hessian(hessian: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if hessian.iter().any(|v| !v.is_finite()) {
        return None;
    }
    hessian
        .clone()
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
}

/// Square root of the `index`-th diagonal entry, if positive.
///
/// A non-positive variance signals a Hessian that is not positive definite.
pub fn standard_error(covariance: &DMatrix<f64>, index: usize) -> Option<f64> {
    if index >= covariance.nrows() {
        return None;
    }
    let var = covariance[(index, index)];
    (var.is_finite() && var > 0.0).then(|| var.sqrt())
}

/// Delta-method standard error `√(∇gᵀ Σ ∇g)` of a derived quantity.
pub fn delta_method_standard_error(covariance: &DMatrix<f64>, gradient: &[f64]) -> Option<f64> {
    if gradient.len() != covariance.nrows() {
        return None;
    }
    let g = DVector::from_column_slice(gradient);
    let var = (g.transpose() * covariance * &g)[(0, 0)];
    (var.is_finite() && var > 0.0).then(|| var.sqrt())
}

/// Minimum-norm least-squares solution of `a·x ≈ b` via SVD.
pub fn least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> EstimationResult<DVector<f64>> {
    if a.nrows() != b.len() {
        return Err(EstimationError::InvalidParameter {
            parameter: "b.len()".to_string(),
            value: b.len() as f64,
            constraint: format!("equal to a.nrows() = {}", a.nrows()),
        });
    }
    a.clone()
        .svd(true, true)
        .solve(b, 1e-12)
        .map_err(|reason| EstimationError::NumericalError {
            reason: reason.to_string(),
            operation: Some("least_squares".to_string()),
        })
}
