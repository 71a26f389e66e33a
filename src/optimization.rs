//! Bounded quasi-Newton minimization.
//!
//! A projected BFGS method for smooth objectives with box constraints: the
//! inverse-Hessian approximation is updated from finite-difference gradients,
//! variables pinned at an active bound are frozen for the step, and every trial
//! point is projected back into the box before an Armijo backtracking test.
//!
//! Objectives signal infeasible points by returning a large penalty rather than an
//! error, so the line search simply backs away from them.

use crate::errors::{EstimationError, EstimationResult};
use nalgebra::{DMatrix, DVector};
use std::cell::Cell;

/// A scalar function to minimize.
pub trait ObjectiveFunction {
    /// Objective value at `params`.
    fn eval(&self, params: &[f64]) -> f64;
}

impl<F> ObjectiveFunction for F
where
    F: Fn(&[f64]) -> f64,
{
    fn eval(&self, params: &[f64]) -> f64 {
        self(params)
    }
}

/// Stopping rules and finite-difference settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Iteration cap
    pub max_iter: usize,
    /// Converged when `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1)` falls to this
    pub ftol: f64,
    /// Converged when the projected gradient's largest component falls to this
    pub gtol: f64,
    /// Relative finite-difference step for gradients
    pub gradient_step: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            ftol: 1e-9,
            gtol: 1e-6,
            gradient_step: 1e-7,
        }
    }
}

/// Outcome of a minimization. Failure to converge is reported, not raised.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    /// Best point found
    pub parameters: Vec<f64>,
    /// Objective at `parameters`
    pub fval: f64,
    /// Iterations performed
    pub n_iter: usize,
    /// Objective evaluations performed
    pub n_fev: usize,
    /// Whether a convergence criterion was met
    pub converged: bool,
    /// Termination reason
    pub message: String,
}

/// Projected BFGS minimizer over a box.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundedQuasiNewton {
    config: OptimizerConfig,
}

const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

impl BoundedQuasiNewton {
    /// Create a minimizer with the given stopping rules.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Minimize `objective` from `init` subject to `bounds[i].0 <= x[i] <= bounds[i].1`.
    ///
    /// Use `f64::INFINITY` / `f64::NEG_INFINITY` for open sides.
    ///
    /// # Errors
    /// * `InvalidParameter` when `bounds` and `init` differ in length or a bound is inverted
    /// * `NumericalError` when the objective is not finite at the projected start
    pub fn minimize<O: ObjectiveFunction + ?Sized>(
        &self,
        objective: &O,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> EstimationResult<OptimizationResult> {
        let n = init.len();
        if bounds.len() != n {
            return Err(EstimationError::InvalidParameter {
                parameter: "bounds.len()".to_string(),
                value: bounds.len() as f64,
                constraint: format!("equal to init.len() = {}", n),
            });
        }
        if let Some((i, (lo, hi))) = bounds
            .iter()
            .enumerate()
            .find(|(_, (lo, hi))| lo.is_nan() || hi.is_nan() || lo > hi)
        {
            return Err(EstimationError::InvalidParameter {
                parameter: format!("bounds[{}]", i),
                value: *lo,
                constraint: format!("lower bound <= upper bound {}", hi),
            });
        }

        let n_fev = Cell::new(0usize);
        let eval = |x: &[f64]| {
            n_fev.set(n_fev.get() + 1);
            objective.eval(x)
        };

        let mut x = project(init, bounds);
        let mut fx = eval(&x);
        if !fx.is_finite() {
            return Err(EstimationError::NumericalError {
                reason: format!("objective is not finite at the initial point ({})", fx),
                operation: Some("minimize".to_string()),
            });
        }
        let mut g = self.gradient(&eval, &x, fx, bounds);
        let mut h_inv = DMatrix::<f64>::identity(n, n);
        let mut h_is_identity = true;

        for iter in 1..=self.config.max_iter {
            if projected_gradient_norm(&x, &g, bounds) <= self.config.gtol {
                return Ok(self.finish(
                    x,
                    fx,
                    iter - 1,
                    n_fev.get(),
                    true,
                    "projected gradient below tolerance",
                ));
            }

            let free: Vec<bool> = (0..n)
                .map(|i| {
                    let at_lower = x[i] <= bounds[i].0 && g[i] > 0.0;
                    let at_upper = x[i] >= bounds[i].1 && g[i] < 0.0;
                    !(at_lower || at_upper)
                })
                .collect();

            let grad = DVector::from_column_slice(&g);
            let mut direction = -(&h_inv * &grad);
            for i in 0..n {
                if !free[i] {
                    direction[i] = 0.0;
                }
            }
            if grad.dot(&direction) >= 0.0 {
                h_inv = DMatrix::identity(n, n);
                h_is_identity = true;
                direction = -grad.clone();
                for i in 0..n {
                    if !free[i] {
                        direction[i] = 0.0;
                    }
                }
            }

            let mut accepted: Option<(Vec<f64>, f64)> = None;
            let mut t: f64 = 1.0;
            for _ in 0..MAX_BACKTRACKS {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(direction.iter())
                    .map(|(xi, di)| xi + t * di)
                    .collect();
                let trial = project(&trial, bounds);
                let decrease: f64 = g
                    .iter()
                    .zip(trial.iter().zip(&x))
                    .map(|(gi, (ti, xi))| gi * (ti - xi))
                    .sum();
                if trial == x {
                    break;
                }
                if decrease >= 0.0 {
                    t *= 0.5;
                    continue;
                }
                let f_trial = eval(&trial);
                if f_trial.is_finite() && f_trial <= fx + ARMIJO_C1 * decrease {
                    accepted = Some((trial, f_trial));
                    break;
                }
                t *= 0.5;
            }

            let (x_new, f_new) = match accepted {
                Some(step) => step,
                None if !h_is_identity => {
                    log::debug!("line search failed at iteration {}; resetting curvature", iter);
                    h_inv = DMatrix::identity(n, n);
                    h_is_identity = true;
                    continue;
                }
                None => {
                    return Ok(self.finish(
                        x,
                        fx,
                        iter,
                        n_fev.get(),
                        false,
                        "line search could not reduce the objective",
                    ));
                }
            };

            let g_new = self.gradient(&eval, &x_new, f_new, bounds);
            let relative_reduction = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);

            let s = DVector::from_iterator(n, x_new.iter().zip(&x).map(|(a, b)| a - b));
            let y = DVector::from_iterator(n, g_new.iter().zip(&g).map(|(a, b)| a - b));
            let sy = s.dot(&y);
            if sy > 1e-10 * s.norm() * y.norm() && sy > 0.0 {
                let rho = 1.0 / sy;
                let identity = DMatrix::<f64>::identity(n, n);
                let left = &identity - rho * &s * y.transpose();
                let right = &identity - rho * &y * s.transpose();
                h_inv = left * &h_inv * right + rho * &s * s.transpose();
                h_is_identity = false;
            }

            x = x_new;
            fx = f_new;
            g = g_new;

            if relative_reduction <= self.config.ftol {
                return Ok(self.finish(
                    x,
                    fx,
                    iter,
                    n_fev.get(),
                    true,
                    "relative reduction below tolerance",
                ));
            }
        }

        Ok(self.finish(
            x,
            fx,
            self.config.max_iter,
            n_fev.get(),
            false,
            "iteration limit reached",
        ))
    }

    fn finish(
        &self,
        parameters: Vec<f64>,
        fval: f64,
        n_iter: usize,
        n_fev: usize,
        converged: bool,
        message: &str,
    ) -> OptimizationResult {
        log::debug!(
            "minimize: {} after {} iterations ({} evaluations), f = {}",
            message,
            n_iter,
            n_fev,
            fval
        );
        OptimizationResult {
            parameters,
            fval,
            n_iter,
            n_fev,
            converged,
            message: message.to_string(),
        }
    }

    /// Finite-difference gradient, one-sided next to a bound.
    fn gradient<E: Fn(&[f64]) -> f64>(
        &self,
        eval: &E,
        x: &[f64],
        fx: f64,
        bounds: &[(f64, f64)],
    ) -> Vec<f64> {
        let mut point = x.to_vec();
        (0..x.len())
            .map(|i| {
                let h = self.config.gradient_step * x[i].abs().max(1.0);
                let (lo, hi) = bounds[i];
                let value = if x[i] - h >= lo && x[i] + h <= hi {
                    point[i] = x[i] + h;
                    let f_plus = eval(&point);
                    point[i] = x[i] - h;
                    let f_minus = eval(&point);
                    (f_plus - f_minus) / (2.0 * h)
                } else if x[i] + h <= hi {
                    point[i] = x[i] + h;
                    (eval(&point) - fx) / h
                } else {
                    point[i] = x[i] - h;
                    (fx - eval(&point)) / h
                };
                point[i] = x[i];
                if value.is_finite() {
                    value
                } else {
                    0.0
                }
            })
            .collect()
    }
}

fn project(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&xi, &(lo, hi))| xi.clamp(lo, hi))
        .collect()
}

fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(g)
        .zip(bounds)
        .map(|((&xi, &gi), &(lo, hi))| ((xi - gi).clamp(lo, hi) - xi).abs())
        .fold(0.0, f64::max)
}
