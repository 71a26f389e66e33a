//! GARCH(1,1) by maximum likelihood.
//!
//! ```text
//! r[t] = ε[t],  ε[t] ~ N(0, h[t])
//! h[t] = ω + α·r[t-1]² + β·h[t-1],  h[0] = sample variance
//! ```
//!
//! The Gaussian negative log-likelihood is minimized with [`BoundedQuasiNewton`] over
//! `(ω/s², α, β)`, where `s²` is the sample variance; the rescaling keeps all three
//! coordinates of comparable magnitude. Standard errors come from the numerical
//! Hessian at the optimum, mapped back to the original `ω` scale, and the delta method
//! carries them to persistence and unconditional variance.

use crate::bars::BarSeries;
use crate::config::{EstimatorConfig, GarchConfig};
use crate::errors::{validate_all_finite, EstimationError, EstimationResult};
use crate::estimator::{Estimation, Estimator, Warnings};
use crate::linear_algebra::{
    covariance_from_hessian, delta_method_standard_error, numerical_hessian, standard_error,
    HESSIAN_EPSILON,
};
use crate::math_utils::{mean, sample_variance};
use crate::optimization::{BoundedQuasiNewton, OptimizerConfig};
use crate::results::{GarchParameters, ModelType, ParameterEstimate};
use nalgebra::DMatrix;

/// Objective value for infeasible parameters.
const PENALTY: f64 = 1e10;
/// Returns required to fit at all.
const MIN_RETURNS: usize = 10;
/// Below this many returns the fit is flagged as unstable.
const STABLE_RETURNS: usize = 100;
/// Upper bound on α and β individually.
const MAX_COEFFICIENT: f64 = 0.999;
/// Persistence after rescaling a non-stationary fit.
const RESCALED_PERSISTENCE: f64 = 0.98;
/// Lower bound on ω / sample variance.
const MIN_SCALED_OMEGA: f64 = 1e-8;

/// Gaussian negative log-likelihood of GARCH(1,1), up to constants.
///
/// Only the variance recursion is checked here (`h[t] > 0`); stationarity and sign
/// constraints are the optimizer's business. That keeps the function smooth around
/// boundary optima, where the Hessian still has to be differenced.
pub fn garch_negative_log_likelihood(
    returns: &[f64],
    initial_variance: f64,
    omega: f64,
    alpha: f64,
    beta: f64,
) -> f64 {
    let mut h = initial_variance;
    let mut nll = 0.0;
    for t in 1..returns.len() {
        h = omega + alpha * returns[t - 1] * returns[t - 1] + beta * h;
        if !(h.is_finite() && h > 0.0) {
            return PENALTY;
        }
        nll += h.ln() + returns[t] * returns[t] / h;
    }
    0.5 * nll
}

/// Conditional variance path `h[0..n]` for fitted parameters.
pub fn conditional_variances(
    returns: &[f64],
    initial_variance: f64,
    omega: f64,
    alpha: f64,
    beta: f64,
) -> Vec<f64> {
    let mut h = Vec::with_capacity(returns.len());
    if returns.is_empty() {
        return h;
    }
    h.push(initial_variance);
    for t in 1..returns.len() {
        let prev = h[t - 1];
        h.push(omega + alpha * returns[t - 1] * returns[t - 1] + beta * prev);
    }
    h
}

/// GARCH(1,1) estimator.
#[derive(Debug, Clone, Default)]
pub struct GarchEstimator {
    config: EstimatorConfig,
    garch: GarchConfig,
}

impl GarchEstimator {
    /// Create an estimator with shared and GARCH-specific settings.
    pub fn new(config: EstimatorConfig, garch: GarchConfig) -> Self {
        Self { config, garch }
    }

    /// Fit directly to a return series.
    ///
    /// # Errors
    /// * `InsufficientData` below 10 returns
    /// * `NumericalError` for non-finite returns or a zero-variance series
    pub fn estimate_returns(&self, returns: &[f64]) -> EstimationResult<Estimation<GarchParameters>> {
        self.config.validate()?;
        self.garch.validate()?;
        let n = returns.len();
        if n < MIN_RETURNS {
            return Err(EstimationError::InsufficientData {
                required: MIN_RETURNS,
                actual: n,
            });
        }
        validate_all_finite(returns, "returns")?;

        let mut warnings = Warnings::for_model(ModelType::Garch);
        if n < STABLE_RETURNS {
            warnings.push(format!(
                "Fewer than {} observations ({}); GARCH estimates may be unstable",
                STABLE_RETURNS, n
            ));
        }

        let sample_var = sample_variance(returns);
        if sample_var <= 0.0 {
            return Err(EstimationError::NumericalError {
                reason: "returns have zero variance".to_string(),
                operation: Some("GARCH likelihood".to_string()),
            });
        }

        // Coordinates are (ω / sample_var, α, β)
        let scaled_nll = |p: &[f64]| {
            garch_negative_log_likelihood(returns, sample_var, p[0] * sample_var, p[1], p[2])
        };
        let objective = |p: &[f64]| {
            let (omega, alpha, beta) = (p[0], p[1], p[2]);
            if omega <= 0.0 || alpha < 0.0 || beta < 0.0 || alpha + beta >= 1.0 {
                return PENALTY;
            }
            scaled_nll(p)
        };

        let optimizer = BoundedQuasiNewton::new(OptimizerConfig {
            max_iter: self.garch.max_iterations,
            ftol: self.garch.tolerance,
            ..Default::default()
        });
        let fit = optimizer.minimize(
            &objective,
            &[0.05, 0.08, 0.85],
            &[
                (MIN_SCALED_OMEGA, f64::INFINITY),
                (0.0, MAX_COEFFICIENT),
                (0.0, MAX_COEFFICIENT),
            ],
        )?;
        log::debug!(
            "GARCH optimizer: {} after {} iterations, {} evaluations, nll={:.6}",
            fit.message,
            fit.n_iter,
            fit.n_fev,
            fit.fval
        );
        if !fit.converged {
            warnings.push(format!("Optimization did not converge: {}", fit.message));
        }

        let omega = fit.parameters[0] * sample_var;
        let (mut alpha, mut beta) = (fit.parameters[1], fit.parameters[2]);
        if alpha + beta >= 1.0 {
            warnings.push(format!(
                "alpha + beta = {:.4} >= 1: variance process is non-stationary; \
                 rescaled to {}",
                alpha + beta,
                RESCALED_PERSISTENCE
            ));
            let total = alpha + beta;
            alpha = alpha / total * RESCALED_PERSISTENCE;
            beta = beta / total * RESCALED_PERSISTENCE;
        }
        let persistence = alpha + beta;
        let unconditional_variance = omega / (1.0 - persistence);

        let inference = HessianInference::new(
            &numerical_hessian(&scaled_nll, &fit.parameters, HESSIAN_EPSILON),
            sample_var,
        );
        let [se_omega, se_alpha, se_beta] = inference.std_errors;
        let covariance = inference.covariance;
        if !inference.positive_definite {
            warnings.push(
                "Hessian is not positive definite at the optimum; \
                 affected standard errors are unavailable",
            );
        }

        let se_persistence = match (&covariance, se_alpha, se_beta) {
            (Some(c), Some(_), Some(_)) => delta_method_standard_error(c, &[0.0, 1.0, 1.0]),
            _ => None,
        };
        let se_unconditional = match (&covariance, se_omega, se_persistence) {
            (Some(c), Some(_), Some(_)) => {
                let d_omega = 1.0 / (1.0 - persistence);
                let d_persistence = omega / (1.0 - persistence).powi(2);
                delta_method_standard_error(c, &[d_omega, d_persistence, d_persistence])
            }
            _ => None,
        };

        let days = self.config.trading_days_per_year;
        let level = self.config.confidence_level;
        let mu = mean(returns) * days;
        let se_mu = (sample_var / n as f64).sqrt() * days;

        let estimate = |name: &str, value: f64, se: Option<f64>| {
            ParameterEstimate::with_standard_error(name, value, se, level)
        };
        Ok(warnings.finish(GarchParameters {
            mu: estimate("mu", mu, Some(se_mu)),
            omega: estimate("omega", omega, se_omega),
            alpha: estimate("alpha", alpha, se_alpha),
            beta: estimate("beta", beta, se_beta),
            persistence: estimate("persistence", persistence, se_persistence),
            unconditional_variance: estimate(
                "unconditional_variance",
                unconditional_variance,
                se_unconditional,
            ),
        }))
    }
}

/// Covariance and standard errors of `(ω, α, β)` from the scaled-likelihood Hessian.
struct HessianInference {
    covariance: Option<DMatrix<f64>>,
    std_errors: [Option<f64>; 3],
    positive_definite: bool,
}

impl HessianInference {
    fn new(scaled_hessian: &DMatrix<f64>, sample_var: f64) -> Self {
        let covariance = covariance_from_hessian(scaled_hessian)
            .map(|scaled| unscale_covariance(&scaled, sample_var));
        let se = |i: usize| covariance.as_ref().and_then(|c| standard_error(c, i));
        let std_errors = [se(0), se(1), se(2)];
        Self {
            positive_definite: std_errors.iter().all(Option::is_some),
            covariance,
            std_errors,
        }
    }
}

/// Map a covariance over `(ω/s², α, β)` to one over `(ω, α, β)`.
fn unscale_covariance(scaled: &DMatrix<f64>, sample_var: f64) -> DMatrix<f64> {
    let mut jacobian = DMatrix::identity(3, 3);
    jacobian[(0, 0)] = sample_var;
    &jacobian * scaled * &jacobian
}

impl Estimator for GarchEstimator {
    type Params = GarchParameters;

    fn model_type(&self) -> ModelType {
        ModelType::Garch
    }

    fn estimate(&self, series: &BarSeries) -> EstimationResult<Estimation<GarchParameters>> {
        self.estimate_returns(series.log_returns())
    }
}
