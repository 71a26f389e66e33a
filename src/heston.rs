//! Heston stochastic volatility from OHLC data.
//!
//! ```text
//! dS = μS dt + √V S dW₁
//! dV = κ(θ − V) dt + σᵥ √V dW₂,   corr(dW₁, dW₂) = ρ
//! ```
//!
//! This is a regression approximation on a Parkinson variance proxy, not an
//! option-implied calibration. Discretizing the variance equation gives
//! `ΔV[t] = κθΔt − κΔt·V[t] + noise`, so an OLS fit `ΔV = a + b·V` yields
//! `κ = −b/Δt` and `θ = −a/b`. The residual spread gives σᵥ, and the correlation of
//! returns with variance changes gives ρ.
//!
//! `v0` and `theta` are per-period variances; `kappa` and `sigma_v` are per year.
//! σᵥ carries no interval: the residual-variance estimator has no closed-form error.

use crate::bars::BarSeries;
use crate::bootstrap::{bootstrap_statistic, ResamplingScheme};
use crate::config::{EstimatorConfig, HestonConfig};
use crate::confidence_intervals::z_critical;
use crate::errors::{EstimationError, EstimationResult};
use crate::estimator::{Estimation, Estimator, Warnings};
use crate::math_utils::{correlation, linear_regression, mean, moving_average, variance};
use crate::results::{HestonParameters, ModelType, ParameterEstimate};
use crate::volatility::parkinson_proxy;

/// Variance differences required for the regression.
const MIN_DIFFERENCES: usize = 10;
/// Below this many bars the fit is flagged as unreliable.
const RELIABLE_BARS: usize = 60;
/// Admissible mean-reversion speeds (per year).
const KAPPA_RANGE: (f64, f64) = (0.1, 50.0);
/// Mean-reversion speed used when the regression shows none.
const FALLBACK_KAPPA: f64 = 1.0;
/// Vol-of-vol used when the residuals cannot identify it.
const FALLBACK_SIGMA_V: f64 = 0.5;
/// Correlation bound keeping the variance process well defined.
const MAX_ABS_RHO: f64 = 0.99;

/// Heston regression estimator.
#[derive(Debug, Clone, Default)]
pub struct HestonEstimator {
    config: EstimatorConfig,
    heston: HestonConfig,
}

impl HestonEstimator {
    /// Create an estimator with shared and Heston-specific settings.
    pub fn new(config: EstimatorConfig, heston: HestonConfig) -> Self {
        Self { config, heston }
    }

    /// Per-bar Parkinson variance, smoothed by the configured moving average.
    pub fn variance_proxy(&self, series: &BarSeries) -> Vec<f64> {
        let raw = parkinson_proxy(series.highs(), series.lows());
        if self.heston.variance_window > 1 {
            moving_average(&raw, self.heston.variance_window)
        } else {
            raw
        }
    }
}

impl Estimator for HestonEstimator {
    type Params = HestonParameters;

    fn model_type(&self) -> ModelType {
        ModelType::Heston
    }

    fn estimate(&self, series: &BarSeries) -> EstimationResult<Estimation<HestonParameters>> {
        self.config.validate()?;
        self.heston.validate()?;
        let mut warnings = Warnings::for_model(ModelType::Heston);
        let dt = self.config.dt();
        let days = self.config.trading_days_per_year;
        let level = self.config.confidence_level;

        if series.len() < RELIABLE_BARS {
            warnings.push(format!(
                "Fewer than {} observations ({}); Heston estimates may be unreliable",
                RELIABLE_BARS,
                series.len()
            ));
        }

        let proxy = self.variance_proxy(series);
        let n_diff = proxy.len().saturating_sub(1);
        if n_diff < MIN_DIFFERENCES {
            return Err(EstimationError::InsufficientData {
                required: MIN_DIFFERENCES,
                actual: n_diff,
            });
        }
        let lagged = &proxy[..n_diff];
        let delta_v: Vec<f64> = proxy.windows(2).map(|w| w[1] - w[0]).collect();
        let mean_v = mean(&proxy);

        let regression = linear_regression(lagged, &delta_v)?;
        let (a, b) = (regression.alpha, regression.beta);

        let mut fallback = false;
        let (mut kappa, mut theta) = if b >= 0.0 {
            warnings.push(format!(
                "Variance process shows no mean reversion (slope {:.4e} >= 0); \
                 Heston may not suit this data",
                b
            ));
            fallback = true;
            (FALLBACK_KAPPA, mean_v)
        } else {
            (-b / dt, -a / b)
        };
        if theta <= 0.0 {
            warnings.push(format!(
                "Estimated theta = {:.4e} <= 0; using mean variance proxy instead",
                theta
            ));
            fallback = true;
            theta = mean_v;
        }
        let clamped = kappa.clamp(KAPPA_RANGE.0, KAPPA_RANGE.1);
        if clamped != kappa {
            log::debug!("Heston: kappa {:.4} clamped to {:.4}", kappa, clamped);
            kappa = clamped;
        }

        let var_residuals = variance(&regression.residuals, 2);
        let sigma_v = if mean_v > 0.0 && var_residuals > 0.0 {
            (var_residuals / (mean_v * dt)).sqrt()
        } else {
            warnings.push(format!(
                "Could not estimate sigma_v reliably; using fallback {}",
                FALLBACK_SIGMA_V
            ));
            FALLBACK_SIGMA_V
        };

        let returns = series.log_returns();
        let aligned = &returns[..n_diff.min(returns.len())];
        let raw_rho = correlation(aligned, &delta_v[..aligned.len()]);
        let rho = if raw_rho.is_finite() {
            raw_rho.clamp(-MAX_ABS_RHO, MAX_ABS_RHO)
        } else {
            warnings.push("Return/variance correlation is undefined; using rho = 0");
            0.0
        };

        let v0_window = self.heston.v0_window;
        let v0_stat = |x: &[f64]| mean(&x[x.len().saturating_sub(v0_window)..]);
        let v0 = v0_stat(&proxy[..]);
        let v0_bootstrap = bootstrap_statistic(
            &proxy,
            v0_stat,
            self.config.n_bootstrap,
            level,
            ResamplingScheme::Iid,
        )?;
        let v0_ci = v0_bootstrap.confidence_interval;
        let se_v0 = v0_ci.width() / (2.0 * z_critical(level));

        let mu = mean(returns) * days + 0.5 * theta;

        let se_kappa = regression.se_beta / dt;
        let se_theta = if fallback || a == 0.0 || b == 0.0 {
            None
        } else {
            Some(
                theta.abs()
                    * ((regression.se_alpha / a).powi(2) + (regression.se_beta / b).powi(2)).sqrt(),
            )
        };
        let n_corr = aligned.len();
        let se_rho = (n_corr > 3).then(|| 1.0 / ((n_corr - 3) as f64).sqrt());
        let se_mu = theta.sqrt() / (returns.len() as f64).sqrt() * days;

        log::debug!(
            "Heston: kappa={:.4}, theta={:.4e}, sigma_v={:.4}, rho={:.4}, v0={:.4e}",
            kappa,
            theta,
            sigma_v,
            rho,
            v0
        );

        Ok(warnings.finish(HestonParameters {
            mu: ParameterEstimate::with_standard_error("mu", mu, Some(se_mu), level),
            v0: ParameterEstimate::with_interval("v0", v0, Some(se_v0), v0_ci),
            kappa: ParameterEstimate::with_standard_error("kappa", kappa, Some(se_kappa), level),
            theta: ParameterEstimate::with_standard_error("theta", theta, se_theta, level),
            sigma_v: ParameterEstimate::point("sigma_v", sigma_v),
            rho: ParameterEstimate::with_standard_error("rho", rho, se_rho, level),
        }))
    }
}
