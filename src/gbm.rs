//! Geometric Brownian motion: `dS = μS dt + σS dW`.
//!
//! σ comes from a range-based volatility estimator; μ is the annualized mean log
//! return plus the Itô correction `σ²/2`. Drift is notoriously poorly identified from
//! a few years of data, and the estimator says so when its standard error dominates.

use crate::bars::BarSeries;
use crate::config::{EstimatorConfig, GbmConfig};
use crate::errors::EstimationResult;
use crate::estimator::{Estimation, Estimator, Warnings};
use crate::math_utils::mean;
use crate::results::{GbmParameters, ModelType, ParameterEstimate};
use crate::volatility::estimate_volatility;

/// Drift magnitudes below this are not worth a precision warning.
const NEGLIGIBLE_DRIFT: f64 = 0.01;

/// GBM estimator.
#[derive(Debug, Clone, Default)]
pub struct GbmEstimator {
    config: EstimatorConfig,
    gbm: GbmConfig,
}

impl GbmEstimator {
    /// Create an estimator with shared and GBM-specific settings.
    pub fn new(config: EstimatorConfig, gbm: GbmConfig) -> Self {
        Self { config, gbm }
    }
}

impl Estimator for GbmEstimator {
    type Params = GbmParameters;

    fn model_type(&self) -> ModelType {
        ModelType::Gbm
    }

    fn estimate(&self, series: &BarSeries) -> EstimationResult<Estimation<GbmParameters>> {
        self.config.validate()?;
        let mut warnings = Warnings::for_model(ModelType::Gbm);
        let days = self.config.trading_days_per_year;
        let level = self.config.confidence_level;
        let returns = series.log_returns();
        let n = returns.len() as f64;

        let vol = estimate_volatility(series, self.gbm.volatility_method, days)?;
        let sigma = vol.annualized_volatility;
        let mu = mean(returns) * days + 0.5 * sigma * sigma;

        let se_sigma = sigma / (2.0 * n).sqrt() / vol.relative_efficiency.sqrt();
        let se_mu = vol.daily_volatility() / n.sqrt() * days;

        if se_mu > 0.5 * mu.abs() && mu.abs() > NEGLIGIBLE_DRIFT {
            warnings.push(format!(
                "Drift estimate has high uncertainty (SE={:.2}% vs mu={:.2}%); \
                 consider a forward-looking drift or the risk-free rate",
                se_mu * 100.0,
                mu * 100.0
            ));
        }
        log::debug!("GBM: sigma={:.4} via {:?}, mu={:.4}", sigma, vol.method, mu);

        Ok(warnings.finish(GbmParameters {
            mu: ParameterEstimate::with_standard_error("mu", mu, Some(se_mu), level),
            sigma: ParameterEstimate::with_standard_error("sigma", sigma, Some(se_sigma), level)
                .floor_lower_bound(0.0),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{generate_gbm_bars, GeneratorConfig};
    use crate::volatility::VolatilityMethod;
    use assert_approx_eq::assert_approx_eq;

    fn series(seed: u64, length: usize) -> BarSeries {
        let config = GeneratorConfig {
            length,
            seed: Some(seed),
            ..Default::default()
        };
        generate_gbm_bars(&config, 0.08, 0.20).unwrap()
    }

    #[test]
    fn test_recovers_sigma() {
        let fit = GbmEstimator::default().estimate(&series(1, 300)).unwrap();
        let sigma = fit.params.sigma.value;
        assert!((sigma - 0.20).abs() < 0.06, "sigma = {}", sigma);
    }

    #[test]
    fn test_standard_errors_follow_efficiency() {
        let data = series(2, 500);
        let n = data.log_returns().len() as f64;
        for method in [VolatilityMethod::CloseToClose, VolatilityMethod::YangZhang] {
            let estimator = GbmEstimator::new(
                EstimatorConfig::default(),
                GbmConfig {
                    volatility_method: method,
                },
            );
            let params = estimator.estimate(&data).unwrap().params;
            let expected = params.sigma.value / (2.0 * n).sqrt() / method.relative_efficiency().sqrt();
            assert_approx_eq!(params.sigma.std_error.unwrap(), expected, 1e-12);
        }
    }

    #[test]
    fn test_sigma_interval_is_floored() {
        let params = GbmEstimator::default().estimate(&series(3, 40)).unwrap().params;
        let ci = params.sigma.confidence_interval.unwrap();
        assert!(ci.lower_bound >= 0.0);
        assert!(ci.contains(params.sigma.value));
    }

    #[test]
    fn test_short_sample_warns_about_drift() {
        let fit = GbmEstimator::default().estimate(&series(4, 250)).unwrap();
        let mu = fit.params.mu.value;
        let se = fit.params.mu.std_error.unwrap();
        let warned = fit.warnings.iter().any(|w| w.contains("Drift estimate"));
        assert_eq!(warned, se > 0.5 * mu.abs() && mu.abs() > NEGLIGIBLE_DRIFT);
    }
}
