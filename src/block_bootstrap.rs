//! Block size for the block bootstrap.
//!
//! Resampling contiguous blocks preserves the dependence a series carries up to the
//! block length. The recommended size blends two rules: twice the decorrelation lag
//! of the (by default squared) returns, after Politis & White (2004), and the `√n`
//! rule of thumb, weighted 0.7 / 0.3.
//!
//! The block-size interval comes from block-resampling the analyzed series and
//! recomputing a lighter lag statistic on each resample.

use crate::bars::BarSeries;
use crate::bootstrap::{bootstrap_statistic, ResamplingScheme};
use crate::config::{BlockBootstrapConfig, EstimatorConfig};
use crate::confidence_intervals::{z_critical, ConfidenceInterval, ConfidenceIntervalMethod};
use crate::errors::{EstimationError, EstimationResult};
use crate::estimator::{Estimation, Estimator, Warnings};
use crate::math_utils::{constants::DEFAULT_MAX_LAG, decorrelation_lag};
use crate::results::{BlockBootstrapParameters, ModelType, ParameterEstimate};

/// Below this many returns the estimate is flagged as unreliable.
const RELIABLE_RETURNS: usize = 100;
/// Weight of the ACF rule in the blended block size; `√n` gets the rest.
const ACF_WEIGHT: f64 = 0.7;
/// Resample cap for the block-size interval.
const MAX_INTERVAL_RESAMPLES: usize = 500;
/// Smallest block used when resampling for the interval.
const MIN_RESAMPLING_BLOCK: usize = 5;
/// Resamples shorter than this report the minimum block size.
const MIN_STATISTIC_LENGTH: usize = 50;
/// Lag cap of the per-resample statistic.
const STATISTIC_MAX_LAG: usize = 50;

/// Block-size estimator.
#[derive(Debug, Clone, Default)]
pub struct BlockBootstrapEstimator {
    config: EstimatorConfig,
    block: BlockBootstrapConfig,
}

impl BlockBootstrapEstimator {
    /// Create an estimator with shared and block-bootstrap settings.
    pub fn new(config: EstimatorConfig, block: BlockBootstrapConfig) -> Self {
        Self { config, block }
    }

    /// Series whose autocorrelation drives the block size.
    pub fn analyzed_series(&self, returns: &[f64]) -> Vec<f64> {
        if self.block.use_squared_returns {
            returns.iter().map(|r| r * r).collect()
        } else {
            returns.to_vec()
        }
    }

    /// Fit directly to a return series.
    ///
    /// # Errors
    /// * `InsufficientData` below `3 × min_block_size` returns
    pub fn estimate_returns(
        &self,
        returns: &[f64],
    ) -> EstimationResult<Estimation<BlockBootstrapParameters>> {
        self.config.validate()?;
        self.block.validate()?;
        let n = returns.len();
        let (min_block, max_block) = (self.block.min_block_size, self.block.max_block_size);
        let required = 3 * min_block;
        if n < required {
            return Err(EstimationError::InsufficientData {
                required,
                actual: n,
            });
        }

        let mut warnings = Warnings::for_model(ModelType::BlockBootstrap);
        if n < RELIABLE_RETURNS {
            warnings.push(format!(
                "Fewer than {} observations ({}); block size estimate may be unreliable",
                RELIABLE_RETURNS, n
            ));
        }

        let series = self.analyzed_series(returns);
        let significance = self.block.significance_level;
        let max_lag = (n / 4).min(DEFAULT_MAX_LAG);
        let lag = decorrelation_lag(&series, significance, max_lag);

        let raw = (ACF_WEIGHT * 2.0 * lag as f64 + (1.0 - ACF_WEIGHT) * (n as f64).sqrt()).round()
            as usize;
        let effective_max = max_block.min(n / 3);
        let block_size = raw.clamp(min_block, max_block).min(n / 3);
        if block_size != raw {
            warnings.push(format!(
                "Block size clamped from {} to {} (valid range: {}-{})",
                raw, block_size, min_block, effective_max
            ));
        }

        let level = self.config.confidence_level;
        let statistic = |x: &[f64]| {
            if x.len() < MIN_STATISTIC_LENGTH {
                return min_block as f64;
            }
            let cap = (x.len() / 4).min(STATISTIC_MAX_LAG);
            2.0 * decorrelation_lag(x, significance, cap) as f64
        };
        let replicates = bootstrap_statistic(
            &series,
            statistic,
            self.config.n_bootstrap.min(MAX_INTERVAL_RESAMPLES),
            level,
            ResamplingScheme::Block {
                block_size: (block_size / 2).max(MIN_RESAMPLING_BLOCK).min(n),
            },
        )?;

        let (lo, hi) = (min_block as f64, effective_max as f64);
        let lower = replicates.confidence_interval.lower_bound.clamp(lo, hi);
        let upper = replicates.confidence_interval.upper_bound.clamp(lower, hi);
        let block_ci = ConfidenceInterval {
            confidence_level: level,
            lower_bound: lower,
            upper_bound: upper,
            method: ConfidenceIntervalMethod::BootstrapPercentile,
        };
        let se_block = block_ci.width() / (2.0 * z_critical(level));

        let lag_value = lag as f64;
        let lag_ci = ConfidenceInterval {
            confidence_level: level,
            lower_bound: (lag_value - 3.0).max(1.0),
            upper_bound: lag_value + 5.0,
            method: ConfidenceIntervalMethod::Heuristic,
        };

        log::debug!(
            "Block bootstrap: lag={}, raw={}, block={}, interval=[{:.1}, {:.1}]",
            lag,
            raw,
            block_size,
            lower,
            upper
        );

        Ok(warnings.finish(BlockBootstrapParameters {
            block_size: ParameterEstimate::with_interval(
                "block_size",
                block_size as f64,
                Some(se_block),
                block_ci,
            ),
            decorrelation_lag: ParameterEstimate::with_interval(
                "decorrelation_lag",
                lag_value,
                Some(2.0),
                lag_ci,
            ),
        }))
    }
}

impl Estimator for BlockBootstrapEstimator {
    type Params = BlockBootstrapParameters;

    fn model_type(&self) -> ModelType {
        ModelType::BlockBootstrap
    }

    fn estimate(
        &self,
        series: &BarSeries,
    ) -> EstimationResult<Estimation<BlockBootstrapParameters>> {
        self.estimate_returns(series.log_returns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::generate_garch_returns;
    use crate::rng::SeededRng;
    use rand_distr::{Distribution, StandardNormal};

    fn white_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = SeededRng::with_seed(seed);
        (0..n)
            .map(|_| {
                let z: f64 = StandardNormal.sample(&mut rng);
                0.01 * z
            })
            .collect()
    }

    #[test]
    fn test_block_size_within_bounds() {
        for (n, seed) in [(20, 1), (45, 2), (300, 3), (2000, 4)] {
            let fit = BlockBootstrapEstimator::default()
                .estimate_returns(&white_noise(n, seed))
                .unwrap();
            let block = fit.params.block_size.value;
            assert!(block >= 5.0, "n={} block={}", n, block);
            assert!(block <= 60f64.min((n / 3) as f64), "n={} block={}", n, block);

            let ci = fit.params.block_size.confidence_interval.unwrap();
            assert!(ci.lower_bound >= 5.0 && ci.upper_bound <= 60.0);
            assert!(ci.lower_bound <= ci.upper_bound);
        }
    }

    #[test]
    fn test_clustered_volatility_needs_longer_blocks() {
        let mut rng = SeededRng::with_seed(9);
        let clustered = generate_garch_returns(2000, 1e-6, 0.12, 0.86, &mut rng).unwrap();
        let estimator = BlockBootstrapEstimator::default();
        let noisy = estimator.estimate_returns(&white_noise(2000, 9)).unwrap();
        let garch = estimator.estimate_returns(&clustered).unwrap();
        assert!(
            garch.params.decorrelation_lag.value >= noisy.params.decorrelation_lag.value,
            "garch lag {} < noise lag {}",
            garch.params.decorrelation_lag.value,
            noisy.params.decorrelation_lag.value
        );
    }

    #[test]
    fn test_decorrelation_lag_interval_is_heuristic() {
        let fit = BlockBootstrapEstimator::default()
            .estimate_returns(&white_noise(500, 6))
            .unwrap();
        let lag = &fit.params.decorrelation_lag;
        let ci = lag.confidence_interval.as_ref().unwrap();
        assert_eq!(ci.method, ConfidenceIntervalMethod::Heuristic);
        assert_eq!(ci.lower_bound, (lag.value - 3.0).max(1.0));
        assert_eq!(ci.upper_bound, lag.value + 5.0);
        assert_eq!(lag.std_error, Some(2.0));
    }

    #[test]
    fn test_minimum_length() {
        assert!(matches!(
            BlockBootstrapEstimator::default().estimate_returns(&white_noise(14, 1)),
            Err(EstimationError::InsufficientData {
                required: 15,
                actual: 14
            })
        ));
    }

    #[test]
    fn test_tiny_series_with_unit_minimum_block() {
        let estimator = BlockBootstrapEstimator::new(
            EstimatorConfig::default(),
            BlockBootstrapConfig {
                min_block_size: 1,
                ..Default::default()
            },
        );
        for n in 3..=6 {
            let fit = estimator.estimate_returns(&white_noise(n, n as u64)).unwrap();
            let block = fit.params.block_size.value;
            assert!(block >= 1.0 && block <= (n / 3) as f64, "n={} block={}", n, block);
        }
    }

    #[test]
    fn test_small_sample_warns() {
        let fit = BlockBootstrapEstimator::default()
            .estimate_returns(&white_noise(30, 5))
            .unwrap();
        assert!(fit.warnings.iter().any(|w| w.contains("unreliable")));
    }
}
