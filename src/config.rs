//! # Calibration Configuration
//!
//! Immutable configuration values handed to estimators at construction. The shared
//! [`EstimatorConfig`] carries the settings every model uses; each estimator has its
//! own tunables, and [`CalibratorConfig`] bundles them with the set of enabled models.

use crate::errors::{validate_parameter, EstimationError, EstimationResult};
use crate::results::ModelType;
use crate::volatility::VolatilityMethod;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Settings shared by every estimator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EstimatorConfig {
    /// Periods per year used to annualize drift and volatility
    pub trading_days_per_year: f64,
    /// Confidence level for every interval (0 < level < 1)
    pub confidence_level: f64,
    /// Number of bootstrap resamples
    pub n_bootstrap: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            trading_days_per_year: 252.0,
            confidence_level: 0.95,
            n_bootstrap: 1000,
        }
    }
}

impl EstimatorConfig {
    /// Length of one period in years.
    pub fn dt(&self) -> f64 {
        1.0 / self.trading_days_per_year
    }

    /// Check every field against its valid range.
    pub fn validate(&self) -> EstimationResult<()> {
        if !(self.trading_days_per_year.is_finite() && self.trading_days_per_year > 0.0) {
            return Err(EstimationError::InvalidParameter {
                parameter: "trading_days_per_year".to_string(),
                value: self.trading_days_per_year,
                constraint: "> 0".to_string(),
            });
        }
        validate_parameter(self.confidence_level, 1e-6, 1.0 - 1e-6, "confidence_level")?;
        if self.n_bootstrap == 0 {
            return Err(EstimationError::InvalidParameter {
                parameter: "n_bootstrap".to_string(),
                value: 0.0,
                constraint: ">= 1".to_string(),
            });
        }
        Ok(())
    }
}

/// GBM estimator settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GbmConfig {
    /// Range-based estimator used for sigma
    pub volatility_method: VolatilityMethod,
}

impl Default for GbmConfig {
    fn default() -> Self {
        Self {
            volatility_method: VolatilityMethod::YangZhang,
        }
    }
}

/// GARCH(1,1) likelihood optimization settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GarchConfig {
    /// Optimizer iteration cap
    pub max_iterations: usize,
    /// Relative change in the objective that counts as converged
    pub tolerance: f64,
}

impl Default for GarchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

impl GarchConfig {
    /// Check every field against its valid range.
    pub fn validate(&self) -> EstimationResult<()> {
        if self.max_iterations == 0 {
            return Err(EstimationError::InvalidParameter {
                parameter: "max_iterations".to_string(),
                value: 0.0,
                constraint: ">= 1".to_string(),
            });
        }
        validate_parameter(self.tolerance, f64::MIN_POSITIVE, 1.0, "tolerance")
    }
}

/// Heston regression settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HestonConfig {
    /// Moving-average window applied to the per-bar variance proxy (1 = raw proxy)
    pub variance_window: usize,
    /// Trailing bars averaged for the initial variance
    pub v0_window: usize,
}

impl Default for HestonConfig {
    fn default() -> Self {
        Self {
            variance_window: 1,
            v0_window: 20,
        }
    }
}

impl HestonConfig {
    /// Check every field against its valid range.
    pub fn validate(&self) -> EstimationResult<()> {
        for (name, value) in [
            ("variance_window", self.variance_window),
            ("v0_window", self.v0_window),
        ] {
            if value == 0 {
                return Err(EstimationError::InvalidParameter {
                    parameter: name.to_string(),
                    value: 0.0,
                    constraint: ">= 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Regime-switching EM settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegimeConfig {
    /// Number of hidden regimes (at least 2)
    pub n_regimes: usize,
    /// Independent EM restarts
    pub n_init: usize,
    /// Log-likelihood change that stops EM
    pub em_tolerance: f64,
    /// EM iteration cap per restart
    pub em_max_iter: usize,
    /// Base seed; restart `i` uses a seed mixed from this and `i`
    pub seed: u64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            n_regimes: 2,
            n_init: 10,
            em_tolerance: 1e-6,
            em_max_iter: 200,
            seed: 0,
        }
    }
}

impl RegimeConfig {
    /// Check every field against its valid range.
    pub fn validate(&self) -> EstimationResult<()> {
        if self.n_regimes < 2 {
            return Err(EstimationError::InvalidParameter {
                parameter: "n_regimes".to_string(),
                value: self.n_regimes as f64,
                constraint: ">= 2".to_string(),
            });
        }
        if self.n_init == 0 || self.em_max_iter == 0 {
            return Err(EstimationError::InvalidParameter {
                parameter: if self.n_init == 0 { "n_init" } else { "em_max_iter" }.to_string(),
                value: 0.0,
                constraint: ">= 1".to_string(),
            });
        }
        validate_parameter(self.em_tolerance, 0.0, 1.0, "em_tolerance")
    }
}

/// Block-bootstrap block-size settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockBootstrapConfig {
    /// Smallest block size reported
    pub min_block_size: usize,
    /// Largest block size reported (further capped at n/3)
    pub max_block_size: usize,
    /// Analyze squared returns, which capture volatility clustering
    pub use_squared_returns: bool,
    /// Significance level of the Bartlett band used for the decorrelation lag
    pub significance_level: f64,
}

impl Default for BlockBootstrapConfig {
    fn default() -> Self {
        Self {
            min_block_size: 5,
            max_block_size: 60,
            use_squared_returns: true,
            significance_level: 0.05,
        }
    }
}

impl BlockBootstrapConfig {
    /// Check every field against its valid range.
    pub fn validate(&self) -> EstimationResult<()> {
        if self.min_block_size == 0 || self.min_block_size > self.max_block_size {
            return Err(EstimationError::InvalidParameter {
                parameter: "min_block_size".to_string(),
                value: self.min_block_size as f64,
                constraint: format!("in [1, max_block_size = {}]", self.max_block_size),
            });
        }
        validate_parameter(self.significance_level, 1e-6, 1.0 - 1e-6, "significance_level")
    }
}

/// Everything the calibrator needs: enabled models plus every estimator's settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibratorConfig {
    /// Models run by a full calibration, in execution order
    pub models: Vec<ModelType>,
    /// Shared settings
    pub estimator: EstimatorConfig,
    /// GBM settings
    pub gbm: GbmConfig,
    /// GARCH settings
    pub garch: GarchConfig,
    /// Heston settings
    pub heston: HestonConfig,
    /// Regime-switching settings
    pub regime: RegimeConfig,
    /// Block-bootstrap settings
    pub block_bootstrap: BlockBootstrapConfig,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            models: ModelType::ALL.to_vec(),
            estimator: EstimatorConfig::default(),
            gbm: GbmConfig::default(),
            garch: GarchConfig::default(),
            heston: HestonConfig::default(),
            regime: RegimeConfig::default(),
            block_bootstrap: BlockBootstrapConfig::default(),
        }
    }
}

impl CalibratorConfig {
    /// Restrict a full calibration to the given models.
    pub fn with_models(mut self, models: &[ModelType]) -> Self {
        self.models = ModelType::ALL
            .iter()
            .copied()
            .filter(|m| models.contains(m))
            .collect();
        self
    }

    /// Whether a full calibration runs `model`.
    pub fn is_enabled(&self, model: ModelType) -> bool {
        self.models.contains(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EstimatorConfig::default().validate().is_ok());
        assert!(GarchConfig::default().validate().is_ok());
        assert!(HestonConfig::default().validate().is_ok());
        assert!(RegimeConfig::default().validate().is_ok());
        assert!(BlockBootstrapConfig::default().validate().is_ok());
        assert_eq!(CalibratorConfig::default().models.len(), 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_level = EstimatorConfig {
            confidence_level: 1.5,
            ..Default::default()
        };
        assert!(bad_level.validate().is_err());

        let one_regime = RegimeConfig {
            n_regimes: 1,
            ..Default::default()
        };
        assert!(matches!(
            one_regime.validate(),
            Err(EstimationError::InvalidParameter { .. })
        ));

        let inverted = BlockBootstrapConfig {
            min_block_size: 70,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_with_models_keeps_canonical_order() {
        let config =
            CalibratorConfig::default().with_models(&[ModelType::Garch, ModelType::Gbm]);
        assert_eq!(config.models, vec![ModelType::Gbm, ModelType::Garch]);
        assert!(config.is_enabled(ModelType::Gbm));
        assert!(!config.is_enabled(ModelType::Heston));
    }
}
