//! # Calibration Results
//!
//! Parameter estimates with their uncertainty, the per-model parameter bundles, and
//! the aggregate [`CalibrationResult`] assembled once per calibration call.

use crate::confidence_intervals::{normal_confidence_interval, ConfidenceInterval};
#[cfg(feature = "serde")]
use crate::errors::{EstimationError, EstimationResult};
use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five calibrated model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelType {
    /// Geometric Brownian motion
    Gbm,
    /// Heston stochastic volatility
    Heston,
    /// GARCH(1,1)
    Garch,
    /// Markov regime-switching
    RegimeSwitching,
    /// Block-bootstrap block size
    BlockBootstrap,
}

impl ModelType {
    /// Every model, in calibration order.
    pub const ALL: [ModelType; 5] = [
        ModelType::Gbm,
        ModelType::Heston,
        ModelType::Garch,
        ModelType::RegimeSwitching,
        ModelType::BlockBootstrap,
    ];

    /// Name as it appears in warnings, e.g. "Regime-switching estimation failed".
    pub fn name(self) -> &'static str {
        match self {
            ModelType::Gbm => "GBM",
            ModelType::Heston => "Heston",
            ModelType::Garch => "GARCH",
            ModelType::RegimeSwitching => "Regime-switching",
            ModelType::BlockBootstrap => "Block bootstrap",
        }
    }

    /// Name as it appears mid-sentence, e.g. "Estimating regime-switching parameters".
    pub fn label(self) -> &'static str {
        match self {
            ModelType::RegimeSwitching => "regime-switching",
            ModelType::BlockBootstrap => "block bootstrap",
            other => other.name(),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named scalar estimate with optional standard error and interval.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterEstimate {
    /// Parameter name
    pub name: String,
    /// Point estimate
    pub value: f64,
    /// Standard error, when available
    pub std_error: Option<f64>,
    /// Confidence interval, when available
    pub confidence_interval: Option<ConfidenceInterval>,
}

impl ParameterEstimate {
    /// Estimate without uncertainty.
    pub fn point(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            std_error: None,
            confidence_interval: None,
        }
    }

    /// Estimate with a symmetric normal interval `value ± z·SE`.
    ///
    /// A missing, non-finite or non-positive standard error leaves both the SE and
    /// the interval unavailable.
    pub fn with_standard_error(
        name: impl Into<String>,
        value: f64,
        std_error: Option<f64>,
        confidence_level: f64,
    ) -> Self {
        match std_error.filter(|se| se.is_finite() && *se > 0.0) {
            Some(se) => Self {
                name: name.into(),
                value,
                std_error: Some(se),
                confidence_interval: normal_confidence_interval(value, se, confidence_level).ok(),
            },
            None => Self::point(name, value),
        }
    }

    /// Estimate with an externally constructed interval.
    pub fn with_interval(
        name: impl Into<String>,
        value: f64,
        std_error: Option<f64>,
        interval: ConfidenceInterval,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            std_error: std_error.filter(|se| se.is_finite()),
            confidence_interval: Some(interval),
        }
    }

    /// Raise the interval's lower bound to at least `floor`.
    pub fn floor_lower_bound(mut self, floor: f64) -> Self {
        if let Some(ci) = self.confidence_interval.as_mut() {
            ci.lower_bound = ci.lower_bound.max(floor);
        }
        self
    }
}

impl fmt::Display for ParameterEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:.6}", self.name, self.value)?;
        if let Some(se) = self.std_error {
            write!(f, " (SE {:.6})", se)?;
        }
        if let Some(ci) = &self.confidence_interval {
            write!(
                f,
                " [{:.6}, {:.6}] @ {:.0}%",
                ci.lower_bound,
                ci.upper_bound,
                ci.confidence_level * 100.0
            )?;
        }
        Ok(())
    }
}

/// Annualized GBM drift and volatility.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GbmParameters {
    /// Annualized drift, including the Itô correction
    pub mu: ParameterEstimate,
    /// Annualized volatility
    pub sigma: ParameterEstimate,
}

/// Heston parameters from the variance-proxy regression.
///
/// `v0`, `theta` are in per-period (daily) variance units; `kappa` is per year.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HestonParameters {
    /// Drift
    pub mu: ParameterEstimate,
    /// Initial variance
    pub v0: ParameterEstimate,
    /// Mean-reversion speed
    pub kappa: ParameterEstimate,
    /// Long-run variance
    pub theta: ParameterEstimate,
    /// Volatility of variance
    pub sigma_v: ParameterEstimate,
    /// Return/variance correlation
    pub rho: ParameterEstimate,
}

/// GARCH(1,1) parameters on per-period returns.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GarchParameters {
    /// Annualized mean return
    pub mu: ParameterEstimate,
    /// Variance intercept
    pub omega: ParameterEstimate,
    /// ARCH coefficient
    pub alpha: ParameterEstimate,
    /// GARCH coefficient
    pub beta: ParameterEstimate,
    /// alpha + beta, always below 1
    pub persistence: ParameterEstimate,
    /// omega / (1 - persistence)
    pub unconditional_variance: ParameterEstimate,
}

/// One regime's annualized moments.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegimeParameters {
    /// Annualized mean return
    pub mu: ParameterEstimate,
    /// Annualized volatility
    pub sigma: ParameterEstimate,
}

/// Hidden Markov regime model, regimes sorted by ascending volatility.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegimeSwitchingParameters {
    /// Number of regimes
    pub n_regimes: usize,
    /// Per-regime moments
    pub regimes: Vec<RegimeParameters>,
    /// Row-stochastic transition matrix, `[from][to]`
    pub transition_matrix: Vec<Vec<f64>>,
    /// Long-run regime occupancy
    pub stationary_distribution: Vec<f64>,
    /// Log-likelihood of the selected EM run
    pub log_likelihood: f64,
    /// Restarts that met the EM tolerance
    pub converged_restarts: usize,
}

/// Bootstrap block length and the lag it was derived from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockBootstrapParameters {
    /// Recommended block size
    pub block_size: ParameterEstimate,
    /// First lag whose autocorrelation is insignificant
    pub decorrelation_lag: ParameterEstimate,
}

/// First and last dates covered by a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DateRange {
    /// First bar date
    pub start: NaiveDate,
    /// Last bar date
    pub end: NaiveDate,
}

/// Everything one calibration call produced.
///
/// Models that were not requested, or whose estimation failed, are `None`; failures
/// are explained in `warnings`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationResult {
    /// Instrument identifier
    pub ticker: String,
    /// Number of bars
    pub n_observations: usize,
    /// Dates covered
    pub date_range: DateRange,
    /// GBM bundle
    pub gbm: Option<GbmParameters>,
    /// Heston bundle
    pub heston: Option<HestonParameters>,
    /// GARCH bundle
    pub garch: Option<GarchParameters>,
    /// Regime-switching bundle
    pub regime_switching: Option<RegimeSwitchingParameters>,
    /// Block-bootstrap bundle
    pub block_bootstrap: Option<BlockBootstrapParameters>,
    /// Estimator warnings and per-model failure reasons, in execution order
    pub warnings: Vec<String>,
}

impl CalibrationResult {
    /// Empty result for a series, before any model runs.
    pub fn new(ticker: impl Into<String>, n_observations: usize, date_range: DateRange) -> Self {
        Self {
            ticker: ticker.into(),
            n_observations,
            date_range,
            gbm: None,
            heston: None,
            garch: None,
            regime_switching: None,
            block_bootstrap: None,
            warnings: Vec::new(),
        }
    }

    /// Models with a bundle present.
    pub fn fitted_models(&self) -> Vec<ModelType> {
        let present = [
            self.gbm.is_some(),
            self.heston.is_some(),
            self.garch.is_some(),
            self.regime_switching.is_some(),
            self.block_bootstrap.is_some(),
        ];
        ModelType::ALL
            .iter()
            .zip(present)
            .filter_map(|(model, fitted)| fitted.then_some(*model))
            .collect()
    }

    /// Pretty-printed JSON export.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> EstimationResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EstimationError::SerializationError {
            format: "JSON".to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a result previously written by [`CalibrationResult::to_json`].
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> EstimationResult<Self> {
        serde_json::from_str(json).map_err(|e| EstimationError::SerializationError {
            format: "JSON".to_string(),
            reason: e.to_string(),
        })
    }
}
