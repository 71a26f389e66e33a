//! Confidence intervals: normal approximation and bootstrap percentiles.

use crate::errors::{validate_parameter, EstimationError, EstimationResult};
use once_cell::sync::Lazy;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

// Quantile interpolation epsilon for numerical stability
pub(crate) const QUANTILE_EPSILON: f64 = 1e-12;

// Cached standard normal distribution
static STANDARD_NORMAL: Lazy<Normal> = Lazy::new(|| {
    Normal::new(0.0, 1.0).expect("Failed to create standard normal distribution")
});

/// Interval for a parameter estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConfidenceInterval {
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence_level: f64,
    /// Lower bound
    pub lower_bound: f64,
    /// Upper bound
    pub upper_bound: f64,
    /// Method used for CI construction
    pub method: ConfidenceIntervalMethod,
}

impl ConfidenceInterval {
    /// Distance between the bounds.
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }

    /// Whether `value` lies inside the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower_bound <= value && value <= self.upper_bound
    }
}

/// Methods for constructing confidence intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfidenceIntervalMethod {
    /// Estimate ± z·SE
    Normal,
    /// Empirical percentiles of a bootstrap distribution
    BootstrapPercentile,
    /// Fixed rule-of-thumb band
    Heuristic,
}

/// Two-sided critical value of the standard normal at `confidence_level`.
pub fn z_critical(confidence_level: f64) -> f64 {
    let alpha = 1.0 - confidence_level;
    STANDARD_NORMAL.inverse_cdf(1.0 - alpha / 2.0)
}

/// Compute interpolated quantile using Hyndman-Fan Type 7 method.
///
/// `sorted` must be non-empty, finite and ascending.
pub(crate) fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty(), "quantile_type7 requires non-empty input");

    let p = p.clamp(QUANTILE_EPSILON, 1.0 - QUANTILE_EPSILON);
    let h = p * (sorted.len() as f64 - 1.0);
    let h_floor = h.floor() as usize;
    let h_frac = h - h_floor as f64;

    if h_floor + 1 < sorted.len() {
        sorted[h_floor] * (1.0 - h_frac) + sorted[h_floor + 1] * h_frac
    } else {
        sorted[h_floor.min(sorted.len() - 1)]
    }
}

/// Normal-approximation interval `estimate ± z·standard_error`.
///
/// A non-finite bound collapses the interval onto the estimate.
pub fn normal_confidence_interval(
    estimate: f64,
    standard_error: f64,
    confidence_level: f64,
) -> EstimationResult<ConfidenceInterval> {
    validate_parameter(confidence_level, 1e-6, 1.0 - 1e-6, "confidence_level")?;
    let margin = z_critical(confidence_level) * standard_error;
    let (lower_bound, upper_bound) =
        if (estimate - margin).is_finite() && (estimate + margin).is_finite() {
            (estimate - margin, estimate + margin)
        } else {
            (estimate, estimate)
        };

    Ok(ConfidenceInterval {
        confidence_level,
        lower_bound,
        upper_bound,
        method: ConfidenceIntervalMethod::Normal,
    })
}

/// Percentile interval from a bootstrap distribution.
///
/// Non-finite replicates are discarded before taking the `(α/2, 1−α/2)` quantiles.
pub fn percentile_confidence_interval(
    bootstrap_estimates: &[f64],
    confidence_level: f64,
) -> EstimationResult<ConfidenceInterval> {
    validate_parameter(confidence_level, 1e-6, 1.0 - 1e-6, "confidence_level")?;

    let mut sorted: Vec<f64> = bootstrap_estimates
        .iter()
        .copied()
        .filter(|x| x.is_finite())
        .collect();
    if sorted.is_empty() {
        return Err(EstimationError::BootstrapError {
            reason: "No finite bootstrap estimates available".to_string(),
        });
    }
    sorted.sort_unstable_by(f64::total_cmp);

    let alpha = 1.0 - confidence_level;
    Ok(ConfidenceInterval {
        confidence_level,
        lower_bound: quantile_type7(&sorted, alpha / 2.0),
        upper_bound: quantile_type7(&sorted, 1.0 - alpha / 2.0),
        method: ConfidenceIntervalMethod::BootstrapPercentile,
    })
}
