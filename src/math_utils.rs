//! Mathematical utility functions and constants for calibration.
//!
//! Descriptive statistics, single-predictor OLS with coefficient standard errors,
//! Pearson correlation, the sample autocorrelation function and the Bartlett-band
//! decorrelation lag derived from it, the Ljung-Box portmanteau test, and
//! log-space helpers used by the hidden Markov model.

use crate::confidence_intervals::z_critical;
use crate::errors::{validate_all_finite, EstimationError, EstimationResult};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Numerical constants shared by the estimators.
pub mod constants {
    /// Variance below which a series is treated as constant
    pub const MIN_VARIANCE: f64 = 1e-10;

    /// Predictor spread below which a regression is underdetermined
    pub const MIN_PREDICTOR_SPREAD: f64 = 1e-15;

    /// Added inside logarithms of probabilities
    pub const MIN_LOG_VALUE: f64 = 1e-300;

    /// ln(2π) for Gaussian log-densities
    pub const LN_TWO_PI: f64 = 1.837_877_066_409_345_5;

    /// Default cap on autocorrelation lags
    pub const DEFAULT_MAX_LAG: usize = 100;
}

/// Arithmetic mean; NaN for empty input.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Variance with `ddof` delta degrees of freedom; NaN when `len <= ddof`.
pub fn variance(data: &[f64], ddof: usize) -> f64 {
    if data.len() <= ddof {
        return f64::NAN;
    }
    let m = mean(data);
    data.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / (data.len() - ddof) as f64
}

/// Unbiased sample variance (ddof = 1).
pub fn sample_variance(data: &[f64]) -> f64 {
    variance(data, 1)
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std_dev(data: &[f64], ddof: usize) -> f64 {
    variance(data, ddof).sqrt()
}

/// Pearson correlation of two equal-length series.
///
/// NaN when lengths differ, fewer than two points, or either series is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let (dx, dy) = (xi - mx, yi - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= 0.0 || !denom.is_finite() {
        return f64::NAN;
    }
    sxy / denom
}

/// Trailing moving average keeping only full windows (`len - window + 1` values).
pub fn moving_average(data: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return data.to_vec();
    }
    data.windows(window).map(mean).collect()
}

/// Fitted line `y = alpha + beta·x` with coefficient standard errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    /// Intercept
    pub alpha: f64,
    /// Slope
    pub beta: f64,
    /// Standard error of the intercept
    pub se_alpha: f64,
    /// Standard error of the slope
    pub se_beta: f64,
    /// `y - alpha - beta·x`
    pub residuals: Vec<f64>,
}

/// Ordinary least squares with one predictor.
///
/// Standard errors use the residual mean square `SSR / (n - 2)`.
///
/// # Errors
/// * `InsufficientData` below three observations
/// * `InvalidParameter` when `x` and `y` differ in length
/// * `NumericalError` on non-finite input or a constant predictor
pub fn linear_regression(x: &[f64], y: &[f64]) -> EstimationResult<RegressionFit> {
    if x.len() != y.len() {
        return Err(EstimationError::InvalidParameter {
            parameter: "y.len()".to_string(),
            value: y.len() as f64,
            constraint: format!("equal to x.len() = {}", x.len()),
        });
    }
    if x.len() < 3 {
        return Err(EstimationError::InsufficientData {
            required: 3,
            actual: x.len(),
        });
    }
    validate_all_finite(x, "regression predictor")?;
    validate_all_finite(y, "regression response")?;

    let n = x.len() as f64;
    let mean_x = mean(x);
    let mean_y = mean(y);

    // Centered sums avoid cancellation when x is large relative to its spread
    let sxx: f64 = x.iter().map(|xi| (xi - mean_x) * (xi - mean_x)).sum();
    let sxy: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (xi - mean_x) * (yi - mean_y))
        .sum();

    if sxx / n < constants::MIN_PREDICTOR_SPREAD * (1.0 + mean_x * mean_x) {
        return Err(EstimationError::NumericalError {
            reason: "Predictor variable has zero variance (underdetermined regression)"
                .to_string(),
            operation: Some("linear_regression".to_string()),
        });
    }

    let beta = sxy / sxx;
    let alpha = mean_y - beta * mean_x;
    let residuals: Vec<f64> = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - alpha - beta * xi)
        .collect();
    let mse = residuals.iter().map(|r| r * r).sum::<f64>() / (n - 2.0);
    let se_beta = (mse / sxx).sqrt();
    let se_alpha = (mse * (1.0 / n + mean_x * mean_x / sxx)).sqrt();

    Ok(RegressionFit {
        alpha,
        beta,
        se_alpha,
        se_beta,
        residuals,
    })
}

/// Sample autocorrelation function for lags `0..=max_lag`.
///
/// `max_lag` defaults to `min(n / 4, 100)` and is capped at `n - 1`. Lag `k` is
/// `Σ x̃ₜ x̃ₜ₊ₖ / ((n - k)·var)` with the population variance; lag 0 is 1. A
/// near-constant series yields zeros beyond lag 0.
pub fn autocorrelation(data: &[f64], max_lag: Option<usize>) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return vec![1.0];
    }
    let max_lag = max_lag
        .unwrap_or((n / 4).min(constants::DEFAULT_MAX_LAG))
        .min(n - 1);

    let m = mean(data);
    let centered: Vec<f64> = data.iter().map(|x| x - m).collect();
    let var = centered.iter().map(|c| c * c).sum::<f64>() / n as f64;

    let mut acf = vec![0.0; max_lag + 1];
    acf[0] = 1.0;
    if var < constants::MIN_VARIANCE {
        return acf;
    }

    for (lag, value) in acf.iter_mut().enumerate().skip(1) {
        let covariance: f64 = centered[..n - lag]
            .iter()
            .zip(&centered[lag..])
            .map(|(a, b)| a * b)
            .sum();
        *value = covariance / ((n - lag) as f64 * var);
    }
    acf
}

/// First lag whose autocorrelation falls inside the Bartlett band `z(1-α/2)/√n`.
///
/// Returns `max_lag` when every lag up to it is significant. Never fails.
pub fn decorrelation_lag(data: &[f64], significance_level: f64, max_lag: usize) -> usize {
    let n = data.len();
    if n < 2 || max_lag == 0 {
        return max_lag;
    }
    let threshold = z_critical(1.0 - significance_level) / (n as f64).sqrt();
    let acf = autocorrelation(data, Some(max_lag));

    acf.iter()
        .enumerate()
        .skip(1)
        .find(|(_, r)| r.abs() < threshold)
        .map(|(lag, _)| lag)
        .unwrap_or(max_lag)
}

/// Ljung-Box portmanteau test; returns `(Q, p_value)`.
///
/// `Q = n(n+2) Σₖ r²ₖ / (n - k)` for `k = 1..=lags`, compared against χ²(lags).
pub fn ljung_box_test(data: &[f64], lags: usize) -> EstimationResult<(f64, f64)> {
    if lags == 0 {
        return Err(EstimationError::InvalidParameter {
            parameter: "lags".to_string(),
            value: 0.0,
            constraint: "must be > 0".to_string(),
        });
    }
    let n = data.len();
    if n <= lags {
        return Err(EstimationError::InsufficientData {
            required: lags + 1,
            actual: n,
        });
    }

    let acf = autocorrelation(data, Some(lags));
    let nf = n as f64;
    let q = nf
        * (nf + 2.0)
        * acf
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, r)| r * r / (nf - k as f64))
            .sum::<f64>();

    let chi2 = ChiSquared::new(lags as f64).map_err(|e| EstimationError::NumericalError {
        reason: e.to_string(),
        operation: Some("ljung_box_test".to_string()),
    })?;
    Ok((q, 1.0 - chi2.cdf(q)))
}

/// `ln Σ exp(xᵢ)` without overflow; `-inf` for empty or all `-inf` input.
pub fn logsumexp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
