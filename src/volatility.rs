//! Range-based volatility estimators.
//!
//! Each estimator returns a per-period variance from OHLC arrays. Using the intraday
//! range makes them markedly more efficient than the close-to-close estimator; the
//! relative efficiency is carried alongside the estimate so downstream standard
//! errors can be scaled by `1/√efficiency`.
//!
//! | Method          | Efficiency vs close-to-close |
//! |-----------------|------------------------------|
//! | Close-to-close  | 1.0                          |
//! | Parkinson       | 5.2                          |
//! | Garman-Klass    | 7.4                          |
//! | Rogers-Satchell | 6.0                          |
//! | Yang-Zhang      | 8.0                          |

use crate::bars::BarSeries;
use crate::errors::{EstimationError, EstimationResult};
use crate::math_utils::{mean, sample_variance};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;

/// Available volatility estimation methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VolatilityMethod {
    /// Sample variance of log returns
    CloseToClose,
    /// High/low range (Parkinson 1980)
    Parkinson,
    /// Range plus open/close (Garman & Klass 1980)
    GarmanKlass,
    /// Drift-independent range (Rogers & Satchell 1991)
    RogersSatchell,
    /// Overnight + open/close + Rogers-Satchell blend (Yang & Zhang 2000)
    YangZhang,
}

impl VolatilityMethod {
    /// Every method, in the order of the table above.
    pub const ALL: [VolatilityMethod; 5] = [
        VolatilityMethod::CloseToClose,
        VolatilityMethod::Parkinson,
        VolatilityMethod::GarmanKlass,
        VolatilityMethod::RogersSatchell,
        VolatilityMethod::YangZhang,
    ];

    /// Variance efficiency relative to close-to-close.
    pub fn relative_efficiency(self) -> f64 {
        match self {
            VolatilityMethod::CloseToClose => 1.0,
            VolatilityMethod::Parkinson => 5.2,
            VolatilityMethod::GarmanKlass => 7.4,
            VolatilityMethod::RogersSatchell => 6.0,
            VolatilityMethod::YangZhang => 8.0,
        }
    }
}

/// Result of volatility estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VolatilityEstimate {
    /// Per-period variance, clamped at zero
    pub daily_variance: f64,
    /// `√(daily_variance × periods_per_year)`
    pub annualized_volatility: f64,
    /// Method that produced the estimate
    pub method: VolatilityMethod,
    /// Efficiency relative to close-to-close
    pub relative_efficiency: f64,
}

impl VolatilityEstimate {
    /// Per-period standard deviation.
    pub fn daily_volatility(&self) -> f64 {
        self.daily_variance.sqrt()
    }
}

fn check_lengths(arrays: &[&[f64]], required: usize) -> EstimationResult<usize> {
    let n = arrays.first().map_or(0, |a| a.len());
    if arrays.iter().any(|a| a.len() != n) {
        return Err(EstimationError::InvalidParameter {
            parameter: "ohlc lengths".to_string(),
            value: n as f64,
            constraint: "all arrays must have equal length".to_string(),
        });
    }
    if n < required {
        return Err(EstimationError::InsufficientData {
            required,
            actual: n,
        });
    }
    Ok(n)
}

/// Sample variance (ddof = 1) of log returns.
pub fn close_to_close_variance(log_returns: &[f64]) -> EstimationResult<f64> {
    check_lengths(&[log_returns], 2)?;
    Ok(sample_variance(log_returns))
}

/// `mean[(ln H/L)²] / (4 ln 2)`.
pub fn parkinson_variance(highs: &[f64], lows: &[f64]) -> EstimationResult<f64> {
    check_lengths(&[highs, lows], 1)?;
    let sum: f64 = highs
        .iter()
        .zip(lows)
        .map(|(h, l)| (h / l).ln().powi(2))
        .sum();
    Ok(sum / highs.len() as f64 / (4.0 * LN_2))
}

/// Per-bar Parkinson variance `(ln H/L)² / (4 ln 2)`.
pub fn parkinson_proxy(highs: &[f64], lows: &[f64]) -> Vec<f64> {
    highs
        .iter()
        .zip(lows)
        .map(|(h, l)| (h / l).ln().powi(2) / (4.0 * LN_2))
        .collect()
}

/// `mean[0.5 (ln H/L)² − (2 ln 2 − 1)(ln C/O)²]`.
pub fn garman_klass_variance(
    opens: &[f64],
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
) -> EstimationResult<f64> {
    let n = check_lengths(&[opens, highs, lows, closes], 1)?;
    let sum: f64 = (0..n)
        .map(|t| {
            let log_hl = (highs[t] / lows[t]).ln();
            let log_co = (closes[t] / opens[t]).ln();
            0.5 * log_hl * log_hl - (2.0 * LN_2 - 1.0) * log_co * log_co
        })
        .sum();
    Ok(sum / n as f64)
}

/// `mean[ln(H/C) ln(H/O) + ln(L/C) ln(L/O)]`.
pub fn rogers_satchell_variance(
    opens: &[f64],
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
) -> EstimationResult<f64> {
    let n = check_lengths(&[opens, highs, lows, closes], 1)?;
    let sum: f64 = (0..n)
        .map(|t| {
            (highs[t] / closes[t]).ln() * (highs[t] / opens[t]).ln()
                + (lows[t] / closes[t]).ln() * (lows[t] / opens[t]).ln()
        })
        .sum();
    Ok(sum / n as f64)
}

/// Yang-Zhang variance: overnight + k·open-to-close + (1−k)·Rogers-Satchell.
///
/// The first bar only supplies the previous close, so at least three bars are
/// needed. `k = 0.34 / (1.34 + (n+1)/(n−1))` with `n` the bars after dropping.
pub fn yang_zhang_variance(
    opens: &[f64],
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
) -> EstimationResult<f64> {
    let total = check_lengths(&[opens, highs, lows, closes], 0)?;
    if total < 3 {
        return Err(EstimationError::InsufficientData {
            required: 3,
            actual: total,
        });
    }
    let prev_closes = &closes[..total - 1];
    let (opens, highs, lows, closes) = (&opens[1..], &highs[1..], &lows[1..], &closes[1..]);
    let n = opens.len() as f64;

    let overnight: Vec<f64> = opens
        .iter()
        .zip(prev_closes)
        .map(|(o, c)| (o / c).ln())
        .collect();
    let open_close: Vec<f64> = closes.iter().zip(opens).map(|(c, o)| (c / o).ln()).collect();

    let var_overnight = sample_variance(&overnight);
    let var_open_close = sample_variance(&open_close);
    let var_rs = rogers_satchell_variance(opens, highs, lows, closes)?;
    let k = 0.34 / (1.34 + (n + 1.0) / (n - 1.0));

    Ok(var_overnight + k * var_open_close + (1.0 - k) * var_rs)
}

/// Estimate volatility of a bar series with `method`, annualized with `periods_per_year`.
pub fn estimate_volatility(
    series: &BarSeries,
    method: VolatilityMethod,
    periods_per_year: f64,
) -> EstimationResult<VolatilityEstimate> {
    let (o, h, l, c) = (series.opens(), series.highs(), series.lows(), series.closes());
    let raw = match method {
        VolatilityMethod::CloseToClose => close_to_close_variance(series.log_returns())?,
        VolatilityMethod::Parkinson => parkinson_variance(h, l)?,
        VolatilityMethod::GarmanKlass => garman_klass_variance(o, h, l, c)?,
        VolatilityMethod::RogersSatchell => rogers_satchell_variance(o, h, l, c)?,
        VolatilityMethod::YangZhang => yang_zhang_variance(o, h, l, c)?,
    };
    if !raw.is_finite() {
        return Err(EstimationError::NumericalError {
            reason: format!("{:?} variance is not finite", method),
            operation: Some("estimate_volatility".to_string()),
        });
    }

    // Rounding can leave tiny negatives in the range estimators
    let daily_variance = raw.max(0.0);
    Ok(VolatilityEstimate {
        daily_variance,
        annualized_volatility: (daily_variance * periods_per_year).sqrt(),
        method,
        relative_efficiency: method.relative_efficiency(),
    })
}

/// Every method's estimate, skipping methods that fail on this series.
pub fn estimate_all_volatilities(
    series: &BarSeries,
    periods_per_year: f64,
) -> Vec<VolatilityEstimate> {
    VolatilityMethod::ALL
        .iter()
        .filter_map(|&method| match estimate_volatility(series, method, periods_per_year) {
            Ok(estimate) => Some(estimate),
            Err(e) => {
                log::debug!("{:?} volatility skipped: {}", method, e);
                None
            }
        })
        .collect()
}

/// Mean of the per-bar Parkinson proxy; convenience for callers that want a level.
pub fn mean_parkinson_proxy(series: &BarSeries) -> f64 {
    mean(&parkinson_proxy(series.highs(), series.lows()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::Bar;
    use crate::generators::{generate_gbm_bars, GeneratorConfig};
    use assert_approx_eq::assert_approx_eq;
    use chrono::NaiveDate;

    fn flat_series(n: usize) -> BarSeries {
        let bars = (0..n)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64);
                Bar::new(date, 100.0, 100.0, 100.0, 100.0, 1.0).unwrap()
            })
            .collect();
        BarSeries::new("FLAT", bars).unwrap()
    }

    #[test]
    fn test_parkinson_known_value() {
        // ln(H/L) = 0.1 on every bar
        let highs = vec![110.517_091_807_564_76; 4];
        let lows = vec![100.0; 4];
        let expected = 0.01 / (4.0 * LN_2);
        assert_approx_eq!(parkinson_variance(&highs, &lows).unwrap(), expected, 1e-12);
    }

    #[test]
    fn test_rogers_satchell_zero_range() {
        let flat = [100.0; 3];
        assert_approx_eq!(
            rogers_satchell_variance(&flat, &flat, &flat, &flat).unwrap(),
            0.0,
            1e-15
        );
    }

    #[test]
    fn test_yang_zhang_needs_three_bars() {
        let two = [100.0, 101.0];
        assert!(matches!(
            yang_zhang_variance(&two, &two, &two, &two),
            Err(EstimationError::InsufficientData { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_flat_series_has_zero_volatility() {
        let series = flat_series(10);
        for estimate in estimate_all_volatilities(&series, 252.0) {
            assert_eq!(estimate.daily_variance, 0.0);
            assert_eq!(estimate.annualized_volatility, 0.0);
        }
    }

    #[test]
    fn test_estimate_all_skips_failures() {
        // Two bars: one return, so close-to-close and Yang-Zhang both fail
        let series = flat_series(2);
        let methods: Vec<VolatilityMethod> = estimate_all_volatilities(&series, 252.0)
            .iter()
            .map(|e| e.method)
            .collect();
        assert_eq!(
            methods,
            vec![
                VolatilityMethod::Parkinson,
                VolatilityMethod::GarmanKlass,
                VolatilityMethod::RogersSatchell
            ]
        );
    }

    #[test]
    fn test_all_methods_recover_gbm_volatility() {
        let config = GeneratorConfig {
            length: 1000,
            seed: Some(21),
            ..Default::default()
        };
        let series = generate_gbm_bars(&config, 0.05, 0.25).unwrap();
        for estimate in estimate_all_volatilities(&series, 252.0) {
            assert!(
                (estimate.annualized_volatility - 0.25).abs() < 0.05,
                "{:?}: {}",
                estimate.method,
                estimate.annualized_volatility
            );
            assert_eq!(
                estimate.relative_efficiency,
                estimate.method.relative_efficiency()
            );
        }
    }
}
