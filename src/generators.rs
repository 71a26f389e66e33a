//! Synthetic price series with known parameters.
//!
//! Used to validate the estimators: each generator draws from a model whose true
//! parameters are known and returns either raw returns or a validated [`BarSeries`].
//!
//! Bars are built from an intraday path of [`INTRADAY_STEPS`] log-price increments,
//! so highs and lows behave like real ranges; each bar opens at the previous close.
//! Dates advance over weekdays only.
//!
//! ## Available Generators
//!
//! - **GBM**: constant drift and volatility
//! - **GARCH(1,1)**: volatility clustering
//! - **Regime switching**: Markov chain over Gaussian regimes
//! - **Stochastic variance**: Heston-type mean-reverting variance with leverage

use crate::bars::{Bar, BarSeries};
use crate::errors::{validate_parameter, EstimationError, EstimationResult};
use crate::rng::SeededRng;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand_distr::{Distribution, LogNormal, StandardNormal};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Log-price increments simulated inside each bar.
pub const INTRADAY_STEPS: usize = 100;
/// Periods per year assumed when annual parameters are converted to per-bar ones.
const PERIODS_PER_YEAR: f64 = 252.0;

/// Common generation settings.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneratorConfig {
    /// Number of bars (or returns) to generate
    pub length: usize,
    /// Seed for reproducible generation; `None` draws from OS entropy
    pub seed: Option<u64>,
    /// Ticker of generated series
    pub ticker: String,
    /// Date of the first bar
    pub start_date: NaiveDate,
    /// Opening price of the first bar
    pub initial_price: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            length: 1000,
            seed: None,
            ticker: "SYNTH".to_string(),
            start_date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap_or_default(),
            initial_price: 100.0,
        }
    }
}

impl GeneratorConfig {
    fn rng(&self) -> SeededRng {
        match self.seed {
            Some(seed) => SeededRng::with_seed(seed),
            None => SeededRng::new(),
        }
    }

    fn validate(&self) -> EstimationResult<()> {
        if self.length < BarSeries::MIN_BARS {
            return Err(EstimationError::InvalidParameter {
                parameter: "length".to_string(),
                value: self.length as f64,
                constraint: format!(">= {}", BarSeries::MIN_BARS),
            });
        }
        if !(self.initial_price.is_finite() && self.initial_price > 0.0) {
            return Err(EstimationError::InvalidParameter {
                parameter: "initial_price".to_string(),
                value: self.initial_price,
                constraint: "finite and > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// One Gaussian regime in per-period units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegimeSpec {
    /// Mean return per period
    pub mean: f64,
    /// Return standard deviation per period
    pub std: f64,
}

/// Heston-type stochastic variance, annual units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HestonSpec {
    /// Drift
    pub mu: f64,
    /// Mean-reversion speed
    pub kappa: f64,
    /// Long-run annual variance (also the starting variance)
    pub theta: f64,
    /// Volatility of variance
    pub sigma_v: f64,
    /// Correlation of price and variance shocks
    pub rho: f64,
}

/// Bar dates: consecutive weekdays from `start` (moved forward off a weekend).
pub fn trading_dates(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut date = start;
    while dates.len() < count {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
        }
        date += Duration::days(1);
    }
    dates
}

struct IntradayBar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    /// Sum of the intraday shocks scaled to unit variance
    shock: f64,
}

/// Simulate one bar whose log return is `N(drift, vol²)`.
fn intraday_bar(open: f64, drift: f64, vol: f64, rng: &mut SeededRng) -> IntradayBar {
    let steps = INTRADAY_STEPS as f64;
    let step_drift = drift / steps;
    let step_vol = vol / steps.sqrt();

    let mut log_price = open.ln();
    let (mut high, mut low) = (log_price, log_price);
    let mut shock_sum = 0.0;
    for _ in 0..INTRADAY_STEPS {
        let z: f64 = StandardNormal.sample(rng);
        shock_sum += z;
        log_price += step_drift + step_vol * z;
        high = high.max(log_price);
        low = low.min(log_price);
    }

    // exp(ln(open)) may differ from open in the last bit
    let close = log_price.exp();
    IntradayBar {
        open,
        high: high.exp().max(open).max(close),
        low: low.exp().min(open).min(close),
        close,
        shock: shock_sum / steps.sqrt(),
    }
}

/// Assemble bars from per-bar `(drift, vol)` pairs supplied by `next`.
///
/// `next` sees the previous bar's standardized shock, letting variance processes
/// react to price moves.
fn simulate_bars<F>(config: &GeneratorConfig, mut next: F) -> EstimationResult<BarSeries>
where
    F: FnMut(f64, &mut SeededRng) -> (f64, f64),
{
    config.validate()?;
    let mut rng = config.rng();
    let volume_dist =
        LogNormal::<f64>::new(13.8, 0.3).map_err(|e| EstimationError::InvalidParameter {
            parameter: "volume distribution".to_string(),
            value: 0.3,
            constraint: e.to_string(),
        })?;

    let mut bars = Vec::with_capacity(config.length);
    let mut price = config.initial_price;
    let mut last_shock = 0.0;
    for date in trading_dates(config.start_date, config.length) {
        let (drift, vol) = next(last_shock, &mut rng);
        let bar = intraday_bar(price, drift, vol, &mut rng);
        let volume = volume_dist.sample(&mut rng).round();
        bars.push(Bar::new(date, bar.open, bar.high, bar.low, bar.close, volume)?);
        price = bar.close;
        last_shock = bar.shock;
    }
    BarSeries::new(config.ticker.clone(), bars)
}

/// GBM bars with annual drift `mu` and volatility `sigma`.
pub fn generate_gbm_bars(
    config: &GeneratorConfig,
    mu: f64,
    sigma: f64,
) -> EstimationResult<BarSeries> {
    validate_parameter(sigma, 0.0, 10.0, "sigma")?;
    let dt = 1.0 / PERIODS_PER_YEAR;
    let drift = (mu - 0.5 * sigma * sigma) * dt;
    let vol = sigma * dt.sqrt();
    simulate_bars(config, |_, _| (drift, vol))
}

fn validate_garch(omega: f64, alpha: f64, beta: f64) -> EstimationResult<()> {
    if !(omega.is_finite() && omega > 0.0) {
        return Err(EstimationError::InvalidParameter {
            parameter: "omega".to_string(),
            value: omega,
            constraint: "> 0".to_string(),
        });
    }
    validate_parameter(alpha, 0.0, 1.0, "alpha")?;
    validate_parameter(beta, 0.0, 1.0, "beta")?;
    if alpha + beta >= 1.0 {
        return Err(EstimationError::InvalidParameter {
            parameter: "alpha + beta".to_string(),
            value: alpha + beta,
            constraint: "< 1".to_string(),
        });
    }
    Ok(())
}

/// GARCH(1,1) returns started from the unconditional variance.
pub fn generate_garch_returns(
    n: usize,
    omega: f64,
    alpha: f64,
    beta: f64,
    rng: &mut SeededRng,
) -> EstimationResult<Vec<f64>> {
    validate_garch(omega, alpha, beta)?;
    let mut h = omega / (1.0 - alpha - beta);
    let mut returns = Vec::with_capacity(n);
    for _ in 0..n {
        let z: f64 = StandardNormal.sample(rng);
        let r = h.sqrt() * z;
        returns.push(r);
        h = omega + alpha * r * r + beta * h;
    }
    Ok(returns)
}

/// Bars whose close-to-close returns follow GARCH(1,1) variances.
pub fn generate_garch_bars(
    config: &GeneratorConfig,
    omega: f64,
    alpha: f64,
    beta: f64,
) -> EstimationResult<BarSeries> {
    validate_garch(omega, alpha, beta)?;
    let mut h = omega / (1.0 - alpha - beta);
    let mut first = true;
    simulate_bars(config, move |shock, _| {
        if !first {
            let r = h.sqrt() * shock;
            h = omega + alpha * r * r + beta * h;
        }
        first = false;
        (0.0, h.sqrt())
    })
}

fn validate_regimes(regimes: &[RegimeSpec], transition: &[Vec<f64>]) -> EstimationResult<()> {
    let k = regimes.len();
    if k == 0 || transition.len() != k || transition.iter().any(|row| row.len() != k) {
        return Err(EstimationError::InvalidParameter {
            parameter: "regimes".to_string(),
            value: k as f64,
            constraint: "non-empty with a matching square transition matrix".to_string(),
        });
    }
    for row in transition {
        let total: f64 = row.iter().sum();
        if row.iter().any(|p| *p < 0.0) || (total - 1.0).abs() > 1e-9 {
            return Err(EstimationError::InvalidParameter {
                parameter: "transition".to_string(),
                value: total,
                constraint: "rows must be non-negative and sum to 1".to_string(),
            });
        }
    }
    Ok(())
}

fn next_state(current: usize, transition: &[Vec<f64>], rng: &mut SeededRng) -> usize {
    let u = rng.f64();
    let mut cumulative = 0.0;
    for (j, p) in transition[current].iter().enumerate() {
        cumulative += p;
        if u < cumulative {
            return j;
        }
    }
    transition[current].len() - 1
}

/// Returns from a Markov chain over Gaussian regimes, starting in regime 0.
pub fn generate_regime_returns(
    n: usize,
    regimes: &[RegimeSpec],
    transition: &[Vec<f64>],
    rng: &mut SeededRng,
) -> EstimationResult<Vec<f64>> {
    validate_regimes(regimes, transition)?;
    let mut state = 0;
    let mut returns = Vec::with_capacity(n);
    for _ in 0..n {
        let z: f64 = StandardNormal.sample(rng);
        returns.push(regimes[state].mean + regimes[state].std * z);
        state = next_state(state, transition, rng);
    }
    Ok(returns)
}

/// Bars driven by a Markov chain over Gaussian regimes, starting in regime 0.
pub fn generate_regime_bars(
    config: &GeneratorConfig,
    regimes: &[RegimeSpec],
    transition: &[Vec<f64>],
) -> EstimationResult<BarSeries> {
    validate_regimes(regimes, transition)?;
    let mut state = 0;
    let mut first = true;
    simulate_bars(config, |_, rng| {
        if !first {
            state = next_state(state, transition, rng);
        }
        first = false;
        (regimes[state].mean, regimes[state].std)
    })
}

/// Bars under Heston-type stochastic variance, Euler scheme with full truncation.
///
/// The variance shock of each step is correlated with the preceding bar's price
/// shock by `rho`.
pub fn generate_heston_bars(
    config: &GeneratorConfig,
    spec: &HestonSpec,
) -> EstimationResult<BarSeries> {
    validate_parameter(spec.rho, -1.0, 1.0, "rho")?;
    if !(spec.theta > 0.0 && spec.kappa > 0.0 && spec.sigma_v >= 0.0) {
        return Err(EstimationError::InvalidParameter {
            parameter: "heston".to_string(),
            value: spec.theta.min(spec.kappa),
            constraint: "theta > 0, kappa > 0, sigma_v >= 0".to_string(),
        });
    }
    let dt = 1.0 / PERIODS_PER_YEAR;
    let mut v = spec.theta;
    let mut first = true;
    let orthogonal = (1.0 - spec.rho * spec.rho).sqrt();
    simulate_bars(config, |shock, rng| {
        if !first {
            let w: f64 = StandardNormal.sample(rng);
            let z_v = spec.rho * shock + orthogonal * w;
            let v_pos = v.max(0.0);
            v += spec.kappa * (spec.theta - v_pos) * dt
                + spec.sigma_v * (v_pos * dt).sqrt() * z_v;
        }
        first = false;
        let v_pos = v.max(0.0);
        ((spec.mu - 0.5 * v_pos) * dt, (v_pos * dt).sqrt())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math_utils::{mean, std_dev};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_trading_dates_skip_weekends() {
        // 2024-01-05 is a Friday
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let dates = trading_dates(start, 3);
        assert_eq!(dates[1], NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
    }

    #[test]
    fn test_gbm_bars_are_consistent() {
        let config = GeneratorConfig {
            length: 250,
            seed: Some(1),
            ..Default::default()
        };
        let series = generate_gbm_bars(&config, 0.05, 0.2).unwrap();
        assert_eq!(series.len(), 250);
        assert_eq!(series.opens()[0], 100.0);
        for pair in series.bars().windows(2) {
            assert_eq!(pair[1].open(), pair[0].close());
            assert!(pair[1].date() > pair[0].date());
        }
        let daily_sd = std_dev(series.log_returns(), 1);
        assert!((daily_sd * 252f64.sqrt() - 0.2).abs() < 0.04);
    }

    #[test]
    fn test_every_seed_yields_valid_bars() {
        for seed in 0..200 {
            let config = GeneratorConfig {
                length: 300,
                seed: Some(seed),
                ..Default::default()
            };
            let gbm = generate_gbm_bars(&config, 0.08, 0.2);
            assert!(gbm.is_ok(), "seed {}: {:?}", seed, gbm.err());
            let garch = generate_garch_bars(&config, 2e-6, 0.12, 0.86);
            assert!(garch.is_ok(), "seed {}: {:?}", seed, garch.err());
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let config = GeneratorConfig {
            length: 50,
            seed: Some(7),
            ..Default::default()
        };
        let a = generate_gbm_bars(&config, 0.0, 0.3).unwrap();
        let b = generate_gbm_bars(&config, 0.0, 0.3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_garch_returns_match_unconditional_variance() {
        let mut rng = SeededRng::with_seed(2);
        let returns = generate_garch_returns(20_000, 1e-5, 0.05, 0.9, &mut rng).unwrap();
        let var = std_dev(&returns, 1).powi(2);
        assert!((var / 2e-4 - 1.0).abs() < 0.15, "variance {}", var);
        assert!(generate_garch_returns(10, 1e-5, 0.5, 0.5, &mut rng).is_err());
    }

    #[test]
    fn test_regime_returns_use_both_regimes() {
        let regimes = [
            RegimeSpec { mean: -1.0, std: 0.01 },
            RegimeSpec { mean: 1.0, std: 0.01 },
        ];
        let transition = vec![vec![0.9, 0.1], vec![0.1, 0.9]];
        let mut rng = SeededRng::with_seed(3);
        let returns = generate_regime_returns(2000, &regimes, &transition, &mut rng).unwrap();
        let share_high = returns.iter().filter(|r| **r > 0.0).count() as f64 / 2000.0;
        assert!(share_high > 0.3 && share_high < 0.7);
        assert_approx_eq!(returns[0], -1.0, 0.05);
        assert!(mean(&returns).abs() < 0.4);
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let regimes = [RegimeSpec { mean: 0.0, std: 0.01 }];
        let mut rng = SeededRng::with_seed(1);
        assert!(generate_regime_returns(10, &regimes, &[vec![0.5]], &mut rng).is_err());
    }

    #[test]
    fn test_heston_bars_are_valid() {
        let config = GeneratorConfig {
            length: 300,
            seed: Some(4),
            ..Default::default()
        };
        let spec = HestonSpec {
            mu: 0.05,
            kappa: 3.0,
            theta: 0.04,
            sigma_v: 0.4,
            rho: -0.6,
        };
        let series = generate_heston_bars(&config, &spec).unwrap();
        assert_eq!(series.len(), 300);
        assert!(series.closes().iter().all(|c| c.is_finite() && *c > 0.0));
    }
}
