//! Markov regime-switching returns.
//!
//! ```text
//! r[t] | S[t] = i ~ N(μᵢ, σᵢ²),   P(S[t+1] = j | S[t] = i) = Pᵢⱼ
//! ```
//!
//! Fitted with [`GaussianHmm`] EM from several k-means++ initializations. Restart `i`
//! draws from a generator seeded with `mix_seed(seed, i)`, so a calibration is
//! reproducible from its configuration alone. Regimes are reported in ascending
//! order of volatility.

use crate::bars::BarSeries;
use crate::config::{EstimatorConfig, RegimeConfig};
use crate::errors::{EstimationError, EstimationResult};
use crate::estimator::{Estimation, Estimator, Warnings};
use crate::hmm::{EmFit, GaussianHmm};
use crate::kmeans::kmeans_1d;
use crate::linear_algebra::least_squares;
use crate::math_utils::std_dev;
use crate::results::{ModelType, ParameterEstimate, RegimeParameters, RegimeSwitchingParameters};
use crate::rng::{mix_seed, SeededRng};
use nalgebra::{DMatrix, DVector};

/// Returns required per regime to fit at all.
const MIN_RETURNS_PER_REGIME: usize = 5;
/// Returns per regime below which the fit is flagged.
const RELIABLE_RETURNS_PER_REGIME: usize = 50;
/// Extra weight on the diagonal of the initial transition matrix.
const INITIAL_PERSISTENCE: f64 = 0.3;
/// Floor on initial per-regime standard deviations.
const MIN_INITIAL_STD: f64 = 1e-6;
/// Lower bound on annualized regime volatility intervals.
const MIN_SIGMA_BOUND: f64 = 0.001;
/// k-means Lloyd iteration cap and restarts per EM initialization.
const KMEANS_MAX_ITER: usize = 100;
const KMEANS_N_INIT: usize = 10;

/// Regime-switching estimator.
#[derive(Debug, Clone, Default)]
pub struct RegimeSwitchingEstimator {
    config: EstimatorConfig,
    regime: RegimeConfig,
}

/// One completed EM restart.
#[derive(Clone)]
struct Restart {
    hmm: GaussianHmm,
    fit: EmFit,
}

impl RegimeSwitchingEstimator {
    /// Create an estimator with shared and regime-specific settings.
    pub fn new(config: EstimatorConfig, regime: RegimeConfig) -> Self {
        Self { config, regime }
    }

    /// Fit directly to a return series.
    ///
    /// # Errors
    /// * `InvalidParameter` for fewer than two regimes
    /// * `InsufficientData` below five returns per regime
    /// * `ConvergenceFailure` when every restart fails numerically
    pub fn estimate_returns(
        &self,
        returns: &[f64],
    ) -> EstimationResult<Estimation<RegimeSwitchingParameters>> {
        self.config.validate()?;
        self.regime.validate()?;
        let k = self.regime.n_regimes;
        let n = returns.len();
        if n < MIN_RETURNS_PER_REGIME * k {
            return Err(EstimationError::InsufficientData {
                required: MIN_RETURNS_PER_REGIME * k,
                actual: n,
            });
        }

        let mut warnings = Warnings::for_model(ModelType::RegimeSwitching);
        if n < RELIABLE_RETURNS_PER_REGIME * k {
            warnings.push(format!(
                "Limited data for {} regimes ({} observations); consider fewer regimes",
                k, n
            ));
        }

        let mut best_converged: Option<Restart> = None;
        let mut best_any: Option<Restart> = None;
        let mut converged_restarts = 0;
        for restart in 0..self.regime.n_init {
            let mut rng = SeededRng::with_seed(mix_seed(self.regime.seed, restart));
            let outcome = self.run_em(returns, &mut rng);
            let candidate = match outcome {
                Ok(candidate) => candidate,
                Err(e) => {
                    log::debug!("Regime-switching restart {} discarded: {}", restart, e);
                    continue;
                }
            };
            log::debug!(
                "Regime-switching restart {}: loglik={:.4}, {} iterations, converged={}",
                restart,
                candidate.fit.log_likelihood,
                candidate.fit.iterations,
                candidate.fit.converged
            );

            if candidate.fit.converged {
                converged_restarts += 1;
                if is_better(&candidate, best_converged.as_ref()) {
                    best_converged = Some(candidate.clone());
                }
            }
            if is_better(&candidate, best_any.as_ref()) {
                best_any = Some(candidate);
            }
        }

        let best = match (best_converged, best_any) {
            (Some(best), _) => best,
            (None, Some(best)) => {
                warnings.push(format!(
                    "EM did not converge within {} iterations in any of {} restarts; \
                     using the highest-likelihood run",
                    self.regime.em_max_iter, self.regime.n_init
                ));
                best
            }
            (None, None) => {
                return Err(EstimationError::ConvergenceFailure {
                    algorithm: "EM".to_string(),
                    reason: format!("all {} restarts failed numerically", self.regime.n_init),
                })
            }
        };

        let params = self.summarize(best, converged_restarts)?;
        Ok(warnings.finish(params))
    }

    fn run_em(&self, returns: &[f64], rng: &mut SeededRng) -> EstimationResult<Restart> {
        let k = self.regime.n_regimes;
        let clusters = kmeans_1d(returns, k, rng, KMEANS_MAX_ITER, KMEANS_N_INIT)?;

        let fallback_std = 0.5 * std_dev(returns, 0);
        let stds: Vec<f64> = (0..k)
            .map(|i| {
                let members: Vec<f64> = returns
                    .iter()
                    .zip(&clusters.labels)
                    .filter_map(|(&r, &label)| (label == i).then_some(r))
                    .collect();
                let sd = if members.len() > 1 {
                    std_dev(&members, 1)
                } else {
                    fallback_std
                };
                sd.max(MIN_INITIAL_STD)
            })
            .collect();

        let uniform = 1.0 / k as f64;
        let row_total = 1.0 + INITIAL_PERSISTENCE;
        let transition: Vec<Vec<f64>> = (0..k)
            .map(|i| {
                (0..k)
                    .map(|j| {
                        let p = if i == j { uniform + INITIAL_PERSISTENCE } else { uniform };
                        p / row_total
                    })
                    .collect()
            })
            .collect();

        let mut hmm = GaussianHmm::new(vec![uniform; k], transition, clusters.centroids, stds)?;
        let fit = hmm.fit(returns, self.regime.em_tolerance, self.regime.em_max_iter)?;
        Ok(Restart { hmm, fit })
    }

    fn summarize(
        &self,
        best: Restart,
        converged_restarts: usize,
    ) -> EstimationResult<RegimeSwitchingParameters> {
        let k = self.regime.n_regimes;
        let days = self.config.trading_days_per_year;
        let level = self.config.confidence_level;
        let occupancy = best.fit.posterior.state_occupancy();

        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| best.hmm.stds[a].total_cmp(&best.hmm.stds[b]));

        let transition_matrix: Vec<Vec<f64>> = order
            .iter()
            .map(|&i| {
                let row: Vec<f64> = order.iter().map(|&j| best.hmm.transition_matrix[i][j]).collect();
                let total: f64 = row.iter().sum();
                row.iter().map(|p| p / total).collect()
            })
            .collect();
        let stationary_distribution = stationary_distribution(&transition_matrix)?;

        let regimes = order
            .iter()
            .enumerate()
            .map(|(rank, &i)| {
                let (mean, sd) = (best.hmm.means[i], best.hmm.stds[i]);
                let eff_n = occupancy[i].max(1.0);
                let mu = mean * days;
                let sigma = sd * days.sqrt();
                let se_mu = sd / eff_n.sqrt() * days;
                let se_sigma = sd / (2.0 * eff_n).sqrt() * days.sqrt();
                RegimeParameters {
                    mu: ParameterEstimate::with_standard_error(
                        format!("mu_{}", rank),
                        mu,
                        Some(se_mu),
                        level,
                    ),
                    sigma: ParameterEstimate::with_standard_error(
                        format!("sigma_{}", rank),
                        sigma,
                        Some(se_sigma),
                        level,
                    )
                    .floor_lower_bound(MIN_SIGMA_BOUND),
                }
            })
            .collect();

        Ok(RegimeSwitchingParameters {
            n_regimes: k,
            regimes,
            transition_matrix,
            stationary_distribution,
            log_likelihood: best.fit.log_likelihood,
            converged_restarts,
        })
    }
}

fn is_better(candidate: &Restart, incumbent: Option<&Restart>) -> bool {
    incumbent.map_or(true, |best| candidate.fit.log_likelihood > best.fit.log_likelihood)
}

/// Stationary distribution of a row-stochastic matrix.
///
/// Solves `π(P − I) = 0` with `Σπ = 1` in the least-squares sense, then clamps
/// negatives to zero and renormalizes.
pub fn stationary_distribution(transition: &[Vec<f64>]) -> EstimationResult<Vec<f64>> {
    let k = transition.len();
    let mut a = DMatrix::zeros(k + 1, k);
    for i in 0..k {
        for j in 0..k {
            // Row i of (Pᵀ − I)
            a[(i, j)] = transition[j][i] - if i == j { 1.0 } else { 0.0 };
        }
        a[(k, i)] = 1.0;
    }
    let mut b = DVector::zeros(k + 1);
    b[k] = 1.0;

    let solution = least_squares(&a, &b)?;
    let clamped: Vec<f64> = solution.iter().map(|p| p.max(0.0)).collect();
    let total: f64 = clamped.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(EstimationError::NumericalError {
            reason: "stationary distribution has no positive mass".to_string(),
            operation: Some("stationary_distribution".to_string()),
        });
    }
    Ok(clamped.iter().map(|p| p / total).collect())
}

impl Estimator for RegimeSwitchingEstimator {
    type Params = RegimeSwitchingParameters;

    fn model_type(&self) -> ModelType {
        ModelType::RegimeSwitching
    }

    fn estimate(
        &self,
        series: &BarSeries,
    ) -> EstimationResult<Estimation<RegimeSwitchingParameters>> {
        self.estimate_returns(series.log_returns())
    }
}
