//! Gaussian hidden Markov model fitted by Baum-Welch EM.
//!
//! All recursions run in log space: emission densities, forward variables
//! (`log_alpha`) and backward variables (`log_beta`) are combined with
//! [`logsumexp`], so sequences of thousands of observations never underflow.
//!
//! The E-step produces the smoothed state posterior `γ[t][i]` and the pairwise
//! transition posterior summed over time, `Σₜ ξ[t][i][j]`; the full `T×k×k` tensor
//! is never materialized. The M-step re-estimates per-state means and standard
//! deviations, transition rows and the initial distribution from those sums.

use crate::errors::{EstimationError, EstimationResult};
use crate::math_utils::constants::{LN_TWO_PI, MIN_LOG_VALUE, MIN_VARIANCE};
use crate::math_utils::logsumexp;

/// State weight below which M-step updates are skipped for that state.
const MIN_STATE_WEIGHT: f64 = 1e-10;

/// Hidden Markov model with univariate Gaussian emissions.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianHmm {
    /// Initial state probabilities
    pub initial_probs: Vec<f64>,
    /// Row-stochastic transition matrix, `[from][to]`
    pub transition_matrix: Vec<Vec<f64>>,
    /// Emission mean per state
    pub means: Vec<f64>,
    /// Emission standard deviation per state
    pub stds: Vec<f64>,
}

/// Smoothed posteriors from one forward-backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    /// `gamma[t][i] = P(S_t = i | all observations)`
    pub gamma: Vec<Vec<f64>>,
    /// `xi_sum[i][j] = Σₜ P(S_t = i, S_{t+1} = j | all observations)`
    pub xi_sum: Vec<Vec<f64>>,
    /// Log-likelihood of the observation sequence
    pub log_likelihood: f64,
}

impl Posterior {
    /// Expected number of observations spent in each state.
    pub fn state_occupancy(&self) -> Vec<f64> {
        let k = self.xi_sum.len();
        let mut occupancy = vec![0.0; k];
        for row in &self.gamma {
            for (total, p) in occupancy.iter_mut().zip(row) {
                *total += p;
            }
        }
        occupancy
    }
}

/// Outcome of an EM fit.
#[derive(Debug, Clone, PartialEq)]
pub struct EmFit {
    /// Log-likelihood at the final E-step
    pub log_likelihood: f64,
    /// EM iterations performed
    pub iterations: usize,
    /// Whether the log-likelihood change fell below tolerance
    pub converged: bool,
    /// Posteriors from the final E-step
    pub posterior: Posterior,
}

impl GaussianHmm {
    /// Build a model, checking that all dimensions agree.
    pub fn new(
        initial_probs: Vec<f64>,
        transition_matrix: Vec<Vec<f64>>,
        means: Vec<f64>,
        stds: Vec<f64>,
    ) -> EstimationResult<Self> {
        let k = initial_probs.len();
        if k == 0
            || transition_matrix.len() != k
            || transition_matrix.iter().any(|row| row.len() != k)
            || means.len() != k
            || stds.len() != k
        {
            return Err(EstimationError::InvalidParameter {
                parameter: "num_states".to_string(),
                value: k as f64,
                constraint: "initial, transition, mean and std dimensions must agree".to_string(),
            });
        }
        if stds.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(EstimationError::InvalidParameter {
                parameter: "stds".to_string(),
                value: stds.iter().copied().fold(f64::INFINITY, f64::min),
                constraint: "finite and > 0".to_string(),
            });
        }
        Ok(Self {
            initial_probs,
            transition_matrix,
            means,
            stds,
        })
    }

    /// Number of hidden states.
    pub fn num_states(&self) -> usize {
        self.means.len()
    }

    /// Gaussian log-density of `x` under `state`.
    pub fn emission_log_prob(&self, x: f64, state: usize) -> f64 {
        let sd = self.stds[state];
        let z = (x - self.means[state]) / sd;
        -0.5 * LN_TWO_PI - sd.ln() - 0.5 * z * z
    }

    /// E-step: forward-backward in log space.
    ///
    /// # Errors
    /// * `InsufficientData` for fewer than two observations
    /// * `NumericalError` when the sequence log-likelihood is not finite
    pub fn forward_backward(&self, observations: &[f64]) -> EstimationResult<Posterior> {
        let t_len = observations.len();
        let k = self.num_states();
        if t_len < 2 {
            return Err(EstimationError::InsufficientData {
                required: 2,
                actual: t_len,
            });
        }

        let log_emission: Vec<Vec<f64>> = observations
            .iter()
            .map(|&x| (0..k).map(|j| self.emission_log_prob(x, j)).collect())
            .collect();
        let log_transition: Vec<Vec<f64>> = self
            .transition_matrix
            .iter()
            .map(|row| row.iter().map(|p| (p + MIN_LOG_VALUE).ln()).collect())
            .collect();

        let mut terms = vec![0.0; k];

        // Forward
        let mut log_alpha = vec![vec![0.0; k]; t_len];
        for j in 0..k {
            log_alpha[0][j] = (self.initial_probs[j] + MIN_LOG_VALUE).ln() + log_emission[0][j];
        }
        for t in 1..t_len {
            for j in 0..k {
                for i in 0..k {
                    terms[i] = log_alpha[t - 1][i] + log_transition[i][j];
                }
                log_alpha[t][j] = logsumexp(&terms) + log_emission[t][j];
            }
        }
        let log_likelihood = logsumexp(&log_alpha[t_len - 1]);
        if !log_likelihood.is_finite() {
            return Err(EstimationError::NumericalError {
                reason: format!("sequence log-likelihood is {}", log_likelihood),
                operation: Some("forward_backward".to_string()),
            });
        }

        // Backward
        let mut log_beta = vec![vec![0.0; k]; t_len];
        for t in (0..t_len - 1).rev() {
            for i in 0..k {
                for j in 0..k {
                    terms[j] = log_transition[i][j] + log_emission[t + 1][j] + log_beta[t + 1][j];
                }
                log_beta[t][i] = logsumexp(&terms);
            }
        }

        let gamma: Vec<Vec<f64>> = (0..t_len)
            .map(|t| {
                let joint: Vec<f64> = (0..k).map(|i| log_alpha[t][i] + log_beta[t][i]).collect();
                let norm = logsumexp(&joint);
                joint.iter().map(|v| (v - norm).exp()).collect()
            })
            .collect();

        let mut xi_sum = vec![vec![0.0; k]; k];
        for t in 0..t_len - 1 {
            for (i, row) in xi_sum.iter_mut().enumerate() {
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell += (log_alpha[t][i]
                        + log_transition[i][j]
                        + log_emission[t + 1][j]
                        + log_beta[t + 1][j]
                        - log_likelihood)
                        .exp();
                }
            }
        }

        Ok(Posterior {
            gamma,
            xi_sum,
            log_likelihood,
        })
    }

    /// M-step: re-estimate all parameters from a posterior.
    pub fn update_parameters(&mut self, observations: &[f64], posterior: &Posterior) {
        let occupancy = posterior.state_occupancy();

        for (i, &weight) in occupancy.iter().enumerate() {
            if weight <= MIN_STATE_WEIGHT {
                continue;
            }
            let mean = observations
                .iter()
                .zip(&posterior.gamma)
                .map(|(x, g)| g[i] * x)
                .sum::<f64>()
                / weight;
            let var = observations
                .iter()
                .zip(&posterior.gamma)
                .map(|(x, g)| g[i] * (x - mean) * (x - mean))
                .sum::<f64>()
                / weight;
            self.means[i] = mean;
            self.stds[i] = var.max(MIN_VARIANCE).sqrt();
        }

        for (row, xi_row) in self.transition_matrix.iter_mut().zip(&posterior.xi_sum) {
            let total: f64 = xi_row.iter().sum();
            if total > MIN_STATE_WEIGHT {
                for (p, xi) in row.iter_mut().zip(xi_row) {
                    *p = xi / total;
                }
            }
        }

        self.initial_probs.clone_from(&posterior.gamma[0]);
    }

    /// Baum-Welch: alternate E and M steps until the log-likelihood moves by less
    /// than `tolerance`, or `max_iterations` E-steps have run.
    ///
    /// On convergence the model holds the parameters the final posterior was
    /// computed with.
    pub fn fit(
        &mut self,
        observations: &[f64],
        tolerance: f64,
        max_iterations: usize,
    ) -> EstimationResult<EmFit> {
        let mut prev_log_likelihood = f64::NEG_INFINITY;
        let mut last: Option<Posterior> = None;
        let mut converged = false;
        let mut iterations = 0;

        for _ in 0..max_iterations {
            iterations += 1;
            let posterior = self.forward_backward(observations)?;
            if (posterior.log_likelihood - prev_log_likelihood).abs() < tolerance {
                converged = true;
                last = Some(posterior);
                break;
            }
            prev_log_likelihood = posterior.log_likelihood;
            self.update_parameters(observations, &posterior);
            last = Some(posterior);
        }

        let posterior = last.ok_or_else(|| EstimationError::InvalidParameter {
            parameter: "max_iterations".to_string(),
            value: 0.0,
            constraint: ">= 1".to_string(),
        })?;
        Ok(EmFit {
            log_likelihood: posterior.log_likelihood,
            iterations,
            converged,
            posterior,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn two_state() -> GaussianHmm {
        GaussianHmm::new(
            vec![0.5, 0.5],
            vec![vec![0.9, 0.1], vec![0.2, 0.8]],
            vec![-1.0, 1.0],
            vec![0.5, 0.5],
        )
        .unwrap()
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        assert!(GaussianHmm::new(vec![1.0], vec![vec![1.0]], vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(GaussianHmm::new(vec![1.0], vec![vec![1.0]], vec![0.0], vec![0.0]).is_err());
    }

    #[test]
    fn test_single_state_likelihood_is_gaussian() {
        let hmm = GaussianHmm::new(vec![1.0], vec![vec![1.0]], vec![0.0], vec![1.0]).unwrap();
        let obs = [0.3, -1.2, 0.8];
        let posterior = hmm.forward_backward(&obs).unwrap();
        let expected: f64 = obs.iter().map(|x| -0.5 * LN_TWO_PI - 0.5 * x * x).sum();
        assert_approx_eq!(posterior.log_likelihood, expected, 1e-9);
    }

    #[test]
    fn test_posteriors_are_distributions() {
        let obs = [-1.1, -0.9, 1.2, 0.8, 1.1, -1.0];
        let posterior = two_state().forward_backward(&obs).unwrap();
        for row in &posterior.gamma {
            assert_approx_eq!(row.iter().sum::<f64>(), 1.0, 1e-9);
        }
        let total_xi: f64 = posterior.xi_sum.iter().flatten().sum();
        assert_approx_eq!(total_xi, (obs.len() - 1) as f64, 1e-9);
        assert!(posterior.gamma[0][0] > 0.9);
        assert!(posterior.gamma[2][1] > 0.9);
    }

    #[test]
    fn test_em_never_decreases_likelihood() {
        let obs: Vec<f64> = (0..200)
            .map(|t| (if (t / 25) % 2 == 0 { -1.0 } else { 1.0 }) + 0.3 * ((t as f64) * 1.7).sin())
            .collect();
        let mut hmm = two_state();
        let mut previous = f64::NEG_INFINITY;
        for _ in 0..10 {
            let posterior = hmm.forward_backward(&obs).unwrap();
            assert!(posterior.log_likelihood >= previous - 1e-8);
            previous = posterior.log_likelihood;
            hmm.update_parameters(&obs, &posterior);
        }
    }

    #[test]
    fn test_fit_converges_and_rows_stay_stochastic() {
        let obs: Vec<f64> = (0..300)
            .map(|t| (if (t / 30) % 2 == 0 { -2.0 } else { 2.0 }) + 0.4 * ((t as f64) * 2.3).cos())
            .collect();
        let mut hmm = two_state();
        let fit = hmm.fit(&obs, 1e-8, 500).unwrap();
        assert!(fit.converged);
        for row in &hmm.transition_matrix {
            assert_approx_eq!(row.iter().sum::<f64>(), 1.0, 1e-9);
        }
        assert!(hmm.transition_matrix[0][0] > 0.9);
        assert_approx_eq!(hmm.means[0], -2.0, 0.1);
    }
}
