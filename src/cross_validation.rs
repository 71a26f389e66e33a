//! Walk-forward cross-validation of bootstrap block sizes.
//!
//! The return series is cut into `n_splits + 1` equal folds. For fold `k` the
//! training window is every observation before it, and the fold itself is the
//! held-out window. Each candidate block size predicts the held-out variance as the
//! mean variance of block resamples of the training window; candidates are scored by
//! the mean squared error of that prediction over all usable folds.
//!
//! Resampling uses the ambient generator, so scores are reproducible only under
//! [`crate::rng::global_seed`]. This is a diagnostic and not part of the default
//! block-size estimate.

use crate::bars::BarSeries;
use crate::bootstrap::{resample_into, ResamplingScheme};
use crate::errors::{EstimationError, EstimationResult};
use crate::math_utils::{mean, variance};
use crate::rng::with_thread_local_rng;
use std::collections::BTreeMap;

/// Block sizes tried when the caller supplies none.
pub const DEFAULT_CANDIDATE_SIZES: [usize; 7] = [5, 10, 20, 30, 40, 50, 60];
/// Folds in the default split.
pub const DEFAULT_SPLITS: usize = 5;
/// Held-out windows shorter than this are skipped.
const MIN_TEST_LENGTH: usize = 20;
/// Block resamples per training window.
const RESAMPLES_PER_FOLD: usize = 100;

/// Score block sizes on a bar series' log returns.
pub fn cross_validate_series(
    series: &BarSeries,
    candidate_sizes: Option<&[usize]>,
    n_splits: usize,
) -> EstimationResult<BTreeMap<usize, f64>> {
    cross_validate_block_size(series.log_returns(), candidate_sizes, n_splits)
}

/// Map each usable candidate block size to its held-out variance MSE.
///
/// Candidates of at least `n / 3` are dropped, as are candidates for which no fold
/// could be scored. An empty map means no candidate was usable.
///
/// # Errors
/// * `InvalidParameter` when `n_splits` is zero
pub fn cross_validate_block_size(
    returns: &[f64],
    candidate_sizes: Option<&[usize]>,
    n_splits: usize,
) -> EstimationResult<BTreeMap<usize, f64>> {
    if n_splits == 0 {
        return Err(EstimationError::InvalidParameter {
            parameter: "n_splits".to_string(),
            value: 0.0,
            constraint: ">= 1".to_string(),
        });
    }
    let n = returns.len();
    let candidates: Vec<usize> = candidate_sizes
        .unwrap_or(&DEFAULT_CANDIDATE_SIZES)
        .iter()
        .copied()
        .filter(|&b| b > 0 && b < n / 3)
        .collect();
    let fold_size = n / (n_splits + 1);

    let mut scores = BTreeMap::new();
    for block_size in candidates {
        let mut errors = Vec::with_capacity(n_splits);
        for fold in 0..n_splits {
            let train_end = (fold + 1) * fold_size;
            let test_end = (train_end + fold_size).min(n);
            if test_end.saturating_sub(train_end) < MIN_TEST_LENGTH || train_end < block_size {
                continue;
            }
            let train = &returns[..train_end];
            let predicted = predicted_variance(train, block_size)?;
            let actual = variance(&returns[train_end..test_end], 0);
            errors.push((predicted - actual).powi(2));
        }
        if errors.is_empty() {
            log::debug!("Block size {} skipped: no fold could be scored", block_size);
            continue;
        }
        scores.insert(block_size, mean(&errors));
    }
    Ok(scores)
}

/// Mean population variance over block resamples of `train`.
fn predicted_variance(train: &[f64], block_size: usize) -> EstimationResult<f64> {
    let scheme = ResamplingScheme::Block { block_size };
    let mut buffer = vec![0.0; train.len()];
    with_thread_local_rng(|rng| {
        let mut total = 0.0;
        for _ in 0..RESAMPLES_PER_FOLD {
            resample_into(train, scheme, &mut buffer, rng)?;
            total += variance(&buffer, 0);
        }
        Ok(total / RESAMPLES_PER_FOLD as f64)
    })
}
