//! One-dimensional k-means with k-means++ seeding.
//!
//! Used to initialize the regime-switching EM. Centroids are returned in ascending
//! order and labels remapped to match, so two runs that find the same clusters
//! report identical labelings.

use crate::errors::{EstimationError, EstimationResult};
use crate::rng::SeededRng;

/// Relative tolerance for centroid convergence
const RELATIVE_TOLERANCE: f64 = 1e-5;
/// Absolute tolerance for centroid convergence
const ABSOLUTE_TOLERANCE: f64 = 1e-8;

/// Result of a k-means clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index of each observation, consistent with `centroids`
    pub labels: Vec<usize>,
    /// Cluster centers, ascending
    pub centroids: Vec<f64>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
}

/// Cluster `data` into `k` groups, keeping the lowest-inertia of `n_init` runs.
///
/// # Errors
/// * `InvalidParameter` for `k == 0` or `n_init == 0`
/// * `InsufficientData` when there are fewer points than clusters
pub fn kmeans_1d(
    data: &[f64],
    k: usize,
    rng: &mut SeededRng,
    max_iter: usize,
    n_init: usize,
) -> EstimationResult<KMeansFit> {
    if k == 0 || n_init == 0 {
        return Err(EstimationError::InvalidParameter {
            parameter: if k == 0 { "k" } else { "n_init" }.to_string(),
            value: 0.0,
            constraint: ">= 1".to_string(),
        });
    }
    if data.len() < k {
        return Err(EstimationError::InsufficientData {
            required: k,
            actual: data.len(),
        });
    }

    let mut best: Option<KMeansFit> = None;
    for _ in 0..n_init {
        let fit = lloyd(data, seed_centroids(data, k, rng), max_iter);
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    let fit = best.ok_or_else(|| EstimationError::NumericalError {
        reason: "k-means produced no clustering".to_string(),
        operation: Some("kmeans_1d".to_string()),
    })?;
    Ok(sort_clusters(fit))
}

/// k-means++: first center uniform, then proportional to squared distance.
fn seed_centroids(data: &[f64], k: usize, rng: &mut SeededRng) -> Vec<f64> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.usize(0..data.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = data
            .iter()
            .map(|x| {
                centroids
                    .iter()
                    .map(|c| (x - c) * (x - c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = distances.iter().sum();

        let chosen = if total > 0.0 && total.is_finite() {
            let target = rng.f64() * total;
            let mut cumulative = 0.0;
            distances
                .iter()
                .position(|d| {
                    cumulative += d;
                    cumulative >= target
                })
                .unwrap_or(data.len() - 1)
        } else {
            rng.usize(0..data.len())
        };
        centroids.push(data[chosen]);
    }
    centroids
}

fn nearest(x: f64, centroids: &[f64]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (j, c) in centroids.iter().enumerate() {
        let d = (x - c).abs();
        if d < best_dist {
            best = j;
            best_dist = d;
        }
    }
    best
}

/// Lloyd iterations; empty clusters keep their previous center.
fn lloyd(data: &[f64], mut centroids: Vec<f64>, max_iter: usize) -> KMeansFit {
    let k = centroids.len();
    let mut labels: Vec<usize> = data.iter().map(|&x| nearest(x, &centroids)).collect();

    for _ in 0..max_iter {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&x, &label) in data.iter().zip(&labels) {
            sums[label] += x;
            counts[label] += 1;
        }
        let updated: Vec<f64> = (0..k)
            .map(|j| {
                if counts[j] > 0 {
                    sums[j] / counts[j] as f64
                } else {
                    centroids[j]
                }
            })
            .collect();

        let converged = centroids
            .iter()
            .zip(&updated)
            .all(|(old, new)| (old - new).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * new.abs());
        centroids = updated;
        labels = data.iter().map(|&x| nearest(x, &centroids)).collect();
        if converged {
            break;
        }
    }

    let inertia = data
        .iter()
        .zip(&labels)
        .map(|(x, &l)| (x - centroids[l]) * (x - centroids[l]))
        .sum();

    KMeansFit {
        labels,
        centroids,
        inertia,
    }
}

fn sort_clusters(fit: KMeansFit) -> KMeansFit {
    let mut order: Vec<usize> = (0..fit.centroids.len()).collect();
    order.sort_by(|&a, &b| fit.centroids[a].total_cmp(&fit.centroids[b]));

    let mut remap = vec![0; order.len()];
    for (new_label, &old_label) in order.iter().enumerate() {
        remap[old_label] = new_label;
    }

    KMeansFit {
        labels: fit.labels.iter().map(|&l| remap[l]).collect(),
        centroids: order.iter().map(|&j| fit.centroids[j]).collect(),
        inertia: fit.inertia,
    }
}
