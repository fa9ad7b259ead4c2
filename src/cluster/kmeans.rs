use ndarray::Axis;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    cluster::ClusterAssignment,
    error::{Error, Result},
    utils::math::dense::{column_variances, squared_euclidean, DenseMatrix},
};

/// K-means with k-means++ seeding and several seeded restarts.
///
/// ```
/// use incident_lsi::cluster::Kmeans;
///
/// let data = ndarray::array![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]];
/// let fit = Kmeans::new(2).with_seed(42).fit(&data).unwrap();
/// assert_eq!(fit.labels()[0], fit.labels()[1]);
/// assert_ne!(fit.labels()[0], fit.labels()[2]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kmeans {
    k: usize,
    n_init: usize,
    max_iter: usize,
    tol: f64,
    seed: u64,
}

/// Result of one restart.
enum Trial {
    Converged {
        centroids: DenseMatrix,
        labels: Vec<usize>,
        inertia: f64,
        n_iter: usize,
    },
    Exhausted {
        last_shift: f64,
    },
}

impl Kmeans {
    pub fn new(k: usize) -> Self {
        Kmeans {
            k,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Relative tolerance, scaled by the mean feature variance of the data.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.k
    }

    /// Run every restart and keep the one with the lowest inertia.
    ///
    /// Restart `t` is seeded with `seed + t`; ties go to the lowest `t`.
    /// Restarts that hit `max_iter` are discarded.
    ///
    /// # Errors
    /// [`Error::Configuration`] for `k == 0`, `k` above the number of rows,
    /// or non-positive trial settings. [`Error::Numerical`] when no restart
    /// converges.
    pub fn fit(&self, data: &DenseMatrix) -> Result<ClusterAssignment> {
        let n = data.nrows();
        if self.k == 0 || self.k > n {
            return Err(Error::config(format!(
                "n_clusters must be in 1..={n}, got {}",
                self.k
            )));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(Error::config("n_init and max_iter must be positive"));
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(Error::config(format!("tol must be finite and non-negative, got {}", self.tol)));
        }

        let variances = column_variances(data);
        let mean_variance = if variances.is_empty() {
            0.0
        } else {
            variances.iter().sum::<f64>() / variances.len() as f64
        };
        let tol_abs = self.tol * mean_variance;

        let trials: Vec<Trial> = (0..self.n_init)
            .into_par_iter()
            .map(|t| self.run_trial(data, self.seed.wrapping_add(t as u64), tol_abs))
            .collect();

        let mut best: Option<(usize, Trial)> = None;
        let mut min_shift = f64::INFINITY;
        for (t, trial) in trials.into_iter().enumerate() {
            match trial {
                Trial::Exhausted { last_shift } => {
                    warn!(trial = t, last_shift, "k-means restart hit the iteration cap");
                    min_shift = min_shift.min(last_shift);
                }
                Trial::Converged { inertia, .. } => {
                    let better = match &best {
                        Some((_, Trial::Converged { inertia: b, .. })) => inertia < *b,
                        _ => true,
                    };
                    if better {
                        best = Some((t, trial));
                    }
                }
            }
        }

        match best {
            Some((
                trial,
                Trial::Converged {
                    centroids,
                    labels,
                    inertia,
                    n_iter,
                },
            )) => {
                info!(n_clusters = self.k, trial, inertia, n_iter, "k-means fitted");
                Ok(ClusterAssignment::new(self.k, labels, centroids, inertia))
            }
            _ => Err(Error::Numerical {
                stage: "clustering",
                iterations: self.max_iter,
                last_delta: min_shift,
            }),
        }
    }

    fn run_trial(&self, data: &DenseMatrix, seed: u64, tol_abs: f64) -> Trial {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut centroids = plus_plus_init(data, self.k, &mut rng);
        let mut labels = assign(data, &centroids);
        let mut last_shift = f64::INFINITY;

        for iter in 1..=self.max_iter {
            let updated = update_centroids(data, &labels, &centroids);
            last_shift = (0..self.k)
                .map(|c| squared_euclidean(centroids.row(c), updated.row(c)))
                .sum();
            centroids = updated;
            let relabeled = assign(data, &centroids);
            let stable = relabeled == labels;
            labels = relabeled;
            if stable || last_shift <= tol_abs {
                let inertia = inertia(data, &labels, &centroids);
                debug!(seed, iter, inertia, "k-means restart converged");
                return Trial::Converged {
                    centroids,
                    labels,
                    inertia,
                    n_iter: iter,
                };
            }
        }
        Trial::Exhausted { last_shift }
    }
}

/// k-means++: first center uniform, then proportional to squared distance.
fn plus_plus_init(data: &DenseMatrix, k: usize, rng: &mut ChaCha8Rng) -> DenseMatrix {
    let n = data.nrows();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.random_range(0..n));
    let mut dist: Vec<f64> = (0..n)
        .map(|i| squared_euclidean(data.row(i), data.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f64 = dist.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = None;
            for (i, d) in dist.iter().enumerate() {
                acc += d;
                if *d > 0.0 && acc > target {
                    pick = Some(i);
                    break;
                }
            }
            // rounding can leave the target past the last positive entry
            pick.or_else(|| dist.iter().rposition(|d| *d > 0.0)).unwrap_or(0)
        } else {
            // every point coincides with a center already
            rng.random_range(0..n)
        };
        chosen.push(next);
        for (i, d) in dist.iter_mut().enumerate() {
            *d = d.min(squared_euclidean(data.row(i), data.row(next)));
        }
    }
    data.select(Axis(0), &chosen)
}

/// Nearest centroid per row; ties go to the lower centroid index.
fn assign(data: &DenseMatrix, centroids: &DenseMatrix) -> Vec<usize> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut best = 0;
            let mut best_d = f64::INFINITY;
            for c in 0..centroids.nrows() {
                let d = squared_euclidean(row, centroids.row(c));
                if d < best_d {
                    best = c;
                    best_d = d;
                }
            }
            best
        })
        .collect()
}

/// Member means; a cluster with no members keeps its previous centroid.
fn update_centroids(data: &DenseMatrix, labels: &[usize], previous: &DenseMatrix) -> DenseMatrix {
    let mut sums = DenseMatrix::zeros(previous.raw_dim());
    let mut counts = vec![0usize; previous.nrows()];
    for (i, &label) in labels.iter().enumerate() {
        counts[label] += 1;
        let mut sum = sums.row_mut(label);
        sum += &data.row(i);
    }
    for (c, &count) in counts.iter().enumerate() {
        let mut row = sums.row_mut(c);
        if count == 0 {
            row.assign(&previous.row(c));
        } else {
            row /= count as f64;
        }
    }
    sums
}

fn inertia(data: &DenseMatrix, labels: &[usize], centroids: &DenseMatrix) -> f64 {
    labels
        .iter()
        .enumerate()
        .map(|(i, &c)| squared_euclidean(data.row(i), centroids.row(c)))
        .sum()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::utils::math::dense;

    fn blobs() -> DenseMatrix {
        array![[0.0, 0.0], [0.2, 0.1], [0.1, 0.3], [5.0, 5.0], [5.2, 4.9], [4.8, 5.1]]
    }

    #[test]
    fn separates_two_blobs() {
        let fit = Kmeans::new(2).fit(&blobs()).unwrap();
        let labels = fit.labels();
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[0], labels[3]);
        assert_eq!(fit.sizes(), {
            let mut s = vec![0; 2];
            s[labels[0]] = 3;
            s[labels[3]] = 3;
            s
        });
    }

    #[test]
    fn same_seed_same_result() {
        let a = Kmeans::new(3).with_seed(9).fit(&blobs()).unwrap();
        let b = Kmeans::new(3).with_seed(9).fit(&blobs()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_cluster_counts_are_rejected() {
        assert!(matches!(Kmeans::new(0).fit(&blobs()), Err(Error::Configuration(_))));
        assert!(matches!(Kmeans::new(7).fit(&blobs()), Err(Error::Configuration(_))));
    }

    #[test]
    fn coincident_points_surface_empty_clusters() {
        let data = array![[1.0], [1.0], [1.0]];
        let fit = Kmeans::new(2).with_n_init(1).fit(&data).unwrap();
        assert_eq!(fit.labels(), &[0, 0, 0]);
        assert_eq!(fit.sizes(), vec![3, 0]);
        assert_eq!(fit.inertia(), 0.0);
    }

    #[test]
    fn k_equal_to_rows_puts_each_point_alone() {
        let data = array![[0.0], [10.0], [20.0]];
        let fit = Kmeans::new(3).fit(&data).unwrap();
        assert_eq!(fit.sizes(), vec![1, 1, 1]);
    }

    fn scattered(n: usize) -> DenseMatrix {
        dense::from_rows(
            2,
            (0..n)
                .map(|i| vec![((i * 37) % 101) as f64, ((i * 59) % 103) as f64])
                .collect(),
        )
    }

    #[test]
    fn every_restart_hitting_the_cap_is_a_numerical_error() {
        let err = Kmeans::new(8)
            .with_max_iter(1)
            .with_tol(0.0)
            .with_n_init(3)
            .fit(&scattered(200))
            .unwrap_err();
        match err {
            Error::Numerical {
                stage,
                iterations,
                last_delta,
            } => {
                assert_eq!(stage, "clustering");
                assert_eq!(iterations, 1);
                assert!(last_delta > 0.0 && last_delta.is_finite());
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn enough_iterations_converge_on_the_same_data() {
        let fit = Kmeans::new(8).with_n_init(3).fit(&scattered(200)).unwrap();
        assert_eq!(fit.sizes().iter().sum::<usize>(), 200);
        assert!(fit.is_consistent(200, 2));
    }
}
