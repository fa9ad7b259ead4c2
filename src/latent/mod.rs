pub mod layout;
pub(crate) mod svd;

use ndarray::Array1;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{Error, Result},
    latent::svd::{randomized_svd, SvdOptions},
    utils::math::{
        dense::{column_variances, DenseMatrix},
        vector::{SparseMatrix, SparseVec},
    },
};

/// Parameters of the latent factorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectorParams {
    /// Requested number of components.
    pub k: usize,
    pub seed: u64,
    pub oversamples: usize,
    pub power_iterations: usize,
}

/// Truncated-SVD projection from tf-idf space into a dense latent space.
///
/// The stored document vectors and every later query go through the same
/// [`transform_row`](Self::transform_row), so a query that repeats a corpus
/// document lands exactly on that document's stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentProjector {
    /// k x vocab_size, one right singular vector per row
    components: DenseMatrix,
    singular_values: Vec<f64>,
    requested_k: usize,
    /// fraction of the lexical variance captured per component
    explained_variance_ratio: Vec<f64>,
}

impl LatentProjector {
    /// Fit on the lexical matrix and return the projector with the latent
    /// matrix of the same rows.
    ///
    /// The effective dimensionality is `min(k, vocab_size - 1)`.
    ///
    /// # Errors
    /// [`Error::Configuration`] when the matrix has no rows, `k` is zero or
    /// the vocabulary is too small to leave one component.
    /// [`Error::Numerical`] when the eigen-solve does not converge.
    pub fn fit(x: &SparseMatrix, params: ProjectorParams) -> Result<(Self, DenseMatrix)> {
        if x.n_rows() == 0 {
            return Err(Error::config("cannot factorize an empty matrix"));
        }
        if params.k == 0 {
            return Err(Error::config("k must be positive"));
        }
        let vocab_size = x.n_cols();
        let effective_k = params.k.min(vocab_size.saturating_sub(1));
        if effective_k == 0 {
            return Err(Error::config(format!(
                "vocabulary of {vocab_size} term(s) leaves no latent component"
            )));
        }
        if effective_k < params.k {
            info!(requested = params.k, effective = effective_k, "latent dimensionality clamped");
        }

        let svd = randomized_svd(
            x,
            &SvdOptions {
                k: effective_k,
                oversamples: params.oversamples,
                power_iterations: params.power_iterations,
                seed: params.seed,
            },
        )?;

        let mut projector = LatentProjector {
            components: svd.components,
            singular_values: svd.singular_values,
            requested_k: params.k,
            explained_variance_ratio: Vec::new(),
        };
        let latent = projector.transform(x);

        let total: f64 = x.column_variances().iter().sum();
        projector.explained_variance_ratio = column_variances(&latent)
            .into_iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect();

        info!(
            k = effective_k,
            explained_variance = projector.explained_variance(),
            "latent projector fitted"
        );
        Ok((projector, latent))
    }

    /// Project every row of a lexical matrix.
    pub fn transform(&self, x: &SparseMatrix) -> DenseMatrix {
        let rows: Vec<Array1<f64>> = x.rows().par_iter().map(|row| self.transform_row(row)).collect();
        let mut out = DenseMatrix::zeros((rows.len(), self.effective_k()));
        for (mut dst, src) in out.rows_mut().into_iter().zip(&rows) {
            dst.assign(src);
        }
        out
    }

    /// Project one lexical row.
    pub fn transform_row(&self, row: &SparseVec) -> Array1<f64> {
        self.components.rows().into_iter().map(|c| row.dot_dense(c)).collect()
    }

    #[inline]
    pub fn effective_k(&self) -> usize {
        self.components.nrows()
    }

    #[inline]
    pub fn requested_k(&self) -> usize {
        self.requested_k
    }

    /// Number of lexical columns this projector expects.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    #[inline]
    pub fn components(&self) -> &DenseMatrix {
        &self.components
    }

    #[inline]
    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    #[inline]
    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }

    /// Total fraction of lexical variance kept.
    pub fn explained_variance(&self) -> f64 {
        self.explained_variance_ratio.iter().sum()
    }

    /// Structural check used after loading from disk.
    pub fn is_consistent(&self) -> bool {
        let k = self.components.nrows();
        k > 0
            && k <= self.requested_k
            && self.components.iter().all(|v| v.is_finite())
            && self.singular_values.len() == k
            && self.explained_variance_ratio.len() == k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexical(rows: &[&[f64]]) -> SparseMatrix {
        let n = rows[0].len();
        SparseMatrix::from_rows(
            n,
            rows.iter()
                .map(|r| {
                    let mut v = SparseVec::from_pairs(n, r.iter().copied().enumerate());
                    v.normalize_l2();
                    v
                })
                .collect(),
        )
    }

    fn params(k: usize) -> ProjectorParams {
        ProjectorParams {
            k,
            seed: 42,
            oversamples: 10,
            power_iterations: 5,
        }
    }

    #[test]
    fn k_is_clamped_below_vocabulary_size() {
        let x = lexical(&[&[1.0, 0.0, 1.0], &[0.0, 1.0, 1.0], &[1.0, 1.0, 0.0]]);
        let (projector, latent) = LatentProjector::fit(&x, params(150)).unwrap();
        assert_eq!(projector.requested_k(), 150);
        assert_eq!(projector.effective_k(), 2);
        assert_eq!(latent.dim(), (3, 2));
        assert_eq!(projector.singular_values().len(), 2);
        assert!(projector.is_consistent());
    }

    #[test]
    fn single_term_vocabulary_is_rejected() {
        let x = lexical(&[&[1.0], &[2.0]]);
        let err = LatentProjector::fit(&x, params(2)).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn transform_row_reproduces_stored_rows() {
        let x = lexical(&[&[1.0, 0.2, 0.0, 0.5], &[0.0, 1.0, 0.7, 0.0], &[0.3, 0.0, 1.0, 0.9]]);
        let (projector, latent) = LatentProjector::fit(&x, params(2)).unwrap();
        for (i, row) in x.rows().iter().enumerate() {
            assert_eq!(projector.transform_row(row), latent.row(i));
        }
    }

    #[test]
    fn explained_variance_is_a_fraction() {
        let x = lexical(&[&[1.0, 0.2, 0.0, 0.5], &[0.0, 1.0, 0.7, 0.0], &[0.3, 0.0, 1.0, 0.9]]);
        let (projector, _) = LatentProjector::fit(&x, params(3)).unwrap();
        let ev = projector.explained_variance();
        assert!(ev > 0.0 && ev <= 1.0 + 1e-9, "explained variance {ev}");
        assert_eq!(projector.explained_variance_ratio().len(), projector.effective_k());
        assert!(projector.explained_variance_ratio().iter().all(|r| *r >= 0.0));
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let x = lexical(&[&[1.0, 0.2, 0.0, 0.5], &[0.0, 1.0, 0.7, 0.0], &[0.3, 0.0, 1.0, 0.9]]);
        let (a, la) = LatentProjector::fit(&x, params(2)).unwrap();
        let (b, lb) = LatentProjector::fit(&x, params(2)).unwrap();
        assert_eq!(a, b);
        assert_eq!(la, lb);
    }
}
