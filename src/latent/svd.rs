//! Randomized truncated SVD for sparse, row-major matrices.
//!
//! Range finder with a seeded Gaussian test matrix, a few power iterations,
//! then an exact symmetric eigen-solve of the small projected Gram matrix.
//! Every step is either sequential or row-parallel with a fixed summation
//! order, so the output depends only on the input and the seed.

use ndarray::{Array1, Array2, ArrayViewMut1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use tracing::debug;

use crate::{
    error::{Error, Result},
    utils::math::{
        dense::{sparse_dot, DenseMatrix},
        vector::SparseMatrix,
    },
};

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOL: f64 = 1e-13;
/// Columns whose residual falls below this fraction of their original norm
/// are treated as linearly dependent.
const RANK_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy)]
pub(crate) struct SvdOptions {
    pub k: usize,
    pub oversamples: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TruncatedSvd {
    /// Right singular vectors, one per row (k x n_cols).
    pub components: DenseMatrix,
    pub singular_values: Vec<f64>,
}

pub(crate) fn randomized_svd(x: &SparseMatrix, opts: &SvdOptions) -> Result<TruncatedSvd> {
    let n = x.n_cols();
    debug_assert!(opts.k >= 1 && opts.k <= n);
    let l = (opts.k + opts.oversamples).min(n);
    let xt = x.transpose();

    let omega = gaussian_matrix(n, l, opts.seed);
    let mut q = orthonormalize_columns(&sparse_dot(x, omega.view()));
    for _ in 0..opts.power_iterations {
        let z = orthonormalize_columns(&sparse_dot(&xt, q.view()));
        q = orthonormalize_columns(&sparse_dot(x, z.view()));
    }

    // B^T = X^T Q (n x l); B B^T is the small l x l Gram matrix
    let bt = sparse_dot(&xt, q.view());
    let gram = bt.t().dot(&bt);
    let (eigenvalues, eigenvectors) = jacobi_eigen(&gram)?;

    let mut order: Vec<usize> = (0..l).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]).then_with(|| a.cmp(&b)));

    let s_max = eigenvalues[order[0]].max(0.0).sqrt();
    let mut components = DenseMatrix::zeros((opts.k, n));
    let mut singular_values = Vec::with_capacity(opts.k);
    for (c, &idx) in order.iter().take(opts.k).enumerate() {
        let s = eigenvalues[idx].max(0.0).sqrt();
        if s <= s_max * RANK_TOL || s == 0.0 {
            // rank exhausted: leave a zero component
            singular_values.push(0.0);
            continue;
        }
        let mut row = components.row_mut(c);
        row.assign(&(bt.dot(&eigenvectors.column(idx)) / s));
        flip_sign(row);
        singular_values.push(s);
    }
    debug!(k = opts.k, l, leading = s_max, "randomized svd done");

    Ok(TruncatedSvd {
        components,
        singular_values,
    })
}

fn gaussian_matrix(n_rows: usize, n_cols: usize, seed: u64) -> DenseMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, n_cols), |_| StandardNormal.sample(&mut rng))
}

/// Modified Gram-Schmidt, applied twice per column.
/// Dependent columns come out as zero columns.
fn orthonormalize_columns(m: &DenseMatrix) -> DenseMatrix {
    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(m.ncols());
    for column in m.columns() {
        let mut v = column.to_owned();
        let original = v.dot(&v).sqrt();
        for _ in 0..2 {
            for b in &basis {
                let p = v.dot(b);
                if p != 0.0 {
                    v.scaled_add(-p, b);
                }
            }
        }
        let residual = v.dot(&v).sqrt();
        if original > 0.0 && residual > original * RANK_TOL {
            v /= residual;
        } else {
            v.fill(0.0);
        }
        basis.push(v);
    }

    let mut out = DenseMatrix::zeros(m.raw_dim());
    for (mut col, b) in out.columns_mut().into_iter().zip(&basis) {
        col.assign(b);
    }
    out
}

/// Make the largest-magnitude entry positive (first one on ties).
fn flip_sign(mut row: ArrayViewMut1<f64>) {
    let mut best = 0usize;
    for (i, v) in row.iter().enumerate() {
        if v.abs() > row[best].abs() {
            best = i;
        }
    }
    if row.get(best).is_some_and(|v| *v < 0.0) {
        row.mapv_inplace(|v| -v);
    }
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues (unsorted) and eigenvectors as columns.
pub(crate) fn jacobi_eigen(a: &DenseMatrix) -> Result<(Vec<f64>, DenseMatrix)> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    let mut a = a.clone();
    let mut v = DenseMatrix::eye(n);

    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    if scale == 0.0 {
        return Ok((vec![0.0; n], v));
    }

    let mut off = off_diagonal_norm(&a);
    for sweep in 0..JACOBI_MAX_SWEEPS {
        if off <= JACOBI_TOL * scale {
            debug!(sweeps = sweep, "jacobi converged");
            return Ok((a.diag().to_vec(), v));
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                a[[p, q]] = 0.0;
                a[[q, p]] = 0.0;
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
        off = off_diagonal_norm(&a);
    }

    if off <= JACOBI_TOL * scale {
        return Ok((a.diag().to_vec(), v));
    }
    Err(Error::Numerical {
        stage: "latent factorization",
        iterations: JACOBI_MAX_SWEEPS,
        last_delta: off / scale,
    })
}

fn off_diagonal_norm(a: &DenseMatrix) -> f64 {
    a.indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, x)| x * x)
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::utils::math::vector::SparseVec;

    fn sparse(rows: &[&[f64]]) -> SparseMatrix {
        let n = rows[0].len();
        SparseMatrix::from_rows(
            n,
            rows.iter()
                .map(|r| SparseVec::from_pairs(n, r.iter().copied().enumerate()))
                .collect(),
        )
    }

    #[test]
    fn jacobi_recovers_known_eigenvalues() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (mut vals, vecs) = jacobi_eigen(&a).unwrap();
        vals.sort_by(|a, b| a.total_cmp(b));
        assert!((vals[0] - 1.0).abs() < 1e-12);
        assert!((vals[1] - 3.0).abs() < 1e-12);
        // columns are orthonormal
        let g = vecs.t().dot(&vecs);
        assert!((g[[0, 0]] - 1.0).abs() < 1e-12);
        assert!(g[[0, 1]].abs() < 1e-12);
    }

    #[test]
    fn jacobi_reports_non_convergence() {
        let a = array![[1.0, f64::NAN], [f64::NAN, 1.0]];
        match jacobi_eigen(&a).unwrap_err() {
            Error::Numerical { stage, iterations, .. } => {
                assert_eq!(stage, "latent factorization");
                assert_eq!(iterations, JACOBI_MAX_SWEEPS);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn recovers_singular_values_of_diagonal_matrix() {
        let x = sparse(&[&[3.0, 0.0, 0.0], &[0.0, 2.0, 0.0], &[0.0, 0.0, 1.0]]);
        let svd = randomized_svd(&x, &SvdOptions { k: 2, oversamples: 10, power_iterations: 5, seed: 7 }).unwrap();
        assert!((svd.singular_values[0] - 3.0).abs() < 1e-9);
        assert!((svd.singular_values[1] - 2.0).abs() < 1e-9);
        // sign convention: dominant entry positive
        assert!((svd.components[[0, 0]] - 1.0).abs() < 1e-9);
        assert!((svd.components[[1, 1]] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rank_deficient_input_yields_zero_components() {
        // rank 1
        let x = sparse(&[&[1.0, 1.0, 0.0, 0.0], &[2.0, 2.0, 0.0, 0.0]]);
        let svd = randomized_svd(&x, &SvdOptions { k: 3, oversamples: 2, power_iterations: 2, seed: 1 }).unwrap();
        assert!(svd.singular_values[0] > 0.0);
        assert_eq!(svd.singular_values[1], 0.0);
        assert!(svd.components.row(2).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn same_seed_same_bits() {
        let x = sparse(&[&[1.0, 0.5, 0.0, 0.2], &[0.0, 0.3, 0.9, 0.0], &[0.4, 0.0, 0.1, 0.8]]);
        let opts = SvdOptions { k: 2, oversamples: 1, power_iterations: 3, seed: 42 };
        let a = randomized_svd(&x, &opts).unwrap();
        let b = randomized_svd(&x, &opts).unwrap();
        assert_eq!(a.components, b.components);
        assert_eq!(a.singular_values, b.singular_values);
    }
}
