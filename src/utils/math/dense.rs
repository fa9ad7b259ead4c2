use ndarray::{aview1, Array2, ArrayView1, ArrayView2, Axis};
use num::Float;
use rayon::prelude::*;

use crate::utils::math::vector::SparseMatrix;

/// Dense, row-major `f64` matrix used for latent vectors, centroids and
/// SVD factors.
pub type DenseMatrix = Array2<f64>;

#[inline]
fn dot<T: Float>(a: ArrayView1<T>, b: ArrayView1<T>) -> T {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).fold(T::zero(), |acc, (x, y)| acc + *x * *y)
}

#[inline]
pub fn squared_euclidean<T: Float>(a: ArrayView1<T>, b: ArrayView1<T>) -> T {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).fold(T::zero(), |acc, (x, y)| {
        let d = *x - *y;
        acc + d * d
    })
}

/// Cosine similarity. Defined as 0 when either side is the zero vector.
///
/// Clamped to `[-1, 1]`; a vector against itself scores exactly 1.
#[inline]
pub fn cosine<T: Float>(a: ArrayView1<T>, b: ArrayView1<T>) -> T {
    let na2 = dot(a, a);
    let nb2 = dot(b, b);
    if na2 == T::zero() || nb2 == T::zero() {
        return T::zero();
    }
    (dot(a, b) / (na2 * nb2).sqrt()).max(-T::one()).min(T::one())
}

/// Builds a matrix from equal-length rows.
///
/// # Panics
/// If any row has a length other than `n_cols`.
pub fn from_rows(n_cols: usize, rows: Vec<Vec<f64>>) -> DenseMatrix {
    let mut out = DenseMatrix::zeros((rows.len(), n_cols));
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), n_cols, "row {i} has length {} instead of {n_cols}", row.len());
        out.row_mut(i).assign(&aview1(row));
    }
    out
}

/// Sparse-from-the-left product `sparse * dense`, row-parallel.
pub fn sparse_dot(sparse: &SparseMatrix, dense: ArrayView2<f64>) -> DenseMatrix {
    assert_eq!(sparse.n_cols(), dense.nrows());
    let width = dense.ncols();
    let rows: Vec<Vec<f64>> = sparse
        .rows()
        .par_iter()
        .map(|row| {
            let mut out = vec![0.0; width];
            for (j, v) in row.iter() {
                for (o, x) in out.iter_mut().zip(dense.row(j)) {
                    *o += v * x;
                }
            }
            out
        })
        .collect();
    from_rows(width, rows)
}

/// Population variance of each column; zeros for an empty matrix.
pub fn column_variances(m: &DenseMatrix) -> Vec<f64> {
    if m.nrows() == 0 {
        return vec![0.0; m.ncols()];
    }
    m.var_axis(Axis(0), 0.0).to_vec()
}
