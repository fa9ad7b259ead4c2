use ndarray::ArrayView1;

use super::SparseVec;

impl SparseVec {
    /// Dot product with a dense vector of the same dimension.
    #[inline]
    pub fn dot_dense(&self, dense: ArrayView1<f64>) -> f64 {
        debug_assert_eq!(self.len(), dense.len());
        self.iter().map(|(i, v)| v * dense[i]).sum()
    }

    #[inline]
    pub fn norm_sq(&self) -> f64 {
        self.values().iter().map(|v| v * v).sum()
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// Scale to unit L2 norm in place. The zero vector stays zero.
    pub fn normalize_l2(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            let inv = 1.0 / norm;
            for v in self.vals.iter_mut() {
                *v *= inv;
            }
        }
    }
}
