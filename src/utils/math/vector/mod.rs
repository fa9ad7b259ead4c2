pub mod math;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::utils::sort::sort_by_index;

/// Sparse vector that treats zero as the implicit element.
///
/// Holds `indices` and `values` as parallel arrays.
/// Indices are strictly ascending and always `< len`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseVec {
    len: usize,
    inds: Vec<u32>,
    vals: Vec<f64>,
}

impl SparseVec {
    /// Empty (all-zero) vector of dimension `len`.
    #[inline]
    pub fn new(len: usize) -> Self {
        SparseVec {
            len,
            inds: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Build from unordered `(index, value)` pairs.
    ///
    /// Duplicate indices are summed, exact zeros are dropped.
    ///
    /// # Panics
    /// If an index is out of `0..len`.
    pub fn from_pairs<I>(len: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut inds = Vec::new();
        let mut vals = Vec::new();
        for (idx, val) in pairs {
            assert!(idx < len, "index {idx} out of range for dimension {len}");
            inds.push(idx as u32);
            vals.push(val);
        }
        sort_by_index(&mut inds, &mut vals);

        // merge duplicates in place
        let mut w = 0usize;
        for r in 0..inds.len() {
            if w > 0 && inds[w - 1] == inds[r] {
                vals[w - 1] += vals[r];
            } else {
                inds[w] = inds[r];
                vals[w] = vals[r];
                w += 1;
            }
        }
        inds.truncate(w);
        vals.truncate(w);

        let mut vec = SparseVec { len, inds, vals };
        vec.retain_non_zero();
        vec
    }

    #[inline]
    fn retain_non_zero(&mut self) {
        if self.vals.iter().all(|v| *v != 0.0) {
            return;
        }
        let (inds, vals): (Vec<u32>, Vec<f64>) = self
            .inds
            .iter()
            .copied()
            .zip(self.vals.iter().copied())
            .filter(|(_, v)| *v != 0.0)
            .unzip();
        self.inds = inds;
        self.vals = vals;
    }

    /// Dimension of the vector (not the number of stored entries).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no entry is stored, i.e. the vector is all zeros.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.inds.is_empty()
    }

    /// Number of stored (non-zero) entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.inds.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        match self.inds.binary_search(&(index as u32)) {
            Ok(pos) => self.vals[pos],
            Err(_) => 0.0,
        }
    }

    /// Iterate stored entries in ascending index order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.inds
            .iter()
            .zip(self.vals.iter())
            .map(|(i, v)| (*i as usize, *v))
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.inds
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.vals
    }

    /// Validate the structural invariants (used after deserialization).
    pub fn is_well_formed(&self) -> bool {
        self.inds.len() == self.vals.len()
            && self.inds.windows(2).all(|w| w[0] < w[1])
            && self.inds.last().map_or(true, |i| (*i as usize) < self.len)
    }
}

impl Debug for SparseVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            writeln!(f, "SparseVec {{")?;
            writeln!(f, "    len: {}", self.len)?;
            writeln!(f, "    nnz: {}", self.nnz())?;
            for (i, v) in self.iter() {
                writeln!(f, "    [{i}] = {v:.6}")?;
            }
            write!(f, "}}")
        } else {
            f.debug_struct("SparseVec")
                .field("len", &self.len)
                .field("entries", &self.iter().collect::<Vec<_>>())
                .finish()
        }
    }
}

/// Row-major sparse matrix: one `SparseVec` per row, all of width `n_cols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    n_cols: usize,
    rows: Vec<SparseVec>,
}

impl SparseMatrix {
    /// # Panics
    /// If a row's dimension differs from `n_cols`.
    pub fn from_rows(n_cols: usize, rows: Vec<SparseVec>) -> Self {
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.len(), n_cols, "row {i} has dimension {} instead of {n_cols}", row.len());
        }
        SparseMatrix { n_cols, rows }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// (rows, cols)
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.n_cols)
    }

    #[inline]
    pub fn row(&self, i: usize) -> &SparseVec {
        &self.rows[i]
    }

    #[inline]
    pub fn rows(&self) -> &[SparseVec] {
        &self.rows
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(SparseVec::nnz).sum()
    }

    /// Transposed copy (columns become rows).
    pub fn transpose(&self) -> SparseMatrix {
        let mut cols: Vec<Vec<(u32, f64)>> = vec![Vec::new(); self.n_cols];
        // rows visited in order, so each column's entries come out ascending
        for (r, row) in self.rows.iter().enumerate() {
            for (c, v) in row.iter() {
                cols[c].push((r as u32, v));
            }
        }
        let n_rows = self.rows.len();
        let rows = cols
            .into_iter()
            .map(|entries| {
                let (inds, vals) = entries.into_iter().unzip();
                SparseVec { len: n_rows, inds, vals }
            })
            .collect();
        SparseMatrix { n_cols: n_rows, rows }
    }

    /// Population variance of each column.
    pub fn column_variances(&self) -> Vec<f64> {
        let n = self.rows.len();
        let mut sum = vec![0.0; self.n_cols];
        let mut sum_sq = vec![0.0; self.n_cols];
        for row in &self.rows {
            for (c, v) in row.iter() {
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }
        if n == 0 {
            return vec![0.0; self.n_cols];
        }
        let n = n as f64;
        sum.iter()
            .zip(sum_sq.iter())
            .map(|(s, sq)| {
                let mean = s / n;
                (sq / n - mean * mean).max(0.0)
            })
            .collect()
    }

    pub fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.n_cols && r.is_well_formed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_sorts_merges_and_drops_zeros() {
        let v = SparseVec::from_pairs(10, vec![(7, 1.0), (2, 0.5), (7, 2.0), (4, 0.0)]);
        assert_eq!(v.len(), 10);
        assert_eq!(v.indices(), &[2, 7]);
        assert_eq!(v.values(), &[0.5, 3.0]);
        assert_eq!(v.get(7), 3.0);
        assert_eq!(v.get(4), 0.0);
        assert!(v.is_well_formed());
    }

    #[test]
    #[should_panic]
    fn from_pairs_rejects_out_of_range() {
        SparseVec::from_pairs(3, vec![(3, 1.0)]);
    }

    #[test]
    fn transpose_round_trips() {
        let m = SparseMatrix::from_rows(
            3,
            vec![
                SparseVec::from_pairs(3, vec![(0, 1.0), (2, 2.0)]),
                SparseVec::from_pairs(3, vec![(1, 3.0)]),
            ],
        );
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.row(2).get(0), 2.0);
        assert_eq!(t.row(1).get(1), 3.0);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn column_variances_match_dense_formula() {
        let m = SparseMatrix::from_rows(
            2,
            vec![
                SparseVec::from_pairs(2, vec![(0, 1.0)]),
                SparseVec::from_pairs(2, vec![(0, 3.0), (1, 2.0)]),
            ],
        );
        let var = m.column_variances();
        assert!((var[0] - 1.0).abs() < 1e-12);
        assert!((var[1] - 1.0).abs() < 1e-12);
    }
}
