//! Partitioning of latent document vectors into topical clusters, and the
//! per-cluster report built on top of a partition.
//!
//! Clustering is hard k-means: every document gets exactly one label in
//! `0..n_clusters`. A cluster may end up with no members; it keeps its last
//! centroid and reports size 0.

mod kmeans;
pub mod report;

pub use kmeans::Kmeans;
pub use report::{summarize_clusters, ClusterExample, ClusterReport, ClusterSummary, TermScore};

use serde::{Deserialize, Serialize};

use crate::utils::math::dense::DenseMatrix;

/// One label per document plus the centroids that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    n_clusters: usize,
    labels: Vec<usize>,
    centroids: DenseMatrix,
    inertia: f64,
}

impl ClusterAssignment {
    pub(crate) fn new(n_clusters: usize, labels: Vec<usize>, centroids: DenseMatrix, inertia: f64) -> Self {
        ClusterAssignment {
            n_clusters,
            labels,
            centroids,
            inertia,
        }
    }

    #[inline]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Label per document, in document order.
    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// n_clusters x k
    #[inline]
    pub fn centroids(&self) -> &DenseMatrix {
        &self.centroids
    }

    /// Sum of squared distances to the assigned centroids.
    #[inline]
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Member count per cluster id, zeros included.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Document indices of `cluster`, ascending.
    pub fn members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == cluster)
            .map(|(i, _)| i)
            .collect()
    }

    /// Structural check used after loading from disk.
    pub fn is_consistent(&self, n_documents: usize, latent_dim: usize) -> bool {
        self.labels.len() == n_documents
            && self.labels.iter().all(|&l| l < self.n_clusters)
            && self.centroids.dim() == (self.n_clusters, latent_dim)
            && self.centroids.iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_members_include_empty_clusters() {
        let assignment = ClusterAssignment::new(3, vec![2, 0, 2, 2], DenseMatrix::zeros((3, 1)), 0.0);
        assert_eq!(assignment.sizes(), vec![1, 0, 3]);
        assert_eq!(assignment.members(2), vec![0, 2, 3]);
        assert!(assignment.members(1).is_empty());
        assert!(assignment.is_consistent(4, 1));
        assert!(!assignment.is_consistent(5, 1));
    }
}
