//! Two-dimensional layout of the latent space, for plotting.

use ndarray::{Array1, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    latent::svd::{randomized_svd, SvdOptions},
    utils::math::{
        dense::{self, DenseMatrix},
        vector::{SparseMatrix, SparseVec},
    },
};

/// 2D coordinates for a (possibly sampled) subset of documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout2d {
    /// Document indices the coordinates belong to, ascending.
    pub sample_indices: Vec<usize>,
    /// One `[x, y]` per sampled document.
    pub coordinates: Vec<[f64; 2]>,
}

/// Project centered latent rows onto their two leading directions.
///
/// When there are more than `max_samples` rows, a seeded random subset is
/// used. With a one-dimensional latent space the y coordinate is 0.
pub fn layout_2d(latent: &DenseMatrix, seed: u64, max_samples: usize) -> Result<Layout2d> {
    let (n, k) = latent.dim();
    if n == 0 || k == 0 {
        return Err(Error::config("cannot lay out an empty latent matrix"));
    }
    if max_samples == 0 {
        return Err(Error::config("layout_max_samples must be positive"));
    }

    let sample_indices: Vec<usize> = if n > max_samples {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, n, max_samples).into_vec();
        picked.sort_unstable();
        picked
    } else {
        (0..n).collect()
    };
    let sample = latent.select(Axis(0), &sample_indices);
    let means = sample.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(k));
    let centered = &sample - &means;

    let dims = k.min(2);
    let as_sparse = SparseMatrix::from_rows(
        k,
        centered
            .rows()
            .into_iter()
            .map(|row| SparseVec::from_pairs(k, row.iter().copied().enumerate()))
            .collect(),
    );
    let svd = randomized_svd(
        &as_sparse,
        &SvdOptions {
            k: dims,
            oversamples: 10,
            power_iterations: 5,
            seed,
        },
    )?;

    let coordinates = centered
        .rows()
        .into_iter()
        .map(|row| {
            let mut point = [0.0; 2];
            for (d, slot) in point.iter_mut().enumerate().take(dims) {
                *slot = row.dot(&svd.components.row(d));
            }
            point
        })
        .collect();
    debug!(samples = sample_indices.len(), "2d layout computed");

    Ok(Layout2d {
        sample_indices,
        coordinates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latent(rows: usize, cols: usize) -> DenseMatrix {
        let data = (0..rows)
            .map(|r| (0..cols).map(|c| ((r * 7 + c * 3) % 11) as f64 / 11.0).collect())
            .collect();
        dense::from_rows(cols, data)
    }

    #[test]
    fn small_input_keeps_every_row() {
        let layout = layout_2d(&latent(5, 3), 42, 100).unwrap();
        assert_eq!(layout.sample_indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(layout.coordinates.len(), 5);
        assert!(layout.coordinates.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
    }

    #[test]
    fn large_input_is_sampled_deterministically() {
        let m = latent(50, 4);
        let a = layout_2d(&m, 7, 10).unwrap();
        let b = layout_2d(&m, 7, 10).unwrap();
        assert_eq!(a.sample_indices.len(), 10);
        assert!(a.sample_indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(a, b);
    }

    #[test]
    fn one_dimensional_latent_has_zero_y() {
        let m = ndarray::array![[1.0], [2.0], [4.0]];
        let layout = layout_2d(&m, 1, 10).unwrap();
        assert!(layout.coordinates.iter().all(|p| p[1] == 0.0));
    }
}
