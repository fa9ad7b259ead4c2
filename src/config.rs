use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All knobs of one build run.
///
/// Persisted with every bundle, so a snapshot always records the parameters
/// it was fitted with. Missing fields in a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Vocabulary cap.
    pub max_features: usize,
    /// Minimum number of documents a term must occur in.
    pub min_document_frequency: usize,
    /// Requested latent dimensionality (clamped to `vocab_size - 1`).
    pub k: usize,
    pub n_clusters: usize,
    pub seed: u64,
    /// Extra random columns for the range finder.
    pub svd_oversamples: usize,
    pub svd_power_iterations: usize,
    /// Independent k-means trials.
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative centroid-shift tolerance.
    pub tol: f64,
    pub top_terms: usize,
    pub examples_per_cluster: usize,
    /// Row cap for the 2D layout stage.
    pub layout_max_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_features: 5000,
            min_document_frequency: 2,
            k: 150,
            n_clusters: 7,
            seed: 42,
            svd_oversamples: 10,
            svd_power_iterations: 5,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            top_terms: 10,
            examples_per_cluster: 5,
            layout_max_samples: 30_000,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Reject values that make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_features", self.max_features),
            ("min_document_frequency", self.min_document_frequency),
            ("k", self.k),
            ("n_clusters", self.n_clusters),
            ("n_init", self.n_init),
            ("max_iter", self.max_iter),
            ("layout_max_samples", self.layout_max_samples),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::config(format!("{name} must be a positive integer")));
            }
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(Error::config(format!("tol must be a finite non-negative number, got {}", self.tol)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_counts_are_rejected() {
        let config = PipelineConfig { n_clusters: 0, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m.contains("n_clusters")));

        let config = PipelineConfig { k: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = PipelineConfig { tol: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"k": 2, "n_clusters": 3}"#).unwrap();
        assert_eq!(config.k, 2);
        assert_eq!(config.n_clusters, 3);
        assert_eq!(config.max_features, 5000);
        assert_eq!(config.seed, 42);
    }
}
