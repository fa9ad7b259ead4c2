use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Snapshot;

/// Human-readable description written next to every bundle as
/// `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub schema_version: u32,
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub config: ConfigSummary,
    pub dataset_info: DatasetInfo,
    /// Fraction of lexical variance kept by the latent space.
    pub explained_variance: f64,
    /// Per component, in component order.
    pub explained_variance_ratio: Vec<f64>,
    pub singular_values: Vec<f64>,
}

/// The build parameters that shape the artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub max_features: usize,
    pub min_document_frequency: usize,
    pub k: usize,
    pub n_clusters: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub document_count: usize,
    pub vocab_size: usize,
    pub requested_k: usize,
    /// k after clamping to `vocab_size - 1`.
    pub effective_k: usize,
}

impl BundleMetadata {
    pub(crate) fn describe(snapshot: &Snapshot, schema_version: u32, version: u64) -> Self {
        let model = snapshot.model();
        let config = model.config();
        BundleMetadata {
            schema_version,
            version,
            timestamp: Utc::now(),
            config: ConfigSummary {
                max_features: config.max_features,
                min_document_frequency: config.min_document_frequency,
                k: config.k,
                n_clusters: config.n_clusters,
                seed: config.seed,
            },
            dataset_info: DatasetInfo {
                document_count: snapshot.documents().len(),
                vocab_size: model.vectorizer().vocab_size(),
                requested_k: model.projector().requested_k(),
                effective_k: model.projector().effective_k(),
            },
            explained_variance: model.projector().explained_variance(),
            explained_variance_ratio: model.projector().explained_variance_ratio().to_vec(),
            singular_values: model.projector().singular_values().to_vec(),
        }
    }
}

/// On-disk envelope of `bundle.cbor`.
#[derive(Serialize)]
pub(crate) struct BundleRef<'a> {
    pub schema_version: u32,
    pub snapshot: &'a Snapshot,
}

#[derive(Deserialize)]
pub(crate) struct Bundle {
    pub schema_version: u32,
    pub snapshot: Snapshot,
}

/// Decodes only the schema version, so an incompatible bundle can be told
/// apart from a damaged one.
#[derive(Deserialize)]
pub(crate) struct BundleHeader {
    pub schema_version: u32,
}
