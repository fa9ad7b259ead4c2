//! Batch-built latent semantic index for free-text incident records.
pub mod cluster;
pub mod config;
pub mod document;
pub mod error;
pub mod latent;
pub mod model;
pub mod pipeline;
pub mod search;
pub mod store;
pub mod utils;
pub mod vectorizer;

/// Build Pipeline
/// Runs the whole batch build over a fixed set of records:
/// normalize, vectorize, project, cluster, lay out, report, and optionally
/// publish to an [`ArtifactStore`].
///
/// Stages run one after another. A [`CancelFlag`] is checked before each
/// stage; a cancelled run returns `Error::Cancelled` and publishes nothing.
pub use pipeline::{BuildOutput, CancelFlag, Pipeline};

/// Pipeline Configuration
/// Every knob of a build run, with defaults for a city-scale incident
/// dataset. Loadable from JSON; persisted with each bundle.
pub use config::PipelineConfig;

/// Documents
/// `DocumentRecord` is the upstream `{id, text, metadata}` shape.
/// `Document` is the immutable, normalized form the core works on.
pub use document::{Document, DocumentRecord};

/// TF-IDF Vectorizer
/// Fits a vocabulary and IDF weights on a corpus, then maps any text onto
/// the same columns. Rows are L2-normalized sparse vectors.
///
/// `TfIdfVectorizer<E>` takes the weighting engine as a type parameter,
/// `DefaultTfIdfEngine` by default.
///
/// # Serialization
/// Supported. The vocabulary and IDF are stored; the engine is a type.
pub use vectorizer::{
    tfidf::{DefaultTfIdfEngine, TfIdfEngine},
    TfIdfVectorizer, Vocabulary,
};

/// Latent Projector
/// Truncated SVD from tf-idf space into `k` dense dimensions. Stored
/// document vectors and queries are projected by the same code.
pub use latent::LatentProjector;

/// Clustering
/// Seeded k-means over the latent vectors, and a per-cluster report of
/// sizes, examples and dominant terms.
pub use cluster::{ClusterAssignment, ClusterReport, Kmeans};

/// Fitted artifacts
/// `FittedModel` bundles the vectorizer, projector, clusters and config.
/// `Snapshot` adds the indexed corpus and is what queries run against.
pub use model::{FittedModel, Snapshot};

/// Search results
pub use search::{HitEntry, Hits, LocationDimension, LocationSummary};

/// Artifact Store
/// Versioned bundles published atomically under one root directory, and a
/// hot-reloadable serving handle on top of it.
pub use store::{ArtifactStore, ServingIndex};

pub use error::{Error, PersistenceError, Result};
