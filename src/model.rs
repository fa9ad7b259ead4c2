use serde::{Deserialize, Serialize};

use crate::{
    cluster::ClusterAssignment,
    config::PipelineConfig,
    document::Document,
    error::{PersistenceError, Result},
    latent::LatentProjector,
    search::{self, Hits},
    utils::math::{dense::DenseMatrix, vector::SparseMatrix},
    vectorizer::TfIdfVectorizer,
};

/// Everything fitted by one build run. Frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    vectorizer: TfIdfVectorizer,
    projector: LatentProjector,
    clusters: ClusterAssignment,
    config: PipelineConfig,
}

impl FittedModel {
    pub fn new(
        vectorizer: TfIdfVectorizer,
        projector: LatentProjector,
        clusters: ClusterAssignment,
        config: PipelineConfig,
    ) -> Self {
        FittedModel {
            vectorizer,
            projector,
            clusters,
            config,
        }
    }

    #[inline]
    pub fn vectorizer(&self) -> &TfIdfVectorizer {
        &self.vectorizer
    }

    #[inline]
    pub fn projector(&self) -> &LatentProjector {
        &self.projector
    }

    #[inline]
    pub fn clusters(&self) -> &ClusterAssignment {
        &self.clusters
    }

    /// Configuration the model was fitted with.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// A fitted model together with the corpus it indexes.
///
/// This is the unit the store publishes and every serve path queries. It is
/// shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    model: FittedModel,
    documents: Vec<Document>,
    lexical: SparseMatrix,
    latent: DenseMatrix,
    /// Store version this snapshot was loaded from; not part of the bundle.
    #[serde(skip)]
    version: Option<u64>,
}

impl Snapshot {
    pub fn new(model: FittedModel, documents: Vec<Document>, lexical: SparseMatrix, latent: DenseMatrix) -> Self {
        Snapshot {
            model,
            documents,
            lexical,
            latent,
            version: None,
        }
    }

    #[inline]
    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    #[inline]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[inline]
    pub fn lexical(&self) -> &SparseMatrix {
        &self.lexical
    }

    #[inline]
    pub fn latent(&self) -> &DenseMatrix {
        &self.latent
    }

    /// Cluster label per document.
    #[inline]
    pub fn labels(&self) -> &[usize] {
        self.model.clusters.labels()
    }

    #[inline]
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Top `top_k` documents for `text`. See [`search::query`].
    pub fn search(&self, text: &str, top_k: usize) -> Result<Hits> {
        search::query(self, text, top_k)
    }

    /// Check that every part agrees on the number of documents, terms and
    /// latent dimensions.
    pub fn validate(&self) -> std::result::Result<(), PersistenceError> {
        let corrupt = |what: &str| Err(PersistenceError::Corrupt(what.to_string()));
        let n_docs = self.documents.len();
        let vocab_size = self.model.vectorizer.vocab_size();
        let k = self.model.projector.effective_k();

        if !self.model.vectorizer.is_consistent() {
            return corrupt("vocabulary and idf weights disagree");
        }
        if !self.model.projector.is_consistent() || self.model.projector.n_features() != vocab_size {
            return corrupt("projector basis does not match the vocabulary");
        }
        if !self.lexical.is_well_formed() || self.lexical.shape() != (n_docs, vocab_size) {
            return corrupt("lexical matrix shape mismatch");
        }
        if self.latent.dim() != (n_docs, k) || !self.latent.iter().all(|v| v.is_finite()) {
            return corrupt("latent matrix shape mismatch");
        }
        if !self.model.clusters.is_consistent(n_docs, k) {
            return corrupt("cluster assignment does not match the documents");
        }
        Ok(())
    }
}
