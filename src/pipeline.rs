use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{info, info_span};

use crate::{
    cluster::{summarize_clusters, ClusterReport, Kmeans},
    config::PipelineConfig,
    document::{documents_from_records, DocumentRecord},
    error::{Error, Result},
    latent::{
        layout::{layout_2d, Layout2d},
        LatentProjector, ProjectorParams,
    },
    model::{FittedModel, Snapshot},
    store::ArtifactStore,
    vectorizer::{TfIdfVectorizer, VectorizerParams},
};

/// Shared cancellation switch, checked between build stages.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one build run produces.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub snapshot: Snapshot,
    pub report: ClusterReport,
    pub layout: Layout2d,
}

/// The batch build: normalize, vectorize, project, cluster, layout, report.
///
/// Stages run strictly one after another. Each stage starts only if the
/// run has not been cancelled.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that cancels this pipeline's runs.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn checkpoint(&self, stage: &'static str) -> Result<()> {
        if self.cancel.is_cancelled() {
            info!(stage, "build cancelled");
            return Err(Error::Cancelled(stage));
        }
        info!(stage, "stage started");
        Ok(())
    }

    /// Fit every stage on `records` without persisting anything.
    pub fn run(&self, records: Vec<DocumentRecord>) -> Result<BuildOutput> {
        let span = info_span!("build");
        let _guard = span.enter();
        let config = &self.config;
        config.validate()?;

        self.checkpoint("normalize")?;
        let documents = documents_from_records(records)?;
        if documents.is_empty() {
            return Err(Error::config("no documents with text to index"));
        }
        if config.n_clusters > documents.len() {
            return Err(Error::config(format!(
                "n_clusters ({}) exceeds the number of documents ({})",
                config.n_clusters,
                documents.len()
            )));
        }

        self.checkpoint("vectorize")?;
        let texts: Vec<&str> = documents.iter().map(|d| d.normalized_text()).collect();
        let (vectorizer, lexical) = TfIdfVectorizer::fit(
            &texts,
            VectorizerParams {
                max_features: config.max_features,
                min_document_frequency: config.min_document_frequency,
            },
        )?;

        self.checkpoint("project")?;
        let (projector, latent) = LatentProjector::fit(
            &lexical,
            ProjectorParams {
                k: config.k,
                seed: config.seed,
                oversamples: config.svd_oversamples,
                power_iterations: config.svd_power_iterations,
            },
        )?;

        self.checkpoint("cluster")?;
        let clusters = Kmeans::new(config.n_clusters)
            .with_seed(config.seed)
            .with_n_init(config.n_init)
            .with_max_iter(config.max_iter)
            .with_tol(config.tol)
            .fit(&latent)?;

        self.checkpoint("layout")?;
        let layout = layout_2d(&latent, config.seed, config.layout_max_samples)?;

        self.checkpoint("report")?;
        let report = summarize_clusters(
            &clusters,
            &documents,
            &lexical,
            vectorizer.vocabulary(),
            config.top_terms,
            config.examples_per_cluster,
        );

        let model = FittedModel::new(vectorizer, projector, clusters, config.clone());
        let snapshot = Snapshot::new(model, documents, lexical, latent);
        info!(documents = snapshot.documents().len(), "build finished");
        Ok(BuildOutput {
            snapshot,
            report,
            layout,
        })
    }

    /// [`run`](Self::run), then publish the snapshot to `store`.
    ///
    /// Nothing is published when any stage fails or the run is cancelled.
    pub fn run_and_publish(&self, records: Vec<DocumentRecord>, store: &ArtifactStore) -> Result<(BuildOutput, u64)> {
        let output = self.run(records)?;
        self.checkpoint("save")?;
        let version = store.publish(&output.snapshot)?;
        Ok((output, version))
    }
}
