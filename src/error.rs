use thiserror::Error;

/// Errors returned by the build pipeline, the store and the query path.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or input that makes the run meaningless
    /// (empty corpus, empty vocabulary, non-positive counts, duplicate ids).
    /// Reported before any later stage runs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An iterative routine hit its iteration cap without converging.
    /// No artifact is published for the run.
    #[error("{stage} did not converge after {iterations} iterations (last delta {last_delta:e})")]
    Numerical {
        /// Stage that failed.
        stage: &'static str,
        /// Iterations used.
        iterations: usize,
        /// Last observed change (off-diagonal mass, centroid shift).
        last_delta: f64,
    },

    /// The artifact bundle could not be read back; a rebuild is needed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// The build run was cancelled between stages.
    #[error("run cancelled before stage `{0}`")]
    Cancelled(&'static str),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bundle encoding error: {0}")]
    Encode(#[from] serde_cbor::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load-side failures of the artifact store.
///
/// Kept separate from "no results" so callers can tell "rebuild needed"
/// apart from "nothing matched".
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// No snapshot has been published yet, or the referenced one is gone.
    #[error("no bundle found at {0}")]
    Missing(String),

    /// The bundle ends before its encoded content does.
    #[error("bundle at {0} is truncated")]
    Truncated(String),

    /// The bundle was written by an incompatible schema.
    #[error("bundle schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch {
        expected: u32,
        found: u32,
    },

    /// The bundle decodes but its contents are inconsistent.
    #[error("bundle is corrupt: {0}")]
    Corrupt(String),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// True for failures that mean the serving side must wait for a rebuild.
    pub fn needs_rebuild(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
