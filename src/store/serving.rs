use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::{error::Result, model::Snapshot, search::Hits, store::ArtifactStore};

/// Query handle over the store's current snapshot.
///
/// Searches clone the `Arc` and run without holding the lock. `reload`
/// swaps in a newly published snapshot only once it has fully loaded; on
/// failure the previous snapshot keeps serving.
#[derive(Debug)]
pub struct ServingIndex {
    store: ArtifactStore,
    current: RwLock<Arc<Snapshot>>,
}

impl ServingIndex {
    /// Load the current snapshot of `store`.
    pub fn open(store: ArtifactStore) -> Result<Self> {
        let snapshot = store.load()?;
        info!(version = ?snapshot.version(), "serving index opened");
        Ok(ServingIndex {
            store,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The snapshot queries currently run against.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    pub fn version(&self) -> Option<u64> {
        self.current.read().version()
    }

    pub fn search(&self, text: &str, top_k: usize) -> Result<Hits> {
        self.snapshot().search(text, top_k)
    }

    /// Pick up the store's current version if it changed.
    ///
    /// Returns `true` when a new snapshot was swapped in.
    pub fn reload(&self) -> Result<bool> {
        let published = self.store.current_version()?;
        if published.is_some() && published == self.version() {
            return Ok(false);
        }
        let snapshot = self.store.load()?;
        let version = snapshot.version();
        *self.current.write() = Arc::new(snapshot);
        info!(version = ?version, "serving index reloaded");
        Ok(true)
    }
}
