//! Versioned, atomically published artifact bundles.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/CURRENT                       published version, e.g. "00000003"
//! <root>/snapshots/00000003/bundle.cbor
//! <root>/snapshots/00000003/metadata.json
//! <root>/snapshots/.staging-00000004/  in-progress write, never read
//! ```
//!
//! A version directory is complete before it is renamed into place, and
//! `CURRENT` is replaced by rename after that. Readers only follow
//! `CURRENT`, so they see either the old snapshot or the new one.

pub mod bundle;
pub mod serving;

pub use bundle::{BundleMetadata, ConfigSummary, DatasetInfo};
pub use serving::ServingIndex;

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    error::{Error, PersistenceError, Result},
    model::Snapshot,
    store::bundle::{Bundle, BundleHeader, BundleRef},
};

/// Bumped whenever the bundle layout changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const SNAPSHOTS_DIR: &str = "snapshots";
const CURRENT_FILE: &str = "CURRENT";
const BUNDLE_FILE: &str = "bundle.cbor";
const METADATA_FILE: &str = "metadata.json";
const STAGING_PREFIX: &str = ".staging-";

/// File-system artifact store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        ArtifactStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn snapshots_dir(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_DIR)
    }

    fn version_dir(&self, version: u64) -> PathBuf {
        self.snapshots_dir().join(format!("{version:08}"))
    }

    /// Write `snapshot` as a new version and make it current.
    ///
    /// Returns the published version number.
    pub fn publish(&self, snapshot: &Snapshot) -> Result<u64> {
        let snapshots = self.snapshots_dir();
        fs::create_dir_all(&snapshots)?;
        let version = self.versions()?.last().map_or(1, |v| v + 1);

        let staging = snapshots.join(format!("{STAGING_PREFIX}{version:08}"));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir(&staging)?;

        write_synced(&staging.join(BUNDLE_FILE), |w| {
            serde_cbor::to_writer(
                w,
                &BundleRef {
                    schema_version: SCHEMA_VERSION,
                    snapshot,
                },
            )
            .map_err(Error::from)
        })?;
        let metadata = BundleMetadata::describe(snapshot, SCHEMA_VERSION, version);
        write_synced(&staging.join(METADATA_FILE), |w| {
            serde_json::to_writer_pretty(w, &metadata).map_err(Error::from)
        })?;
        sync_dir(&staging)?;

        let target = self.version_dir(version);
        fs::rename(&staging, &target)?;
        sync_dir(&snapshots)?;

        let pointer_tmp = self.root.join(format!("{CURRENT_FILE}.tmp"));
        write_synced(&pointer_tmp, |w| {
            writeln!(w, "{version:08}")?;
            Ok(())
        })?;
        fs::rename(&pointer_tmp, self.root.join(CURRENT_FILE))?;
        sync_dir(&self.root)?;

        info!(version, path = %target.display(), "snapshot published");
        Ok(version)
    }

    /// Version `CURRENT` points at, `None` before the first publish.
    pub fn current_version(&self) -> Result<Option<u64>> {
        let path = self.root.join(CURRENT_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| PersistenceError::Corrupt(format!("unreadable pointer in {}", path.display())).into())
    }

    /// Load the current snapshot.
    ///
    /// # Errors
    /// [`PersistenceError::Missing`] before the first publish or when the
    /// referenced bundle is gone; the other persistence variants when the
    /// bundle cannot be used.
    pub fn load(&self) -> Result<Snapshot> {
        match self.current_version()? {
            Some(version) => self.load_version(version),
            None => Err(PersistenceError::Missing(self.root.join(CURRENT_FILE).display().to_string()).into()),
        }
    }

    /// Load a specific published version.
    pub fn load_version(&self, version: u64) -> Result<Snapshot> {
        let path = self.version_dir(version).join(BUNDLE_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::Missing(path.display().to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = decode_bundle(&bytes, &path)?;
        snapshot.validate()?;
        debug!(version, documents = snapshot.documents().len(), "snapshot loaded");
        Ok(snapshot.with_version(version))
    }

    /// `metadata.json` of a published version.
    pub fn metadata(&self, version: u64) -> Result<BundleMetadata> {
        let path = self.version_dir(version).join(METADATA_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PersistenceError::Missing(path.display().to_string()).into())
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| PersistenceError::Corrupt(format!("{}: {e}", path.display())).into())
    }

    /// Published versions, ascending. Staging directories are not listed.
    pub fn versions(&self) -> Result<Vec<u64>> {
        let entries = match fs::read_dir(self.snapshots_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(v) = entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok()) {
                versions.push(v);
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Delete all but the newest `keep` versions, plus leftover staging
    /// directories. The current version is never deleted.
    ///
    /// Returns the removed versions, ascending.
    pub fn prune(&self, keep: usize) -> Result<Vec<u64>> {
        let current = self.current_version()?;
        let versions = self.versions()?;
        let cutoff = versions.len().saturating_sub(keep);
        let mut removed = Vec::new();
        for &version in &versions[..cutoff] {
            if Some(version) == current {
                continue;
            }
            fs::remove_dir_all(self.version_dir(version))?;
            removed.push(version);
        }

        if let Ok(entries) = fs::read_dir(self.snapshots_dir()) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                    warn!(path = %entry.path().display(), "removing abandoned staging directory");
                    fs::remove_dir_all(entry.path())?;
                }
            }
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), kept = versions.len() - removed.len(), "store pruned");
        }
        Ok(removed)
    }
}

fn decode_bundle(bytes: &[u8], path: &Path) -> Result<Snapshot> {
    match serde_cbor::from_slice::<Bundle>(bytes) {
        Ok(bundle) if bundle.schema_version == SCHEMA_VERSION => Ok(bundle.snapshot),
        Ok(bundle) => Err(PersistenceError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            found: bundle.schema_version,
        }
        .into()),
        Err(e) if e.is_eof() => Err(PersistenceError::Truncated(path.display().to_string()).into()),
        Err(e) => match serde_cbor::from_slice::<BundleHeader>(bytes) {
            Ok(header) if header.schema_version != SCHEMA_VERSION => Err(PersistenceError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: header.schema_version,
            }
            .into()),
            _ => Err(PersistenceError::Corrupt(format!("{}: {e}", path.display())).into()),
        },
    }
}

fn write_synced<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
