// Durable snapshot storage
// One document under the key "sequencers", absent until something is saved

use crate::project::serialization::{snapshot_from_json, snapshot_to_json};
use crate::project::types::PersistedSnapshot;
use crate::project::ProjectError;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

/// Storage key of the snapshot document
pub const STORAGE_KEY: &str = "sequencers";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored snapshot is invalid: {0}")]
    Invalid(#[from] ProjectError),

    #[error("no data directory available on this platform")]
    NoDataDir,
}

/// Key-value slot holding the persisted snapshot
pub trait SnapshotStore: Send {
    /// `Ok(None)` when nothing has been stored yet
    fn load(&self) -> Result<Option<PersistedSnapshot>, StorageError>;

    /// Write the snapshot, or remove the stored document when `None`
    fn save(&mut self, snapshot: Option<&PersistedSnapshot>) -> Result<(), StorageError>;
}

/// Load, logging faults and treating them as "no data"
pub fn load_or_none(store: &dyn SnapshotStore) -> Option<PersistedSnapshot> {
    match store.load() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "failed to load stored sequencers");
            None
        }
    }
}

/// Save, logging faults
pub fn save_logged(store: &mut dyn SnapshotStore, snapshot: Option<&PersistedSnapshot>) {
    if let Err(e) = store.save(snapshot) {
        error!(error = %e, "failed to save sequencers");
    }
}

/// Snapshot stored as `<dir>/sequencers.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    /// `<data_dir>/synth_playground/sequencers.json`
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(Self::new(dir.join("synth_playground")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(snapshot_from_json(&text)?))
    }

    fn save(&mut self, snapshot: Option<&PersistedSnapshot>) -> Result<(), StorageError> {
        let Some(snapshot) = snapshot else {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write then rename so a crash never leaves half a document
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, snapshot_to_json(snapshot)?)?;
        fs::rename(&temp, &self.path)?;
        debug!(path = %self.path.display(), "sequencers saved");
        Ok(())
    }
}

/// In-memory store; clones share the same slot
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    raw: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with raw document text (which may be invalid)
    pub fn with_raw(text: impl Into<String>) -> Self {
        Self {
            raw: Arc::new(Mutex::new(Some(text.into()))),
        }
    }

    /// Raw text currently stored
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedSnapshot>, StorageError> {
        match self.raw.lock().as_deref() {
            Some(text) => Ok(Some(snapshot_from_json(text)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: Option<&PersistedSnapshot>) -> Result<(), StorageError> {
        let text = snapshot.map(snapshot_to_json).transpose()?;
        *self.raw.lock() = text;
        Ok(())
    }
}
