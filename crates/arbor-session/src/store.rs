//! Pluggable snapshot stores.
//!
//! The session store is the one shared resource in the system: it is
//! read once at request start and written once at freeze time, with no
//! locking across requests. Concurrent requests for the same session key
//! get last-write-wins semantics; that is the accepted consistency
//! model, not a bug to fix.

use crate::codec::SessionSnapshot;
use crate::error::StoreError;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Opaque storage for one session's frozen tree.
pub trait SessionStore: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load the stored snapshot, `None` when the session has none yet.
    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError>;

    /// Drop any stored snapshot.
    fn clear(&self) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        (**self).load()
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        (**self).save(snapshot)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    slot: RwLock<Option<SessionSnapshot>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a snapshot.
    #[must_use]
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            slot: RwLock::new(Some(snapshot)),
        }
    }
}

impl SessionStore for MemoryStore {
    fn name(&self) -> &str {
        "MemoryStore"
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        let guard = self
            .slot
            .read()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        Ok(guard.clone())
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self
            .slot
            .write()
            .map_err(|_| StoreError::Corruption("lock poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held = self.slot.read().map(|g| g.is_some()).unwrap_or(false);
        f.debug_struct("MemoryStore").field("held", &held).finish()
    }
}

/// File-backed store: the snapshot as a JSON document.
///
/// Writes use a temp-file-plus-rename pattern so a crash mid-save never
/// leaves a torn snapshot behind. A missing file loads as a fresh
/// session.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store the snapshot at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

impl SessionStore for FileStore {
    fn name(&self) -> &str {
        "FileStore"
    }

    fn load(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let snapshot = serde_json::from_reader(reader)
            .map_err(|e| StoreError::Serialization(format!("failed to parse snapshot: {e}")))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .map_err(|e| StoreError::Serialization(format!("failed to encode snapshot: {e}")))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), "saved session snapshot");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            structure: "root|widget|root".into(),
            version: 1,
            state: BTreeMap::new(),
        }
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&snapshot()).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_with_snapshot() {
        let store = MemoryStore::with_snapshot(snapshot());
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn arc_wrapped_store_shares_the_slot() {
        let store = Arc::new(MemoryStore::new());
        let other = Arc::clone(&store);
        store.save(&snapshot()).unwrap();
        assert!(SessionStore::load(&other).unwrap().is_some());
    }

    #[test]
    fn file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("session.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&snapshot()).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot()));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("session.json");
        let store = FileStore::new(&path);
        store.save(&snapshot()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(
            store.load().unwrap_err(),
            StoreError::Serialization(_)
        ));
    }
}
