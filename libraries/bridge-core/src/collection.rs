//! Collection store implementations
//!
//! - `MemoryCollectionStore`: process-local, for tests and ephemeral sessions
//! - `JsonFileCollectionStore`: a small JSON document on disk

use crate::error::{CoreError, Result};
use crate::traits::CollectionStore;
use crate::types::ReleaseId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// In-memory collection
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    ids: Mutex<Vec<ReleaseId>>,
}

impl MemoryCollectionStore {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }
}

impl CollectionStore for MemoryCollectionStore {
    fn ids(&self) -> Result<Vec<ReleaseId>> {
        Ok(self.ids.lock().clone())
    }

    fn upsert(&self, id: &ReleaseId) -> Result<()> {
        if id.is_empty() {
            return Err(CoreError::Collection("empty release id".to_string()));
        }
        let mut ids = self.ids.lock();
        if !ids.contains(id) {
            ids.insert(0, id.clone());
        }
        Ok(())
    }
}

/// One persisted collection entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    /// Owned release
    pub release_id: ReleaseId,

    /// When ownership was recorded
    pub added_at: DateTime<Utc>,
}

/// Collection persisted as a JSON array of entries
///
/// A missing or unreadable file reads as an empty collection; writes go
/// through a temporary file and rename.
#[derive(Debug)]
pub struct JsonFileCollectionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCollectionStore {
    /// Store backed by the given file (created on first upsert)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, newest first
    pub fn entries(&self) -> Result<Vec<CollectionEntry>> {
        let _guard = self.lock.lock();
        Ok(self.read_entries())
    }

    fn read_entries(&self) -> Vec<CollectionEntry> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Collection file not readable");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<CollectionEntry>>(&raw) {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| !e.release_id.is_empty())
                .collect(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring corrupt collection file");
                Vec::new()
            }
        }
    }

    fn write_entries(&self, entries: &[CollectionEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CollectionStore for JsonFileCollectionStore {
    fn ids(&self) -> Result<Vec<ReleaseId>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|e| e.release_id)
            .collect())
    }

    fn upsert(&self, id: &ReleaseId) -> Result<()> {
        if id.is_empty() {
            return Err(CoreError::Collection("empty release id".to_string()));
        }

        let _guard = self.lock.lock();
        let mut entries = self.read_entries();
        if entries.iter().any(|e| &e.release_id == id) {
            return Ok(());
        }

        entries.insert(
            0,
            CollectionEntry {
                release_id: id.clone(),
                added_at: Utc::now(),
            },
        );
        self.write_entries(&entries)?;
        debug!(release = %id, total = entries.len(), "Collection updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_is_newest_first_and_idempotent() {
        let store = MemoryCollectionStore::new();
        store.upsert(&ReleaseId::new("one")).unwrap();
        store.upsert(&ReleaseId::new("two")).unwrap();
        store.upsert(&ReleaseId::new("one")).unwrap();

        let ids = store.ids().unwrap();
        assert_eq!(ids, vec![ReleaseId::new("two"), ReleaseId::new("one")]);
        assert!(store.contains(&ReleaseId::new("one")).unwrap());
        assert!(!store.contains(&ReleaseId::new("three")).unwrap());
    }

    #[test]
    fn memory_store_rejects_empty_id() {
        let store = MemoryCollectionStore::new();
        assert!(store.upsert(&ReleaseId::new("   ")).is_err());
    }
}
