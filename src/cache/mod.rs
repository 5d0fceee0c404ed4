//! Per-dataset metadata cache.
//!
//! Resolving a file record can be expensive when the retrieval mode goes
//! through a handler, so records are memoized per path for the lifetime of
//! the owning dataset. The cache can be persisted as a JSON array of
//! records and reloaded on the next run.
//!
//! Persistence is explicit: the owner loads once at construction and saves
//! at a flush point it controls. There is no exit hook. Load failures are
//! recovered with a warning; whatever parsed successfully is kept. Note
//! that two processes flushing to the same cache path race with each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, warn};

use crate::record::FileRecord;

pub mod error;

pub use error::CacheError;

/// Memoized path -> [`FileRecord`] mapping, scoped to one dataset instance.
///
/// Interior mutability lets resolution happen behind a shared reference,
/// which is how parallel map workers reach the cache.
#[derive(Debug, Default)]
pub struct InfoCache {
    records: RwLock<HashMap<PathBuf, FileRecord>>,
}

impl InfoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<FileRecord> {
        self.records
            .read()
            .expect("cache lock poisoned")
            .get(path)
            .cloned()
    }

    pub fn insert(&self, record: FileRecord) {
        self.records
            .write()
            .expect("cache lock poisoned")
            .insert(record.path.clone(), record);
    }

    /// Drop all records. Called when the owning dataset's default
    /// time-coverage policy changes, since cached end times may depend on
    /// it.
    pub fn clear(&self) {
        self.records.write().expect("cache lock poisoned").clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().expect("cache lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load records from a JSON cache file, merging them into the cache.
    ///
    /// A missing file is a no-op. Unreadable or unparsable content is
    /// recovered: a warning is logged and the cache keeps whatever it had.
    pub fn load(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read cache file '{}': {e}", path.display());
                return;
            }
        };
        match serde_json::from_str::<Vec<FileRecord>>(&content) {
            Ok(records) => {
                debug!(
                    "Loaded {} cached records from '{}'",
                    records.len(),
                    path.display()
                );
                let mut map = self.records.write().expect("cache lock poisoned");
                for record in records {
                    map.insert(record.path.clone(), record);
                }
            }
            Err(e) => {
                warn!("Could not parse cache file '{}': {e}", path.display());
            }
        }
    }

    /// Write all records to a JSON cache file, sorted by path so the output
    /// is deterministic.
    ///
    /// # Errors
    /// Returns a [`CacheError`] when serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let mut records: Vec<FileRecord> = self
            .records
            .read()
            .expect("cache lock poisoned")
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let json = serde_json::to_string(&records)?;
        std::fs::write(path, json)?;
        debug!(
            "Saved {} cached records to '{}'",
            records.len(),
            path.display()
        );
        Ok(())
    }
}
