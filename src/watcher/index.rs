//! In-memory index of observed paths and their last-modified times.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

/// Shared map from absolute local path to filesystem mtime.
///
/// Initialization workers record entries concurrently; the steady-state
/// loop reads a snapshot for its deletion pass and mutates entries one at a
/// time. A single mutex covers both.
#[derive(Debug, Default)]
pub struct PathIndex {
    entries: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh an entry.
    pub fn record(&self, path: PathBuf, mtime: SystemTime) {
        self.entries.lock().unwrap().insert(path, mtime);
    }

    /// Stored mtime for a path, if the path has been observed.
    pub fn mtime(&self, path: &Path) -> Option<SystemTime> {
        self.entries.lock().unwrap().get(path).copied()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    pub fn remove(&self, path: &Path) {
        self.entries.lock().unwrap().remove(path);
    }

    /// Drop every entry; initialization starts from a clean index.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Copy of the current entries, for iteration that mutates the index
    /// as it goes.
    pub fn snapshot(&self) -> Vec<(PathBuf, SystemTime)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(path, mtime)| (path.clone(), *mtime))
            .collect()
    }
}
