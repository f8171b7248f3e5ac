use indexmap::IndexSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{read_state, write_state, StoreError};

/// Persistent set of resource paths, relative to their resource directory
/// and `/`-separated, in first-seen order
#[derive(Debug, Clone)]
pub struct ResourceSetStore {
    path: PathBuf,
    entries: IndexSet<String>,
}

impl ResourceSetStore {
    /// Create an empty set backed by `dir/file_name`, without touching disk
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
            entries: IndexSet::new(),
        }
    }

    /// Load the set from `dir/file_name`; a missing file yields an empty set
    pub fn load(dir: &Path, file_name: &str) -> Result<Self, StoreError> {
        let mut store = Self::new(dir, file_name);
        if let Some(entries) = read_state(&store.path)? {
            store.entries = entries;
        }
        debug!(
            "Loaded {} resource path(s) from {}",
            store.entries.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Insert a path, returning `false` if it was already present
    pub fn add(&mut self, path: impl Into<String>) -> bool {
        self.entries.insert(path.into())
    }

    /// Remove a path, returning `true` if it was present
    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.shift_remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), StoreError> {
        write_state(&self.path, &self.entries)?;
        debug!(
            "Saved {} resource path(s) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
