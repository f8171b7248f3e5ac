use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{read_state, write_state, StoreError};

/// Persistent map from a key (an absolute file path) to the modification
/// time last observed for it, in milliseconds since the Unix epoch
#[derive(Debug, Clone)]
pub struct TimestampStore {
    path: PathBuf,
    entries: FxHashMap<String, u64>,
}

impl TimestampStore {
    /// Create an empty store backed by `dir/file_name`, without touching disk
    pub fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
            entries: FxHashMap::default(),
        }
    }

    /// Load the store from `dir/file_name`
    ///
    /// A missing file yields an empty store. An unreadable or corrupted file
    /// is an error: an empty map would be indistinguishable from a first run.
    pub fn load(dir: &Path, file_name: &str) -> Result<Self, StoreError> {
        let mut store = Self::new(dir, file_name);
        match read_state(&store.path)? {
            Some(entries) => {
                store.entries = entries;
                debug!(
                    "Loaded {} timestamp(s) from {}",
                    store.entries.len(),
                    store.path.display()
                );
            }
            None => debug!("No timestamp store at {}", store.path.display()),
        }
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, millis: u64) {
        self.entries.insert(key.into(), millis);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the full map, replacing the previous file atomically
    pub fn save(&self) -> Result<(), StoreError> {
        write_state(&self.path, &self.entries)?;
        debug!(
            "Saved {} timestamp(s) to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
