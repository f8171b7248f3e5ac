//! Per-module persistent state
//!
//! Each module keeps two small files under its build-output root: the
//! descriptor timestamps and the set of resource paths seen by the previous
//! run. Both are bincode-encoded inside a versioned envelope and written
//! atomically so that a crash mid-save never leaves a half-written file
//! behind for the next load.

mod error;
mod resources;
mod timestamps;

pub use error::StoreError;
pub use resources::ResourceSetStore;
pub use timestamps::TimestampStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// State format version - increment when the on-disk layout changes
pub const STATE_FORMAT_VERSION: u32 = 1;

/// Default file name of the timestamp store
pub const TIMESTAMPS_FILE_NAME: &str = "incbuild-timestamps.bin";

/// Default file name of the resource set store
pub const RESOURCES_FILE_NAME: &str = "incbuild-resources.bin";

#[derive(Serialize, Deserialize)]
struct StateFile<T> {
    version: u32,
    entries: T,
}

/// Read and decode a state file, `Ok(None)` when it does not exist yet
fn read_state<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    // The version is the leading field of the envelope and is decoded alone
    // first, before the entries.
    let found: u32 = bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;
    if found != STATE_FORMAT_VERSION {
        return Err(StoreError::VersionMismatch {
            path: path.to_path_buf(),
            expected: STATE_FORMAT_VERSION,
            found,
        });
    }

    let file: StateFile<T> = bincode::deserialize(&bytes).map_err(|e| StoreError::Decode {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(file.entries))
}

/// Encode and atomically replace a state file
fn write_state<T: Serialize>(path: &Path, entries: &T) -> Result<(), StoreError> {
    let file = StateFile {
        version: STATE_FORMAT_VERSION,
        entries,
    };
    let bytes = bincode::serialize(&file).map_err(|e| StoreError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;
    atomic_write(path, &bytes).map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write-fsync-rename so readers only ever observe the old or the new file
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    // Best effort: not every filesystem supports syncing a directory handle
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
