use std::path::PathBuf;
use thiserror::Error;

/// Failure to load or persist one of the per-module state files
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupted state file {path}: {source}")]
    Decode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("state file {path} has format version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("failed to encode state for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: bincode::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    /// Path of the state file involved in the failure
    pub fn path(&self) -> &std::path::Path {
        match self {
            StoreError::Read { path, .. }
            | StoreError::Decode { path, .. }
            | StoreError::VersionMismatch { path, .. }
            | StoreError::Encode { path, .. }
            | StoreError::Write { path, .. } => path,
        }
    }
}
