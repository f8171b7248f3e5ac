use std::path::PathBuf;
use thiserror::Error;

use crate::identity::ModuleIdentifier;
use crate::registry::RegistryError;
use crate::scan::ScanError;
use crate::state::StoreError;

/// Failure that aborts the evaluation of one module
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("module {module}: error loading previous timestamps")]
    TimestampLoad {
        module: ModuleIdentifier,
        #[source]
        source: StoreError,
    },

    #[error("module {module}: error saving state")]
    StateSave {
        module: ModuleIdentifier,
        #[source]
        source: StoreError,
    },

    #[error("module {module}: unable to scan files")]
    Scan {
        module: ModuleIdentifier,
        #[source]
        source: ScanError,
    },

    #[error("module {module}: unable to clean {path}")]
    Cleanup {
        module: ModuleIdentifier,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl EngineError {
    /// The module whose evaluation failed
    pub fn module(&self) -> &ModuleIdentifier {
        match self {
            EngineError::TimestampLoad { module, .. }
            | EngineError::StateSave { module, .. }
            | EngineError::Scan { module, .. }
            | EngineError::Cleanup { module, .. } => module,
            EngineError::Registry(RegistryError::AlreadyRecorded(module)) => module,
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
