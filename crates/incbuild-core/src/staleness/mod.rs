//! Individual staleness checks
//!
//! Each check answers `Ok(None)` when it found nothing that forces a
//! rebuild, or `Ok(Some(reason))` naming the first thing it found.

mod directory;
mod resources;

pub use directory::compare_directories;
pub use resources::{is_out_of_date, ResourceChangeDetector};

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::identity::ModuleIdentifier;
use crate::scan::ScanError;
use crate::state::StoreError;

/// Why a module was found stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The descriptor is newer than recorded, or was never recorded
    DescriptorChanged { descriptor: PathBuf },

    /// A dependency evaluated earlier in the session is stale
    DependencyStale { dependency: ModuleIdentifier },

    /// A resource's copy is missing or older than the resource
    ResourceOutOfDate { source: PathBuf, target: PathBuf },

    /// Resources tracked by the previous run were not found again
    ResourcesDeleted { paths: Vec<String> },

    /// The previous resource set could not be loaded
    ResourceStateUnreadable { path: PathBuf },

    /// There is no output directory at all
    OutputMissing { directory: PathBuf },

    /// The newest source is newer than the newest output
    SourcesNewer {
        source_millis: u64,
        output_millis: u64,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::DescriptorChanged { descriptor } => {
                write!(f, "descriptor {} changed", descriptor.display())
            }
            StaleReason::DependencyStale { dependency } => {
                write!(f, "dependency {} is stale", dependency)
            }
            StaleReason::ResourceOutOfDate { source, .. } => {
                write!(f, "resource {} changed", source.display())
            }
            StaleReason::ResourcesDeleted { paths } => {
                write!(f, "{} resource(s) deleted: {}", paths.len(), paths.join(", "))
            }
            StaleReason::ResourceStateUnreadable { path } => {
                write!(f, "resource state {} unreadable", path.display())
            }
            StaleReason::OutputMissing { directory } => {
                write!(f, "output directory {} missing", directory.display())
            }
            StaleReason::SourcesNewer {
                source_millis,
                output_millis,
            } => write!(
                f,
                "sources modified at {} after outputs at {}",
                source_millis, output_millis
            ),
        }
    }
}

/// Outcome of evaluating one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Fresh,
    Stale(StaleReason),
}

impl Verdict {
    pub fn is_stale(&self) -> bool {
        matches!(self, Verdict::Stale(_))
    }

    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            Verdict::Fresh => None,
            Verdict::Stale(reason) => Some(reason),
        }
    }
}

impl From<Option<StaleReason>> for Verdict {
    fn from(reason: Option<StaleReason>) -> Self {
        reason.map_or(Verdict::Fresh, Verdict::Stale)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Fresh => write!(f, "fresh"),
            Verdict::Stale(reason) => write!(f, "stale ({})", reason),
        }
    }
}

/// Hard failure inside a check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
