use std::path::Path;
use tracing::{debug, info};

use super::StaleReason;
use crate::scan::{max_modified_millis, DirectoryScanner, ScanError};

/// Compare a source tree against the output tree built from it
///
/// Outputs need not correspond one-to-one with sources, so only the newest
/// modification time of each tree is compared. A missing source tree can
/// never be stale; a missing output tree always is.
pub fn compare_directories(source: &Path, target: &Path) -> Result<Option<StaleReason>, ScanError> {
    debug!("Checking {} against {}", source.display(), target.display());

    if !source.is_dir() {
        info!("No sources to check in {}", source.display());
        return Ok(None);
    }

    if !target.is_dir() {
        info!("No output directory {}, build is required", target.display());
        return Ok(Some(StaleReason::OutputMissing {
            directory: target.to_path_buf(),
        }));
    }

    let source_files = DirectoryScanner::new(source).scan()?;
    let source_millis = max_modified_millis(source, &source_files)?;
    debug!("Last source modification: {}", source_millis);

    let target_files = DirectoryScanner::new(target).scan()?;
    let output_millis = max_modified_millis(target, &target_files)?;
    debug!("Last output modification: {}", output_millis);

    if source_millis > output_millis {
        info!("Source modification detected in {}", source.display());
        Ok(Some(StaleReason::SourcesNewer {
            source_millis,
            output_millis,
        }))
    } else {
        debug!("No source changes in {}", source.display());
        Ok(None)
    }
}
