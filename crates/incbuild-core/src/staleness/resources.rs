use std::path::Path;
use tracing::{debug, info, warn};

use super::{CheckError, StaleReason};
use crate::config::ResourceGroup;
use crate::scan::{modified_millis, DirectoryScanner};
use crate::state::ResourceSetStore;

/// Copy-if-newer rule: the copy is out of date when it is missing or older
/// than the source by more than `granularity_ms`
pub fn is_out_of_date(source_millis: u64, target_millis: Option<u64>, granularity_ms: u64) -> bool {
    match target_millis {
        None => true,
        Some(target) => source_millis.saturating_sub(granularity_ms) > target,
    }
}

/// Detects added, modified and deleted resources of one module
///
/// The resource paths matched by the previous run are kept in a
/// [`ResourceSetStore`] under the module's build directory. Every path
/// matched again is taken off the previous set and put into the current one;
/// whatever is left in the previous set afterwards was deleted.
pub struct ResourceChangeDetector<'a> {
    groups: &'a [ResourceGroup],
    default_output: &'a Path,
    state_dir: &'a Path,
    state_file: &'a str,
    granularity_ms: u64,
}

impl<'a> ResourceChangeDetector<'a> {
    pub fn new(
        groups: &'a [ResourceGroup],
        default_output: &'a Path,
        state_dir: &'a Path,
        state_file: &'a str,
    ) -> Self {
        Self {
            groups,
            default_output,
            state_dir,
            state_file,
            granularity_ms: 0,
        }
    }

    pub fn with_granularity(mut self, granularity_ms: u64) -> Self {
        self.granularity_ms = granularity_ms;
        self
    }

    /// Run the check
    ///
    /// Stops at the first out-of-date resource. The current resource set is
    /// saved only when nothing is stale, so the previous snapshot survives
    /// any run that reports a change.
    pub fn check(&self) -> Result<Option<StaleReason>, CheckError> {
        let mut previous = match ResourceSetStore::load(self.state_dir, self.state_file) {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Error loading previous resources: {}", e);
                return Ok(Some(StaleReason::ResourceStateUnreadable {
                    path: e.path().to_path_buf(),
                }));
            }
        };
        let mut current = ResourceSetStore::new(self.state_dir, self.state_file);

        for group in self.groups {
            if let Some(reason) = self.check_group(group, &mut previous, &mut current)? {
                return Ok(Some(reason));
            }
        }

        if !previous.is_empty() {
            let paths: Vec<String> = previous.iter().map(str::to_string).collect();
            info!("{} resource(s) deleted, module has to be cleaned", paths.len());
            return Ok(Some(StaleReason::ResourcesDeleted { paths }));
        }

        current.save()?;
        Ok(None)
    }

    fn check_group(
        &self,
        group: &ResourceGroup,
        previous: &mut ResourceSetStore,
        current: &mut ResourceSetStore,
    ) -> Result<Option<StaleReason>, CheckError> {
        let source_dir = group.directory.as_path();
        if !source_dir.is_dir() {
            info!("Resources directory does not exist: {}", source_dir.display());
            return Ok(None);
        }

        let target_dir = group.target_directory(self.default_output);
        debug!(
            "Resources {} -> {} (includes {:?}, excludes {:?})",
            source_dir.display(),
            target_dir.display(),
            group.includes,
            group.excludes
        );

        let files = DirectoryScanner::new(source_dir)
            .with_includes(&group.includes)?
            .with_excludes(&group.excludes)?
            .scan()?;
        debug!("{} resource file(s) found", files.len());

        for relative in files {
            let source = source_dir.join(&relative);
            let target = target_dir.join(&relative);

            let out_of_date = match modified_millis(&source)? {
                Some(source_millis) => {
                    is_out_of_date(source_millis, modified_millis(&target)?, self.granularity_ms)
                }
                // Removed since the scan; the next run reports it as deleted
                None => false,
            };
            debug!(
                "{} out of date: {} (compared to {})",
                target.display(),
                out_of_date,
                source.display()
            );

            previous.remove(&relative);
            current.add(relative);

            if out_of_date {
                info!("Resources updated, module has to be cleaned");
                return Ok(Some(StaleReason::ResourceOutOfDate { source, target }));
            }
        }

        Ok(None)
    }
}
