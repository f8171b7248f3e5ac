use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{EngineConfig, ModuleSpec};
use crate::error::{EngineError, Result};
use crate::identity::ModuleIdentifier;
use crate::registry::ModuleRegistry;
use crate::scan::{modified_millis, ScanError};
use crate::staleness::{
    compare_directories, CheckError, ResourceChangeDetector, StaleReason, Verdict,
};
use crate::state::TimestampStore;

/// Why an evaluation did not run the checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    /// The engine is switched off; every module reports fresh
    Disabled,
    /// The module already has a verdict in this build session
    AlreadyEvaluated,
}

/// Result of evaluating one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub module: ModuleIdentifier,
    pub verdict: Verdict,
    /// Directories removed by the cleanup, including ones that were already
    /// absent; empty unless the module was found stale
    pub cleaned: Vec<PathBuf>,
    pub skipped: Option<Skipped>,
}

impl Evaluation {
    pub fn is_stale(&self) -> bool {
        self.verdict.is_stale()
    }
}

/// Decides whether a module's outputs are stale and, if so, cleans them
///
/// The checks run in a fixed order and stop at the first one that reports
/// staleness:
///
/// 1. the descriptor is newer than the recorded timestamp
/// 2. a dependency was found stale earlier in this session
/// 3. a resource was added, changed or deleted
/// 4. the newest source is newer than the newest output
///
/// Checks after the first stale one do not run, so their state is not
/// refreshed either: a stale descriptor leaves the resource set from the
/// previous run untouched.
pub struct StalenessEngine {
    config: EngineConfig,
}

impl StalenessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one module and record its verdict in `registry`
    ///
    /// The module's dependencies must have been evaluated with the same
    /// registry beforehand.
    pub fn evaluate(&self, module: &ModuleSpec, registry: &mut ModuleRegistry) -> Result<Evaluation> {
        let id = &module.id;

        if self.config.no_incremental_build {
            info!("Incremental build deactivated");
            return Ok(Evaluation {
                module: id.clone(),
                verdict: Verdict::Fresh,
                cleaned: Vec::new(),
                skipped: Some(Skipped::Disabled),
            });
        }

        if let Some(previous) = registry.lookup(id) {
            info!("Incremental build check already done for {}, skipping", id);
            return Ok(Evaluation {
                module: id.clone(),
                verdict: previous.verdict().clone(),
                cleaned: Vec::new(),
                skipped: Some(Skipped::AlreadyEvaluated),
            });
        }

        debug!("Evaluating {} ({} module(s) resolved)", id, registry.len());
        debug!("Loading previous timestamps ...");
        let mut timestamps =
            TimestampStore::load(&module.build_directory, &self.config.timestamps_file).map_err(
                |e| EngineError::TimestampLoad {
                    module: id.clone(),
                    source: e,
                },
            )?;

        let verdict = Verdict::from(self.run_checks(module, registry, &mut timestamps)?);
        registry.record(id.clone(), verdict.clone())?;

        let cleaned = if verdict.is_stale() {
            self.clean(module)?
        } else {
            Vec::new()
        };

        debug!("Saving timestamps ...");
        timestamps.save().map_err(|e| EngineError::StateSave {
            module: id.clone(),
            source: e,
        })?;

        info!("Module {} is {}", id, verdict);
        Ok(Evaluation {
            module: id.clone(),
            verdict,
            cleaned,
            skipped: None,
        })
    }

    fn run_checks(
        &self,
        module: &ModuleSpec,
        registry: &ModuleRegistry,
        timestamps: &mut TimestampStore,
    ) -> Result<Option<StaleReason>> {
        if let Some(reason) = self.check_descriptor(module, timestamps)? {
            return Ok(Some(reason));
        }
        if let Some(reason) = self.check_dependencies(module, registry) {
            return Ok(Some(reason));
        }
        if let Some(reason) = self.check_resources(module)? {
            return Ok(Some(reason));
        }
        self.check_sources(module)
    }

    /// Stale when the descriptor has no recorded timestamp or is newer than
    /// it; the new timestamp is recorded in that case
    fn check_descriptor(
        &self,
        module: &ModuleSpec,
        timestamps: &mut TimestampStore,
    ) -> Result<Option<StaleReason>> {
        info!("Verifying module descriptor ...");

        let key = module.descriptor.to_string_lossy().into_owned();
        let current = modified_millis(&module.descriptor)
            .map_err(|e| scan_error(&module.id, e))?
            .unwrap_or(0);

        let changed = match timestamps.get(&key) {
            None => true,
            Some(recorded) => current > recorded,
        };

        if changed {
            info!("Descriptor modification detected: {}", module.descriptor.display());
            timestamps.set(key, current);
            Ok(Some(StaleReason::DescriptorChanged {
                descriptor: module.descriptor.clone(),
            }))
        } else {
            debug!("No modification on descriptor");
            Ok(None)
        }
    }

    fn check_dependencies(&self, module: &ModuleSpec, registry: &ModuleRegistry) -> Option<StaleReason> {
        info!("Verifying dependency modules ...");

        for dependency in &module.dependencies {
            match registry.lookup(dependency) {
                Some(found) => debug!("Module {} stale: {}", dependency, found.is_stale()),
                None => debug!("Module {} not evaluated in this session", dependency),
            }
        }

        let dependency = registry.first_stale_dependency(&module.dependencies)?;
        info!("Module {} updated", dependency);
        Some(StaleReason::DependencyStale {
            dependency: dependency.clone(),
        })
    }

    fn check_resources(&self, module: &ModuleSpec) -> Result<Option<StaleReason>> {
        info!("Verifying resources ...");

        ResourceChangeDetector::new(
            &module.resources,
            &module.output_directory,
            &module.build_directory,
            &self.config.resources_file,
        )
        .with_granularity(self.config.granularity_ms)
        .check()
        .map_err(|e| match e {
            CheckError::Scan(e) => scan_error(&module.id, e),
            CheckError::Store(e) => EngineError::StateSave {
                module: module.id.clone(),
                source: e,
            },
        })
    }

    fn check_sources(&self, module: &ModuleSpec) -> Result<Option<StaleReason>> {
        info!("Verifying sources ...");

        compare_directories(&module.source_directory, &module.output_directory)
            .map_err(|e| scan_error(&module.id, e))
    }

    /// Delete the build directory, plus the main and test output
    /// directories when they live outside of it
    fn clean(&self, module: &ModuleSpec) -> Result<Vec<PathBuf>> {
        debug!("Module updated, cleaning module");

        let build = module.build_directory.as_path();
        let mut cleaned = vec![self.delete_directory(&module.id, build)?];

        for output in [&module.output_directory, &module.test_output_directory] {
            if !output.starts_with(build) {
                cleaned.push(self.delete_directory(&module.id, output)?);
            }
        }

        Ok(cleaned)
    }

    fn delete_directory(&self, module: &ModuleIdentifier, path: &Path) -> Result<PathBuf> {
        info!("Deleting {}", path.display());
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
            Err(e) => Err(EngineError::Cleanup {
                module: module.clone(),
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn scan_error(module: &ModuleIdentifier, source: ScanError) -> EngineError {
    EngineError::Scan {
        module: module.clone(),
        source,
    }
}
