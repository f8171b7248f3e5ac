use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::ModuleIdentifier;
use crate::state::{RESOURCES_FILE_NAME, TIMESTAMPS_FILE_NAME};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("failed to serialize build plan: {0}")]
    Serialize(String),
}

/// Options that control the staleness engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Bypass every check and report modules as fresh (default: false)
    #[serde(default)]
    pub no_incremental_build: bool,

    /// Tolerance in milliseconds when comparing a resource against its
    /// copy; the copy is out of date when `source - granularity > target`
    /// (default: 0)
    #[serde(default)]
    pub granularity_ms: u64,

    /// File name of the descriptor timestamp store
    #[serde(default = "default_timestamps_file")]
    pub timestamps_file: String,

    /// File name of the resource path store
    #[serde(default = "default_resources_file")]
    pub resources_file: String,
}

fn default_timestamps_file() -> String {
    TIMESTAMPS_FILE_NAME.to_string()
}

fn default_resources_file() -> String {
    RESOURCES_FILE_NAME.to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            no_incremental_build: false,
            granularity_ms: 0,
            timestamps_file: default_timestamps_file(),
            resources_file: default_resources_file(),
        }
    }
}

/// Command-line values that take precedence over a build plan
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub no_incremental_build: Option<bool>,
    pub granularity_ms: Option<u64>,
}

impl EngineConfig {
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(disabled) = overrides.no_incremental_build {
            self.no_incremental_build = disabled;
        }
        if let Some(granularity) = overrides.granularity_ms {
            self.granularity_ms = granularity;
        }
    }
}

/// A directory of resource files copied into an output location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub directory: PathBuf,

    /// Where the resources are copied; the module's output directory if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,

    /// Include patterns; every file if empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
}

impl ResourceGroup {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            target_path: None,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    pub fn with_target_path(mut self, target: impl Into<PathBuf>) -> Self {
        self.target_path = Some(target.into());
        self
    }

    pub fn with_includes(mut self, includes: &[&str]) -> Self {
        self.includes = includes.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_excludes(mut self, excludes: &[&str]) -> Self {
        self.excludes = excludes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Directory this group's files are copied into
    pub fn target_directory<'a>(&'a self, default_output: &'a Path) -> &'a Path {
        self.target_path.as_deref().unwrap_or(default_output)
    }
}

/// Everything the engine needs to know about one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    #[serde(flatten)]
    pub id: ModuleIdentifier,

    /// The module's build-configuration file
    pub descriptor: PathBuf,

    pub source_directory: PathBuf,

    /// Main output directory, compared against the sources
    pub output_directory: PathBuf,

    pub test_output_directory: PathBuf,

    /// Build-output root; holds the module's state files
    pub build_directory: PathBuf,

    #[serde(default)]
    pub resources: Vec<ResourceGroup>,

    /// Resolved dependency modules, in declaration order
    #[serde(default)]
    pub dependencies: Vec<ModuleIdentifier>,
}

impl ModuleSpec {
    /// Module laid out the conventional way under `basedir`: descriptor
    /// `module.yaml`, sources in `src/main`, resources in `src/resources`,
    /// outputs under `target`
    pub fn with_layout(id: ModuleIdentifier, basedir: &Path) -> Self {
        let build_directory = basedir.join("target");
        Self {
            id,
            descriptor: basedir.join("module.yaml"),
            source_directory: basedir.join("src").join("main"),
            output_directory: build_directory.join("classes"),
            test_output_directory: build_directory.join("test-classes"),
            build_directory,
            resources: vec![ResourceGroup::new(basedir.join("src").join("resources"))],
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: ModuleIdentifier) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.descriptor,
            &mut self.source_directory,
            &mut self.output_directory,
            &mut self.test_output_directory,
            &mut self.build_directory,
        ] {
            resolve(path, base);
        }
        for group in &mut self.resources {
            resolve(&mut group.directory, base);
            if let Some(target) = group.target_path.as_mut() {
                resolve(target, base);
            }
        }
    }
}

fn resolve(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

/// The modules of one build session, in dependency order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
}

impl BuildPlan {
    /// Load a plan from YAML (or JSON, by `.json` extension)
    ///
    /// Relative module paths are resolved against the plan's directory, so
    /// every path of a loaded plan is absolute.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let mut plan: BuildPlan = if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        // Descriptor paths key the timestamp store and must come out absolute
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base = std::path::absolute(parent).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        for module in &mut plan.modules {
            module.resolve_paths(&base);
        }
        Ok(plan)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
