//! File tree scanning with Ant-style include/exclude patterns
//!
//! Patterns are matched against paths relative to the scanned directory,
//! always `/`-separated. `*` stays within one path segment, `**` spans any
//! number of directories, and a pattern ending in `/` matches everything
//! below that directory.

use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// Patterns every scan ignores: version-control metadata, editor backup and
/// lock files, and OS droppings
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Miscellaneous typical temporary files
    "**/*~",
    "**/#*#",
    "**/.#*",
    "**/%*%",
    "**/._*",
    // CVS
    "**/CVS",
    "**/CVS/**",
    "**/.cvsignore",
    // RCS
    "**/RCS",
    "**/RCS/**",
    // SCCS
    "**/SCCS",
    "**/SCCS/**",
    // Visual SourceSafe
    "**/vssver.scc",
    // MKS
    "**/project.pj",
    // Subversion
    "**/.svn",
    "**/.svn/**",
    // Arch
    "**/.arch-ids",
    "**/.arch-ids/**",
    // Bazaar
    "**/.bzr",
    "**/.bzr/**",
    // SurroundSCM
    "**/.MySCMServerInfo",
    // Mac
    "**/.DS_Store",
    // Serena Dimensions
    "**/.metadata",
    "**/.metadata/**",
    // Mercurial
    "**/.hg",
    "**/.hg/**",
    "**/.hgignore",
    // git
    "**/.git",
    "**/.git/**",
    "**/.gitignore",
    "**/.gitattributes",
    // BitKeeper
    "**/BitKeeper",
    "**/BitKeeper/**",
    "**/ChangeSet",
    "**/ChangeSet/**",
    // darcs
    "**/_darcs",
    "**/_darcs/**",
    "**/.darcsrepo",
    "**/.darcsrepo/**",
    "**/-darcs-backup*",
    "**/.darcs-temp-mail",
];

/// `DEFAULT_EXCLUDES`, compiled once per process
static DEFAULT_EXCLUDE_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    DEFAULT_EXCLUDES
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
});

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("failed to read modification time of {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the failure relates to, when there is one
    pub fn path(&self) -> Option<&Path> {
        match self {
            ScanError::Pattern { .. } => None,
            ScanError::Walk { path, .. } | ScanError::Metadata { path, .. } => Some(path),
        }
    }
}

/// Lists the files under a base directory that match the include patterns
/// and none of the exclude patterns
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    base: PathBuf,
    /// Empty means every file
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl DirectoryScanner {
    /// Scanner over `base` including every file, with the default excludes
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    /// Replace the include patterns; an empty list keeps "include all"
    pub fn with_includes<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ScanError> {
        self.includes = compile_all(patterns)?;
        Ok(self)
    }

    /// Add exclude patterns on top of the default excludes
    pub fn with_excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ScanError> {
        self.excludes.extend(compile_all(patterns)?);
        Ok(self)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Walk the base directory and return the matching files as relative,
    /// `/`-separated paths in sorted order
    ///
    /// The base directory must exist. Directories matched by a default
    /// exclude are not descended into.
    pub fn scan(&self) -> Result<Vec<String>, ScanError> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.base)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let relative = relative_name(&self.base, entry.path());
                !self.is_default_excluded(&relative)
            });

        for entry in walker {
            let entry = entry.map_err(|e| ScanError::Walk {
                path: e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.base.clone()),
                source: e,
            })?;

            if entry.file_type().is_dir() || !entry.path().is_file() {
                continue;
            }

            let relative = relative_name(&self.base, entry.path());
            if self.is_included(&relative) && !self.is_excluded(&relative) {
                files.push(relative);
            }
        }

        files.sort();
        debug!("Scanned {}: {} file(s)", self.base.display(), files.len());
        Ok(files)
    }

    fn is_included(&self, relative: &str) -> bool {
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.is_default_excluded(relative)
            || self
                .excludes
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    fn is_default_excluded(&self, relative: &str) -> bool {
        DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }
}

/// Modification time of `path` in milliseconds since the Unix epoch, or
/// `None` if it does not exist
///
/// Times before the epoch clamp to 0.
pub fn modified_millis(path: &Path) -> Result<Option<u64>, ScanError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(ScanError::Metadata {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let modified = metadata.modified().map_err(|e| ScanError::Metadata {
        path: path.to_path_buf(),
        source: e,
    })?;
    let millis = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    Ok(Some(millis))
}

/// Latest modification time among `files` (relative to `base`), 0 when
/// there are none
///
/// A file that disappears between the scan and the stat is ignored.
pub fn max_modified_millis(base: &Path, files: &[String]) -> Result<u64, ScanError> {
    let mut latest = 0;
    for file in files {
        if let Some(millis) = modified_millis(&base.join(file))? {
            latest = latest.max(millis);
        }
    }
    Ok(latest)
}

fn relative_name(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_pattern(pattern: &str) -> String {
    let mut normalized = pattern.replace('\\', "/");
    if normalized.ends_with('/') {
        normalized.push_str("**");
    }
    normalized
}

fn compile_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, ScanError> {
    patterns
        .iter()
        .map(|p| {
            let pattern = p.as_ref();
            Pattern::new(&normalize_pattern(pattern)).map_err(|e| ScanError::Pattern {
                pattern: pattern.to_string(),
                source: e,
            })
        })
        .collect()
}
