//! Scratch-directory housekeeping: pruning disposable content and
//! reclaiming empty directories.

use crate::error::{IoContext, PakError, Result};
use crate::paths;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Files deleted after extraction unless configured otherwise.
pub const DEFAULT_PRUNE_FILES: &[&str] = &["*.wem", "*.bnk", "*ShaderArchive*"];

/// Directories deleted (whole subtree) after extraction unless configured otherwise.
pub const DEFAULT_PRUNE_DIRS: &[&str] = &["*PipelineCaches*", "*TritonData*"];

/// Leftover paths reported when scratch can't be emptied.
const MAX_REPORTED_LEFTOVERS: usize = 20;

/// Glob patterns, matched against bare file and directory names.
#[derive(Debug, Clone)]
pub struct PruneRules {
    file_patterns: Vec<String>,
    dir_patterns: Vec<String>,
    files: GlobSet,
    dirs: GlobSet,
}

/// How much a prune pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneStats {
    pub files: usize,
    pub dirs: usize,
}

impl PruneStats {
    pub fn is_empty(&self) -> bool {
        self.files == 0 && self.dirs == 0
    }

    pub fn add(&mut self, other: PruneStats) {
        self.files += other.files;
        self.dirs += other.dirs;
    }
}

impl fmt::Display for PruneStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.files > 0 {
            parts.push(format!("{} file{}", self.files, if self.files == 1 { "" } else { "s" }));
        }
        if self.dirs > 0 {
            parts.push(format!("{} dir{}", self.dirs, if self.dirs == 1 { "" } else { "s" }));
        }
        if parts.is_empty() {
            write!(f, "nothing")
        } else {
            write!(f, "{}", parts.join(" and "))
        }
    }
}

fn build_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let glob = Glob::new(pattern).map_err(|source| PakError::InvalidGlob {
            pattern: pattern.to_string(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| PakError::InvalidGlob {
        pattern: patterns
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<_>>()
            .join(", "),
        source,
    })
}

impl PruneRules {
    pub fn new<F: AsRef<str>, D: AsRef<str>>(file_patterns: &[F], dir_patterns: &[D]) -> Result<Self> {
        Ok(Self {
            files: build_set(file_patterns)?,
            dirs: build_set(dir_patterns)?,
            file_patterns: file_patterns.iter().map(|p| p.as_ref().to_string()).collect(),
            dir_patterns: dir_patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// Keep everything.
    pub fn none() -> Self {
        Self {
            file_patterns: Vec::new(),
            dir_patterns: Vec::new(),
            files: GlobSet::empty(),
            dirs: GlobSet::empty(),
        }
    }

    pub fn file_patterns(&self) -> &[String] {
        &self.file_patterns
    }

    pub fn dir_patterns(&self) -> &[String] {
        &self.dir_patterns
    }

    pub fn is_empty(&self) -> bool {
        self.file_patterns.is_empty() && self.dir_patterns.is_empty()
    }

    /// Delete matching files and directories anywhere below `root`.
    pub fn prune(&self, root: &Path) -> Result<PruneStats> {
        let mut stats = PruneStats::default();
        if self.is_empty() || !root.exists() {
            return Ok(stats);
        }

        let mut walker = WalkDir::new(root).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let name = entry.file_name();

            if entry.file_type().is_dir() {
                if self.dirs.is_match(name) {
                    fs::remove_dir_all(entry.path()).at(entry.path())?;
                    walker.skip_current_dir();
                    stats.dirs += 1;
                }
            } else if self.files.is_match(name) {
                fs::remove_file(entry.path()).at(entry.path())?;
                stats.files += 1;
            }
        }

        debug!("Pruned {} under {}", stats, root.display());
        Ok(stats)
    }

    /// Returns true if a prune pass would have removed the entry at
    /// `relative`, a slash path below the pruned root.
    pub fn covers(&self, relative: &str) -> bool {
        let Ok(parts) = paths::components(relative) else {
            return false;
        };
        match parts.split_last() {
            Some((name, parents)) => {
                self.files.is_match(name) || parents.iter().any(|dir| self.dirs.is_match(dir))
            }
            None => false,
        }
    }
}

impl Default for PruneRules {
    fn default() -> Self {
        Self::new(DEFAULT_PRUNE_FILES, DEFAULT_PRUNE_DIRS).expect("default prune patterns are valid")
    }
}

fn walk_error(root: &Path, e: walkdir::Error) -> PakError {
    let path = e.path().unwrap_or(root).to_path_buf();
    PakError::io(path, e.into())
}

/// Remove empty directories below `dir`, depth first.
///
/// Returns true if `dir` itself ended up empty and was removed (only
/// attempted when `delete_root` is set).
pub fn remove_empty_dirs(dir: &Path, delete_root: bool) -> Result<bool> {
    let mut remaining = 0usize;
    for entry in fs::read_dir(dir).at(dir)? {
        let entry = entry.at(dir)?;
        let file_type = entry.file_type().at(entry.path())?;
        if file_type.is_dir() && remove_empty_dirs(&entry.path(), true)? {
            continue;
        }
        remaining += 1;
    }

    if remaining == 0 && delete_root {
        fs::remove_dir(dir).at(dir)?;
        return Ok(true);
    }
    Ok(false)
}

/// A sample of whatever is still below `root` (files and symlinks only).
pub fn leftover_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .take(MAX_REPORTED_LEFTOVERS)
        .map(|e| e.into_path())
        .collect()
}
