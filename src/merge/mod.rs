//! Merge orchestrator
//!
//! Applies pakfiles one at a time, in load order, onto a single output tree.
//! Each pakfile goes through the same phases:
//! 1. List: build the raw → canonical mapping
//! 2. Extract: unpack into scratch, checked against the mapping
//! 3. Prune: delete disposable content from scratch
//! 4. Move: rename each mapped file to its canonical location
//! 5. Clean up: scratch has to end up empty, or the run stops
//!
//! Later pakfiles overwrite earlier ones, which is how patches win.

pub mod config;
pub mod prune;

pub use config::{ConfigError, MergeConfig, DEFAULT_TEMP_DIR_NAME};
pub use prune::{PruneRules, PruneStats, DEFAULT_PRUNE_DIRS, DEFAULT_PRUNE_FILES};

use crate::error::{IoContext, PakError, Result};
use crate::mapping::PakMapping;
use crate::pakfile::Pakfile;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

fn log_phase(pak: &Pakfile, phase: &str, started: Instant) {
    debug!(
        "Phase done: pak='{}' phase='{}' elapsed_ms={}",
        pak,
        phase,
        started.elapsed().as_millis()
    );
}

/// What happened to a single pakfile
#[derive(Debug, Clone)]
pub struct PakReport {
    pub pakfile: PathBuf,
    pub listed: usize,
    pub extracted: usize,
    pub pruned: PruneStats,
    pub moved: usize,
}

/// Merge run statistics
#[derive(Debug, Default, Clone)]
pub struct MergeReport {
    /// Processed pakfiles, in the order they were applied
    pub processed: Vec<PakReport>,
    /// Audio-only pakfiles left out of the run
    pub skipped_audio: Vec<PathBuf>,
}

impl MergeReport {
    pub fn files_moved(&self) -> usize {
        self.processed.iter().map(|r| r.moved).sum()
    }

    pub fn pruned(&self) -> PruneStats {
        let mut total = PruneStats::default();
        for report in &self.processed {
            total.add(report.pruned);
        }
        total
    }
}

/// Main merge orchestrator
pub struct PakMerger {
    config: MergeConfig,
}

impl PakMerger {
    /// Create a new merger with the given configuration.
    ///
    /// Relative destination and scratch paths are resolved against the
    /// current directory here, once.
    pub fn new(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.absolutize()?,
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `pakfiles` into the destination, lowest patch first.
    ///
    /// Input order doesn't matter. Stops at the first failing pakfile; what
    /// was already moved stays in the destination.
    pub fn run(&self, pakfiles: &[Pakfile]) -> Result<MergeReport> {
        let mut report = MergeReport::default();

        let mut ordered: Vec<&Pakfile> = Vec::with_capacity(pakfiles.len());
        for pak in pakfiles {
            if self.config.skip_audio_paks && pak.is_audio_only() {
                info!("Skipping audio-only pakfile {}", pak);
                report.skipped_audio.push(pak.path().to_path_buf());
            } else {
                ordered.push(pak);
            }
        }
        if ordered.is_empty() {
            return Err(PakError::NoPakfiles);
        }
        ordered.sort();

        let prune = &self.config.prune;
        if !prune.file_patterns().is_empty() {
            info!("Pruning files matching: {}", prune.file_patterns().join(", "));
        }
        if !prune.dir_patterns().is_empty() {
            info!("Pruning directories matching: {}", prune.dir_patterns().join(", "));
        }

        fs::create_dir_all(&self.config.destination).at(&self.config.destination)?;
        self.reset_temp_dir()?;

        let total = ordered.len();
        for (i, pak) in ordered.into_iter().enumerate() {
            info!("Processing {} ({}/{})", pak, i + 1, total);
            report.processed.push(self.merge_pakfile(pak)?);
        }

        if self.config.temp_dir.exists() {
            fs::remove_dir_all(&self.config.temp_dir).at(&self.config.temp_dir)?;
        }

        info!(
            "Merged {} pakfiles, {} files placed, pruned {}",
            report.processed.len(),
            report.files_moved(),
            report.pruned()
        );
        Ok(report)
    }

    /// Apply a single pakfile on top of whatever the destination holds.
    ///
    /// Scratch must be empty (or absent) on entry; it is removed on success.
    pub fn merge_pakfile(&self, pak: &Pakfile) -> Result<PakReport> {
        let temp_dir = &self.config.temp_dir;

        let started = Instant::now();
        let mapping = self
            .config
            .decoder
            .build_mapping(pak, &self.config.normalizer)?;
        log_phase(pak, "list", started);

        let started = Instant::now();
        let extracted = self.config.decoder.extract(pak, temp_dir, Some(&mapping))?;
        log_phase(pak, "extract", started);

        let pruned = self.config.prune.prune(temp_dir)?;
        if !pruned.is_empty() {
            info!("Pruned {} per config", pruned);
        }

        let started = Instant::now();
        let moved = move_into_place(
            pak,
            temp_dir,
            &self.config.destination,
            &mapping,
            &self.config.prune,
        )?;
        log_phase(pak, "move", started);

        clean_temp_dir(temp_dir)?;

        Ok(PakReport {
            pakfile: pak.path().to_path_buf(),
            listed: mapping.len(),
            extracted,
            pruned,
            moved,
        })
    }

    fn reset_temp_dir(&self) -> Result<()> {
        let temp_dir = &self.config.temp_dir;
        if temp_dir.exists() {
            warn!("Removing stale temporary directory {}", temp_dir.display());
            fs::remove_dir_all(temp_dir).at(temp_dir)?;
        }
        Ok(())
    }
}

/// Rename every mapped file from scratch into the destination.
///
/// An entry missing from scratch has to be one the prune rules removed;
/// anything else means extraction went somewhere we didn't expect.
fn move_into_place(
    pak: &Pakfile,
    temp_dir: &Path,
    destination: &Path,
    mapping: &PakMapping,
    prune: &PruneRules,
) -> Result<usize> {
    let mut moved = 0usize;
    for (raw, canonical) in mapping.iter() {
        let from = paths::join_slash_path(temp_dir, raw)?;
        if fs::symlink_metadata(&from).is_err() {
            if prune.covers(raw) {
                continue;
            }
            return Err(PakError::MissingExtractedFile {
                pak: pak.path().to_path_buf(),
                entry: raw.to_string(),
                expected_at: from,
            });
        }
        let to = paths::join_slash_path(destination, canonical)?;
        paths::ensure_parent_dirs(&to)?;
        fs::rename(&from, &to).at(&from)?;
        moved += 1;
    }
    Ok(moved)
}

/// Remove scratch, which by now should only hold empty directories.
fn clean_temp_dir(temp_dir: &Path) -> Result<()> {
    if !temp_dir.exists() {
        return Ok(());
    }
    if !prune::remove_empty_dirs(temp_dir, true)? {
        return Err(PakError::DanglingTempContent {
            temp_dir: temp_dir.to_path_buf(),
            leftovers: prune::leftover_files(temp_dir),
        });
    }
    Ok(())
}
