//! Merge configuration
//!
//! Everything a merge run needs to know, assembled by the CLI from flags and
//! saved settings.

use super::prune::PruneRules;
use crate::decoder::Decoder;
use crate::error::IoContext;
use crate::mapping::PathNormalizer;
use std::path::{Path, PathBuf};

/// Scratch directory name used when none is configured.
pub const DEFAULT_TEMP_DIR_NAME: &str = "_pakmerge_tmp";

/// Configuration for a merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Final output tree (the in-game layout)
    pub destination: PathBuf,

    /// Per-archive scratch area. Wiped at the start of a run.
    pub temp_dir: PathBuf,

    /// How to run the pak decoder
    pub decoder: Decoder,

    /// Raw → canonical path translation
    pub normalizer: PathNormalizer,

    /// Content deleted from scratch before moving
    pub prune: PruneRules,

    /// Leave out the audio-only pakfile groups
    pub skip_audio_paks: bool,
}

impl MergeConfig {
    pub fn new(destination: impl Into<PathBuf>, decoder: Decoder) -> Self {
        let destination = destination.into();
        Self {
            temp_dir: destination.join(DEFAULT_TEMP_DIR_NAME),
            destination,
            decoder,
            normalizer: PathNormalizer::default(),
            prune: PruneRules::default(),
            skip_audio_paks: true,
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_prune(mut self, prune: PruneRules) -> Self {
        self.prune = prune;
        self
    }

    pub fn with_normalizer(mut self, normalizer: PathNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_skip_audio_paks(mut self, skip: bool) -> Self {
        self.skip_audio_paks = skip;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.as_os_str().is_empty() {
            return Err(ConfigError::MissingDestination);
        }

        if !self.decoder.crypto_config().is_file() {
            return Err(ConfigError::CryptoConfigNotFound(
                self.decoder.crypto_config().to_path_buf(),
            ));
        }

        // Scratch gets deleted wholesale, so it can't contain the output
        if self.temp_dir.as_os_str().is_empty() || contains(&self.temp_dir, &self.destination) {
            return Err(ConfigError::UnsafeTempDir {
                temp_dir: self.temp_dir.clone(),
                destination: self.destination.clone(),
            });
        }

        // Files are renamed out of scratch, which only works within one filesystem
        if !same_filesystem(&self.temp_dir, &self.destination) {
            return Err(ConfigError::CrossDeviceTempDir {
                temp_dir: self.temp_dir.clone(),
                destination: self.destination.clone(),
            });
        }

        Ok(())
    }

    /// Resolve destination and scratch against the current directory.
    pub fn absolutize(mut self) -> crate::Result<Self> {
        self.destination = std::path::absolute(&self.destination).at(&self.destination)?;
        self.temp_dir = std::path::absolute(&self.temp_dir).at(&self.temp_dir)?;
        Ok(self)
    }
}

fn resolved(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn contains(dir: &Path, path: &Path) -> bool {
    resolved(path).starts_with(resolved(dir))
}

/// Device of the closest existing ancestor; neither path has to exist yet.
#[cfg(unix)]
fn device_id(path: &Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;

    resolved(path)
        .ancestors()
        .find_map(|p| std::fs::metadata(p).ok())
        .map(|m| m.dev())
}

#[cfg(unix)]
fn same_filesystem(a: &Path, b: &Path) -> bool {
    match (device_id(a), device_id(b)) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

// No cheap device check here; a cross-device rename shows up as an I/O error instead
#[cfg(not(unix))]
fn same_filesystem(_a: &Path, _b: &Path) -> bool {
    true
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No destination directory given")]
    MissingDestination,

    #[error("Crypto config not found: {0}")]
    CryptoConfigNotFound(PathBuf),

    #[error("Temporary directory {temp_dir} would contain the destination {destination}")]
    UnsafeTempDir { temp_dir: PathBuf, destination: PathBuf },

    #[error("Temporary directory {temp_dir} must be on the same filesystem as the destination {destination}")]
    CrossDeviceTempDir { temp_dir: PathBuf, destination: PathBuf },
}
