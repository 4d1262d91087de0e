//! Settings management
//!
//! Stores user preferences in ~/.config/pakmerge/settings.json. Every field is
//! optional; command-line flags override whatever is saved here.

use crate::merge::{PruneRules, DEFAULT_PRUNE_DIRS, DEFAULT_PRUNE_FILES};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User settings for pakmerge
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Decoder executable (name or path)
    #[serde(default)]
    pub decoder: String,

    /// Program to run the decoder through, e.g. wine64
    #[serde(default)]
    pub wrapper: String,

    /// WINEPREFIX handed to the decoder
    #[serde(default)]
    pub wineprefix: String,

    /// Crypto config (JSON with the AES key) passed as -cryptokeys
    #[serde(default)]
    pub crypto: String,

    /// Default destination directory
    #[serde(default)]
    pub extract_to: String,

    /// File globs to prune (None = built-in list)
    #[serde(default)]
    pub prune_files: Option<Vec<String>>,

    /// Directory globs to prune (None = built-in list)
    #[serde(default)]
    pub prune_dirs: Option<Vec<String>>,

    /// Merge the audio-only pakfiles too
    #[serde(default)]
    pub keep_audio_paks: bool,
}

impl Settings {
    /// Get the config directory path (~/.config/pakmerge)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("pakmerge");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Ok(path) => Self::load_or_default(&path),
            Err(e) => {
                eprintln!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Like `load_from`, but a broken file is reported on stderr and replaced
    /// by defaults. Runs before logging is set up, hence no `tracing` here.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Could not load settings: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file; a missing file gives defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Prune rules from the saved globs, falling back to the built-in lists
    pub fn prune_rules(&self) -> crate::Result<PruneRules> {
        let files: Vec<&str> = match &self.prune_files {
            Some(globs) => globs.iter().map(String::as_str).collect(),
            None => DEFAULT_PRUNE_FILES.to_vec(),
        };
        let dirs: Vec<&str> = match &self.prune_dirs {
            Some(globs) => globs.iter().map(String::as_str).collect(),
            None => DEFAULT_PRUNE_DIRS.to_vec(),
        };
        PruneRules::new(&files, &dirs)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Settings {
    pub fn decoder(&self) -> Option<&str> {
        non_empty(&self.decoder)
    }

    pub fn wrapper(&self) -> Option<&str> {
        non_empty(&self.wrapper)
    }

    pub fn wineprefix(&self) -> Option<&str> {
        non_empty(&self.wineprefix)
    }

    pub fn crypto(&self) -> Option<&str> {
        non_empty(&self.crypto)
    }

    pub fn extract_to(&self) -> Option<&str> {
        non_empty(&self.extract_to)
    }
}
