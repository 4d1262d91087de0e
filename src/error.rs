//! Error types for pak ordering, listing, extraction and merging.
//!
//! Every variant is fatal for the run: archive order and override semantics
//! make a half-applied pakfile impossible to reason about, so nothing here
//! is retried.

use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T, E = PakError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum PakError {
    /// Filename matched neither the main nor the add-on pattern.
    #[error("Unknown pak file: {0}")]
    UnknownArchiveName(String),

    #[error("Specified file {0} is not a .pak file")]
    NotAPakfile(PathBuf),

    #[error("No pakfiles found to process")]
    NoPakfiles,

    #[error("Could not find {program} to unpack pak files ({source}). {hint}")]
    DecoderNotFound {
        program: PathBuf,
        hint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decoder exited with {status} while processing {pak}: {stderr}")]
    DecoderFailed {
        pak: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Found filename {0:?} before any mount point was announced")]
    MissingMountPoint(String),

    /// Extraction reported a path the listing pass never produced.
    #[error("Unexpected filename extracted from {pak}: {entry}")]
    UnexpectedEntry { pak: PathBuf, entry: String },

    #[error("Expected {expected} files from {pak}, only found {found}")]
    IncompleteExtraction {
        pak: PathBuf,
        expected: usize,
        found: usize,
    },

    /// Something was left in scratch with no mapping entry to move it.
    #[error("Could not delete temporary folder {temp_dir} ({} leftover entries, first: {:?})", .leftovers.len(), .leftovers.first())]
    DanglingTempContent {
        temp_dir: PathBuf,
        leftovers: Vec<PathBuf>,
    },

    /// Reported as extracted, but not in scratch and not pruned either.
    #[error("Decoder reported {entry} from {pak} as extracted, but {} does not exist", .expected_at.display())]
    MissingExtractedFile {
        pak: PathBuf,
        entry: String,
        expected_at: PathBuf,
    },

    #[error("Path {0:?} escapes its destination root")]
    EscapingPath(String),

    #[error("Invalid prune pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error(transparent)]
    Config(#[from] crate::merge::ConfigError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PakError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PakError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Attach a path to a bare `io::Result`.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| PakError::io(path, e))
    }
}
