//! pakmerge - Borderlands 3 pakfile merger
//!
//! Orders a set of pakfiles into load order, has an external decoder
//! (UnrealPak) list and extract each one, and merges the results into a
//! single tree using the paths the game itself sees.

pub mod decoder;
pub mod error;
pub mod mapping;
pub mod merge;
pub mod pakfile;
pub mod paths;
pub mod settings;

pub use decoder::Decoder;
pub use error::{PakError, Result};
pub use mapping::{PakMapping, PathNormalizer};
pub use merge::{MergeConfig, MergeReport, PakMerger, PruneRules};
pub use pakfile::{discover_pakfiles, sort_pakfiles, Pakfile, PatchLevel};
pub use settings::Settings;
