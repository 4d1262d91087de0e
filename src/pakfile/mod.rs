//! Pakfile classification and merge ordering.
//!
//! The game loads everything at one patch level first, sorted purely by
//! (case-insensitive) filename, and then walks up the patch levels. The
//! content group number only matters insofar as it is part of the
//! filename text. Directory components are ignored because pakfiles are
//! often processed from somewhere other than the game's own install dirs.
//!
//! Add-on pakfiles don't carry a patch number of their own. They get
//! "virtual" fractional levels so they are merged one by one, in release
//! order, after the base paks and before any patch paks.

mod patterns;

pub use patterns::{AddOn, ADDONS, ADDON_GROUP_STEP, AUDIO_ONLY_GROUPS};

use crate::error::{IoContext, PakError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Patch level of a pakfile, stored in tenths so add-on levels compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchLevel(i64);

impl PatchLevel {
    /// Level of pakfiles without any patch suffix.
    pub const BASE: PatchLevel = PatchLevel(-10);

    pub fn patch(number: u32) -> Self {
        PatchLevel(i64::from(number) * 10)
    }

    pub fn from_tenths(tenths: i64) -> Self {
        PatchLevel(tenths)
    }

    pub fn tenths(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PatchLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if abs % 10 == 0 {
            write!(f, "{}{}", sign, abs / 10)
        } else {
            write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
        }
    }
}

/// One input pakfile, with the keys needed to place it in merge order.
#[derive(Debug, Clone)]
pub struct Pakfile {
    path: PathBuf,
    sort_name: String,
    group: u32,
    optional: bool,
    addon: Option<&'static str>,
    patch: PatchLevel,
    size_bytes: u64,
}

impl Pakfile {
    /// Classify a pakfile by name, with a size already known to the caller.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Result<Self> {
        let path = path.into();
        let full = path.to_string_lossy().into_owned();
        // Either separator may show up, regardless of host OS
        let filename = full.rsplit(['/', '\\']).next().unwrap_or(&full);

        if let Some(caps) = patterns::main_pak_re().captures(filename) {
            let group = caps["group"]
                .parse::<u32>()
                .map_err(|_| PakError::UnknownArchiveName(full.clone()))?;
            let patch = match caps.name("patch") {
                Some(m) => PatchLevel::patch(
                    m.as_str()
                        .parse()
                        .map_err(|_| PakError::UnknownArchiveName(full.clone()))?,
                ),
                None => PatchLevel::BASE,
            };
            return Ok(Self {
                sort_name: filename.to_lowercase(),
                group,
                optional: caps.name("optional").is_some(),
                addon: None,
                patch,
                size_bytes,
                path,
            });
        }

        if let Some(caps) = patterns::addon_pak_re().captures(filename) {
            let (index, addon) = patterns::find_addon(&caps["addon"])
                .ok_or_else(|| PakError::UnknownArchiveName(full.clone()))?;
            let patch = match caps.name("patch") {
                Some(m) => PatchLevel::patch(
                    m.as_str()
                        .parse()
                        .map_err(|_| PakError::UnknownArchiveName(full.clone()))?,
                ),
                None => PatchLevel::from_tenths(addon.virtual_patch_tenths),
            };
            return Ok(Self {
                sort_name: filename.to_lowercase(),
                group: ADDON_GROUP_STEP * (index as u32 + 1),
                optional: false,
                addon: Some(addon.codename),
                patch,
                size_bytes,
                path,
            });
        }

        Err(PakError::UnknownArchiveName(full))
    }

    /// Classify a pakfile on disk, reading its size (following symlinks).
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let size = fs::metadata(&path).at(&path)?.len();
        Self::new(path, size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bare filename, case-folded. Used for ordering within a patch level.
    pub fn sort_name(&self) -> &str {
        &self.sort_name
    }

    pub fn group(&self) -> u32 {
        self.group
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Add-on codename, if this isn't a main-game pakfile.
    pub fn addon(&self) -> Option<&'static str> {
        self.addon
    }

    pub fn patch(&self) -> PatchLevel {
        self.patch
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns true if this pakfile is known to only contain `.wem` audio.
    pub fn is_audio_only(&self) -> bool {
        self.addon.is_none() && patterns::is_audio_group(self.group)
    }
}

impl PartialEq for Pakfile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pakfile {}

impl PartialOrd for Pakfile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pakfile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.patch
            .cmp(&other.patch)
            .then_with(|| self.sort_name.cmp(&other.sort_name))
    }
}

impl fmt::Display for Pakfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Sort pakfiles into the order they have to be merged in.
pub fn sort_pakfiles(pakfiles: &mut [Pakfile]) {
    pakfiles.sort();
}

/// Collect pakfiles from a mix of directories and individual `.pak` paths.
///
/// Directories are not searched recursively. Any non-directory path which
/// doesn't end in `.pak` is rejected rather than skipped.
pub fn discover_pakfiles<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Pakfile>> {
    let mut found = Vec::new();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for entry in fs::read_dir(path).at(path)? {
                let entry = entry.at(path)?;
                let name = entry.file_name();
                if name.to_string_lossy().ends_with(".pak") {
                    found.push(Pakfile::from_path(entry.path())?);
                }
            }
        } else if path.to_string_lossy().ends_with(".pak") {
            found.push(Pakfile::from_path(path)?);
        } else {
            return Err(PakError::NotAPakfile(path.to_path_buf()));
        }
    }

    if found.is_empty() {
        return Err(PakError::NoPakfiles);
    }

    debug!("Discovered {} pakfiles", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pak(name: &str) -> Pakfile {
        Pakfile::new(name, 0).unwrap()
    }

    #[test]
    fn test_classify_main_paks() {
        let base = pak("pakchunk5-WindowsNoEditor.pak");
        assert_eq!(base.group(), 5);
        assert_eq!(base.patch(), PatchLevel::BASE);
        assert!(!base.is_optional());
        assert_eq!(base.addon(), None);

        let patched = pak("pakchunk21optional-WindowsNoEditor_7_P.pak");
        assert_eq!(patched.group(), 21);
        assert!(patched.is_optional());
        assert_eq!(patched.patch(), PatchLevel::patch(7));
    }

    #[test]
    fn test_classify_addons() {
        let dandelion = pak("Dandelion.pak");
        assert_eq!(dandelion.addon(), Some("Dandelion"));
        assert_eq!(dandelion.group(), 1000);
        assert_eq!(dandelion.patch(), PatchLevel::from_tenths(-9));

        let ixora2 = pak("Ixora2.pak");
        assert_eq!(ixora2.addon(), Some("Ixora2"));
        assert_eq!(ixora2.group(), 6000);
        assert_eq!(ixora2.patch(), PatchLevel::from_tenths(-4));

        let hibiscus_patch = pak("Hibiscus_2_P.pak");
        assert_eq!(hibiscus_patch.patch(), PatchLevel::patch(2));
    }

    #[test]
    fn test_unknown_names_fail() {
        for name in [
            "pakchunk1-WindowsEditor.pak",
            "Daffodil.pak",
            "random.pak",
            "pakchunk1-WindowsNoEditor.pak.old",
        ] {
            match Pakfile::new(name, 0) {
                Err(PakError::UnknownArchiveName(n)) => assert_eq!(n, name),
                other => panic!("expected UnknownArchiveName for {}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_directory_is_ignored() {
        let unix = pak("/games/bl3/OakGame/Content/Paks/pakchunk3-WindowsNoEditor.pak");
        let windows = pak(r"C:\Games\BL3\Paks\pakchunk3-WindowsNoEditor.pak");
        assert_eq!(unix.sort_name(), "pakchunk3-windowsnoeditor.pak");
        assert_eq!(windows.sort_name(), unix.sort_name());
        assert_eq!(unix.cmp(&windows), Ordering::Equal);
    }

    #[test]
    fn test_same_patch_sorts_lexicographically() {
        let two = pak("pakchunk2-WindowsNoEditor.pak");
        let ten = pak("pakchunk10-WindowsNoEditor.pak");
        assert!(ten < two);

        let two_p = pak("pakchunk2-WindowsNoEditor_4_P.pak");
        let ten_p = pak("pakchunk10-WindowsNoEditor_4_P.pak");
        assert!(ten_p < two_p);
    }

    #[test]
    fn test_patch_level_wins_over_name() {
        let early = pak("pakchunk99-WindowsNoEditor_0_P.pak");
        let late = pak("pakchunk0-WindowsNoEditor_1_P.pak");
        let base = pak("pakchunk99-WindowsNoEditor.pak");
        assert!(base < early);
        assert!(early < late);
    }

    #[test]
    fn test_addons_between_base_and_patches() {
        let mut paks: Vec<Pakfile> = [
            "pakchunk0-WindowsNoEditor_0_P.pak",
            "Ixora2.pak",
            "Alisma.pak",
            "pakchunk80-WindowsNoEditor.pak",
            "Dandelion.pak",
            "Ixora.pak",
            "Geranium.pak",
            "Hibiscus.pak",
            "pakchunk0-WindowsNoEditor.pak",
        ]
        .iter()
        .map(|n| pak(n))
        .collect();
        sort_pakfiles(&mut paks);

        let names: Vec<&str> = paks.iter().map(|p| p.sort_name()).collect();
        assert_eq!(
            names,
            vec![
                "pakchunk0-windowsnoeditor.pak",
                "pakchunk80-windowsnoeditor.pak",
                "dandelion.pak",
                "hibiscus.pak",
                "geranium.pak",
                "alisma.pak",
                "ixora.pak",
                "ixora2.pak",
                "pakchunk0-windowsnoeditor_0_p.pak",
            ]
        );
    }

    #[test]
    fn test_case_insensitive_names() {
        let lower = pak("dir/Alisma.pak");
        let patch = pak("pakchunk1-WindowsNoEditor_0_P.pak");
        assert!(lower < patch);
        assert_eq!(lower.sort_name(), "alisma.pak");
    }

    #[test]
    fn test_strict_total_order() {
        let paks: Vec<Pakfile> = [
            "pakchunk2-WindowsNoEditor.pak",
            "pakchunk10-WindowsNoEditor.pak",
            "pakchunk10optional-WindowsNoEditor.pak",
            "pakchunk2-WindowsNoEditor_1_P.pak",
            "pakchunk3-WindowsNoEditor_0_P.pak",
            "Dandelion.pak",
            "Dandelion_1_P.pak",
            "Ixora2.pak",
        ]
        .iter()
        .map(|n| pak(n))
        .collect();

        for a in &paks {
            for b in &paks {
                let lt = a < b;
                let gt = b < a;
                if a.sort_name() == b.sort_name() {
                    assert!(!lt && !gt);
                } else {
                    assert!(lt ^ gt, "{} vs {}", a, b);
                }
                for c in &paks {
                    if a < b && b < c {
                        assert!(a < c, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_audio_only() {
        assert!(pak("pakchunk2-WindowsNoEditor.pak").is_audio_only());
        assert!(pak("pakchunk87-WindowsNoEditor_3_P.pak").is_audio_only());
        assert!(!pak("pakchunk4-WindowsNoEditor.pak").is_audio_only());
        assert!(!pak("Dandelion.pak").is_audio_only());
    }

    #[test]
    fn test_patch_level_display() {
        assert_eq!(PatchLevel::BASE.to_string(), "-1");
        assert_eq!(PatchLevel::from_tenths(-9).to_string(), "-0.9");
        assert_eq!(PatchLevel::patch(0).to_string(), "0");
        assert_eq!(PatchLevel::patch(12).to_string(), "12");
    }

    #[test]
    fn test_discover_pakfiles() {
        let dir = tempdir().unwrap();
        let paks = dir.path().join("Paks");
        fs::create_dir(&paks).unwrap();
        fs::write(paks.join("pakchunk0-WindowsNoEditor.pak"), b"abc").unwrap();
        fs::write(paks.join("pakchunk1-WindowsNoEditor_0_P.pak"), b"").unwrap();
        fs::write(paks.join("readme.txt"), b"").unwrap();
        let single = dir.path().join("Dandelion.pak");
        fs::write(&single, b"12345").unwrap();

        let mut found = discover_pakfiles(&[paks.clone(), single.clone()]).unwrap();
        sort_pakfiles(&mut found);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0].sort_name(), "pakchunk0-windowsnoeditor.pak");
        assert_eq!(found[0].size_bytes(), 3);
        assert_eq!(found[1].sort_name(), "dandelion.pak");
        assert_eq!(found[1].size_bytes(), 5);

        let txt = paks.join("readme.txt");
        assert!(matches!(
            discover_pakfiles(&[txt]),
            Err(PakError::NotAPakfile(_))
        ));

        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert!(matches!(discover_pakfiles(&[empty]), Err(PakError::NoPakfiles)));
    }

    #[test]
    fn test_discover_rejects_unknown_pak() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mystery.pak"), b"").unwrap();
        assert!(matches!(
            discover_pakfiles(&[dir.path()]),
            Err(PakError::UnknownArchiveName(_))
        ));
    }
}
