//! Filename patterns and lookup tables for pakfile classification.

use regex::Regex;
use std::sync::OnceLock;

/// Main-game pakfiles: `pakchunk<group>[optional]-WindowsNoEditor[_<patch>_P].pak`
pub const MAIN_PAK_PATTERN: &str =
    r"^pakchunk(?P<group>\d+)(?P<optional>optional)?-WindowsNoEditor(?:_(?P<patch>\d+)_P)?\.pak$";

/// An add-on (DLC) content pack, recognised by codename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOn {
    pub codename: &'static str,
    /// Patch level used when the pakfile carries no `_<n>_P` suffix, in
    /// tenths. Always between the base level (-10) and patch 0.
    pub virtual_patch_tenths: i64,
}

/// Add-ons in release order. Position in this list also determines the
/// synthetic content group (`ADDON_GROUP_STEP * (index + 1)`).
pub const ADDONS: &[AddOn] = &[
    AddOn { codename: "Dandelion", virtual_patch_tenths: -9 },
    AddOn { codename: "Hibiscus", virtual_patch_tenths: -8 },
    AddOn { codename: "Geranium", virtual_patch_tenths: -7 },
    AddOn { codename: "Alisma", virtual_patch_tenths: -6 },
    AddOn { codename: "Ixora", virtual_patch_tenths: -5 },
    AddOn { codename: "Ixora2", virtual_patch_tenths: -4 },
];

pub const ADDON_GROUP_STEP: u32 = 1000;

/// Content groups which only ever hold `.wem` audio data.
pub const AUDIO_ONLY_GROUPS: &[u32] = &[2, 3, 85, 86, 87, 88, 89, 90, 91];

pub fn main_pak_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MAIN_PAK_PATTERN).unwrap())
}

/// Add-on pattern, built from the codenames in [`ADDONS`].
pub fn addon_pak_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let names: Vec<String> = ADDONS.iter().map(|a| regex::escape(a.codename)).collect();
        Regex::new(&format!(
            r"^(?P<addon>{})(?:_(?P<patch>\d+)_P)?\.pak$",
            names.join("|")
        ))
        .unwrap()
    })
}

/// Looks up an add-on by codename, returning its release index as well.
pub fn find_addon(codename: &str) -> Option<(usize, &'static AddOn)> {
    ADDONS
        .iter()
        .enumerate()
        .find(|(_, addon)| addon.codename == codename)
}

/// Returns true if the content group only holds audio.
pub fn is_audio_group(group: u32) -> bool {
    AUDIO_ONLY_GROUPS.contains(&group)
}
