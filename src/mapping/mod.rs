//! Translation of pak-internal entry paths into in-game paths.
//!
//! The decoder reports each entry as a raw path relative to the pakfile's
//! mount point. The in-game location is found by:
//!
//! 1. prefixing the mount point
//! 2. flattening `<root>/Plugins/<rest>` down to `<rest>`
//! 3. collapsing `.../<root>/Content/<rest>` to `<root>/<rest>`, renaming a
//!    couple of content roots along the way (`OakGame` is really `Game`)
//! 4. applying the hardcoded case fixes, in order
//!
//! Nothing here touches the filesystem.

pub mod case_fix;

pub use case_fix::{CaseFixRule, CaseFixRules, CaseFixSpec, FixScope, DEFAULT_CASE_FIXES};

use regex::Regex;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Prefix the decoder puts in front of mount points relative to its own binary.
pub const MOUNT_UPLEVEL_PREFIX: &str = "../../../";

/// Content roots which show up in-game under a different name.
/// There's no way to derive these from the pakfiles themselves.
pub const CONTENT_ROOT_OVERRIDES: &[(&str, &str)] = &[("OakGame", "Game"), ("Wwise", "WwiseEditor")];

fn plugins_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/?(?P<root>\w+)/Plugins/(?P<rest>.*)$").unwrap())
}

fn content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:.*/)?(?P<root>\w+)/Content/(?P<rest>.*)$").unwrap())
}

/// A mount point as announced by the decoder, with the up-level prefix removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPoint(String);

impl MountPoint {
    pub fn parse(announced: &str) -> Self {
        if let Some(stripped) = announced.strip_prefix(MOUNT_UPLEVEL_PREFIX) {
            MountPoint(stripped.to_string())
        } else if announced == "/" {
            // Only seen on pakfiles without any real content
            MountPoint(String::new())
        } else {
            MountPoint(announced.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Converts raw pak entries into canonical forward-slash paths.
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    case_fixes: CaseFixRules,
}

impl PathNormalizer {
    pub fn new(case_fixes: CaseFixRules) -> Self {
        Self { case_fixes }
    }

    pub fn case_fixes(&self) -> &CaseFixRules {
        &self.case_fixes
    }

    pub fn normalize(&self, mount_point: &str, raw_path: &str) -> String {
        let mut path = format!("{}{}", mount_point, raw_path);

        let flattened = plugins_re()
            .captures(&path)
            .map(|caps| caps["rest"].to_string());
        if let Some(rest) = flattened {
            path = rest;
        }

        let collapsed = content_re().captures(&path).map(|caps| {
            format!("{}/{}", content_root_override(&caps["root"]), &caps["rest"])
        });
        if let Some(collapsed) = collapsed {
            path = collapsed;
        }

        self.case_fixes.apply(path)
    }
}

fn content_root_override(root: &str) -> &str {
    CONTENT_ROOT_OVERRIDES
        .iter()
        .find(|(from, _)| *from == root)
        .map(|(_, to)| *to)
        .unwrap_or(root)
}

/// Raw entry path (exactly as the decoder reports it) → canonical path.
///
/// Built once from the listing pass; extraction only checks against it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PakMapping {
    entries: BTreeMap<String, String>,
}

impl PakMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, raw: String, canonical: String) {
        self.entries.insert(raw, canonical);
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(raw).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(raw, canonical)| (raw.as_str(), canonical.as_str()))
    }

    pub fn raw_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for PakMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PakMapping {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(mount: &str, raw: &str) -> String {
        PathNormalizer::default().normalize(mount, raw)
    }

    #[test]
    fn test_mount_point_parse() {
        assert_eq!(MountPoint::parse("../../../OakGame/Content/").as_str(), "OakGame/Content/");
        assert_eq!(MountPoint::parse("/").as_str(), "");
        assert_eq!(MountPoint::parse("/Game/").as_str(), "/Game/");
        // Only stripped once, and only as a prefix
        assert_eq!(MountPoint::parse("../../../../x/").as_str(), "../x/");
        assert_eq!(MountPoint::parse("a/../../../b/").as_str(), "a/../../../b/");
    }

    #[test]
    fn test_passthrough_is_stable() {
        let first = normalize("/Game/", "Foo/Bar.uasset");
        let second = normalize("/Game/", "Foo/Bar.uasset");
        assert_eq!(first, "/Game/Foo/Bar.uasset");
        assert_eq!(first, second);
    }

    #[test]
    fn test_plugins_flattened() {
        assert_eq!(normalize("/SomePlugin/Plugins/", "Data/Thing.uasset"), "Data/Thing.uasset");
        assert_eq!(normalize("SomePlugin/Plugins/", "Data/Thing.uasset"), "Data/Thing.uasset");
        // Plugins not at the top stay where they are
        assert_eq!(
            normalize("Deep/Nested/Plugins/", "Data/Thing.uasset"),
            "Deep/Nested/Plugins/Data/Thing.uasset"
        );
    }

    #[test]
    fn test_content_root_renamed() {
        assert_eq!(
            normalize("OakGame/Content/", "Maps/Sanctuary3/Sanctuary3_P.umap"),
            "Game/Maps/Sanctuary3/Sanctuary3_P.umap"
        );
        assert_eq!(
            normalize("../Engine/Wwise/Content/", "Audio/Bank.uasset"),
            "WwiseEditor/Audio/Bank.uasset"
        );
        assert_eq!(
            normalize("OakGame/AdditionalContent/Hibiscus/Content/", "Maps/Lodge.umap"),
            "Hibiscus/Maps/Lodge.umap"
        );
    }

    #[test]
    fn test_content_uses_last_content_segment() {
        assert_eq!(
            normalize("OakGame/Content/", "Sub/Content/Thing.uasset"),
            "Sub/Thing.uasset"
        );
    }

    #[test]
    fn test_plugin_then_content() {
        assert_eq!(
            normalize("OakGame/Plugins/", "Wwise/Content/Banks/Init.uasset"),
            "WwiseEditor/Banks/Init.uasset"
        );
    }

    #[test]
    fn test_mount_plus_case_fix() {
        let mount = MountPoint::parse("../../../OakGame/AdditionalContent/Dandelion/Content/");
        assert_eq!(
            normalize(mount.as_str(), "Maps/TrashTown/TrashTown_P.umap"),
            "Dandelion/Maps/Trashtown/Trashtown_P.umap"
        );

        let mount = MountPoint::parse("../../../OakGame/Content/");
        assert_eq!(
            normalize(mount.as_str(), "PatchDLC/eventvday/Gear/Thing.uasset"),
            "Game/PatchDLC/EventVDay/Gear/Thing.uasset"
        );
    }

    #[test]
    fn test_custom_rules() {
        let normalizer = PathNormalizer::new(CaseFixRules::new(vec![CaseFixRule::directory(
            "Game",
            "maps",
            "Maps",
        )]));
        assert_eq!(normalizer.normalize("OakGame/Content/", "maps/A.umap"), "Game/Maps/A.umap");
        assert_eq!(normalizer.case_fixes().len(), 1);

        let bare = PathNormalizer::new(CaseFixRules::empty());
        assert_eq!(
            bare.normalize("OakGame/Content/", "PatchDLC/event2/A.umap"),
            "Game/PatchDLC/event2/A.umap"
        );
    }

    #[test]
    fn test_mapping() {
        let mut mapping = PakMapping::new();
        assert!(mapping.is_empty());
        mapping.insert("Maps/A.umap".to_string(), "Game/Maps/A.umap".to_string());
        mapping.insert("Maps/B.umap".to_string(), "Game/Maps/B.umap".to_string());
        assert_eq!(mapping.len(), 2);
        assert!(mapping.contains("Maps/A.umap"));
        assert!(!mapping.contains("Game/Maps/A.umap"));
        assert_eq!(mapping.get("Maps/B.umap"), Some("Game/Maps/B.umap"));
        assert_eq!(mapping.raw_paths().collect::<Vec<_>>(), vec!["Maps/A.umap", "Maps/B.umap"]);
    }
}
