//! Hardcoded case-sensitivity fixes.
//!
//! A handful of paths inside the pakfiles differ in case from the paths the
//! game actually references. On a case-insensitive filesystem that doesn't
//! matter, but anyone working with the data on Linux ends up with two
//! sibling directories (or a file nobody can find). Each rule here renames
//! one file basename or one directory segment, anchored to a specific
//! parent directory so nothing outside that directory is touched.
//!
//! Rules run in table order. A file rule and a directory rule may both hit
//! the same path, so a later rule's `from` has to be written against the
//! output of any earlier rule.

use regex::{Captures, Regex};
use std::borrow::Cow;

/// Whether a rule renames a file basename or a directory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixScope {
    /// `<parent>/<from>.<ext>` becomes `<parent>/<to>.<ext>`
    File,
    /// `<parent>/<from>/<rest>` becomes `<parent>/<to>/<rest>`
    Directory,
}

/// Static description of one case-fix rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseFixSpec {
    pub parent: &'static str,
    pub from: &'static str,
    pub to: &'static str,
    pub scope: FixScope,
}

const fn file_fix(parent: &'static str, from: &'static str, to: &'static str) -> CaseFixSpec {
    CaseFixSpec { parent, from, to, scope: FixScope::File }
}

const fn dir_fix(parent: &'static str, from: &'static str, to: &'static str) -> CaseFixSpec {
    CaseFixSpec { parent, from, to, scope: FixScope::Directory }
}

/// Known mismatches, in application order.
pub const DEFAULT_CASE_FIXES: &[CaseFixSpec] = &[
    file_fix("Dandelion/Maps/TrashTown", "TrashTown_P", "Trashtown_P"),
    file_fix("Ixora2/Maps/Mystery/Pandora", "PandoraMystery_P", "PandoraMystery_p"),
    file_fix("Ixora2/Maps/Mystery/Nekro", "NekroMystery_P", "NekroMystery_p"),
    file_fix("Ixora2/Maps/Boss", "SacrificeBoss_P", "SacrificeBoss_p"),
    dir_fix("Dandelion/Maps", "TrashTown", "Trashtown"),
    dir_fix("Game/PatchDLC", "submappatch", "SubmapPatch"),
    dir_fix("Game/PatchDLC", "Vaultcard", "VaultCard"),
    dir_fix("Game/PatchDLC", "event2", "Event2"),
    dir_fix("Game/PatchDLC", "eventvday", "EventVDay"),
];

/// A compiled case-fix rule.
#[derive(Debug, Clone)]
pub struct CaseFixRule {
    parent: String,
    to: String,
    scope: FixScope,
    re_from: Regex,
}

impl CaseFixRule {
    pub fn new(parent: &str, from: &str, to: &str, scope: FixScope) -> Self {
        let re_from = match scope {
            FixScope::File => format!(
                r"^{}/{}\.(?P<ext>\w+)$",
                regex::escape(parent),
                regex::escape(from)
            ),
            FixScope::Directory => format!(
                r"^{}/{}/(?P<remaining>.*)$",
                regex::escape(parent),
                regex::escape(from)
            ),
        };
        Self {
            parent: parent.to_string(),
            to: to.to_string(),
            scope,
            // Only escaped literals go into the pattern
            re_from: Regex::new(&re_from).expect("escaped case-fix pattern"),
        }
    }

    pub fn file(parent: &str, from: &str, to: &str) -> Self {
        Self::new(parent, from, to, FixScope::File)
    }

    pub fn directory(parent: &str, from: &str, to: &str) -> Self {
        Self::new(parent, from, to, FixScope::Directory)
    }

    pub fn scope(&self) -> FixScope {
        self.scope
    }

    pub fn matches(&self, path: &str) -> bool {
        self.re_from.is_match(path)
    }

    /// Rewrite `path` if this rule applies to it.
    pub fn apply<'a>(&self, path: &'a str) -> Cow<'a, str> {
        self.re_from.replace(path, |caps: &Captures| match self.scope {
            FixScope::File => format!("{}/{}.{}", self.parent, self.to, &caps["ext"]),
            FixScope::Directory => {
                format!("{}/{}/{}", self.parent, self.to, &caps["remaining"])
            }
        })
    }
}

impl From<&CaseFixSpec> for CaseFixRule {
    fn from(spec: &CaseFixSpec) -> Self {
        Self::new(spec.parent, spec.from, spec.to, spec.scope)
    }
}

/// Ordered, immutable list of case-fix rules.
#[derive(Debug, Clone)]
pub struct CaseFixRules {
    rules: Vec<CaseFixRule>,
}

impl CaseFixRules {
    pub fn new(rules: Vec<CaseFixRule>) -> Self {
        Self { rules }
    }

    pub fn from_specs(specs: &[CaseFixSpec]) -> Self {
        Self::new(specs.iter().map(CaseFixRule::from).collect())
    }

    /// No rules at all; paths pass through untouched.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Run `path` through every rule, in order.
    pub fn apply(&self, path: String) -> String {
        self.rules.iter().fold(path, |path, rule| {
            let fixed = match rule.apply(&path) {
                Cow::Borrowed(_) => None,
                Cow::Owned(fixed) => Some(fixed),
            };
            fixed.unwrap_or(path)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaseFixRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CaseFixRules {
    fn default() -> Self {
        Self::from_specs(DEFAULT_CASE_FIXES)
    }
}
