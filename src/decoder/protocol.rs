//! Parsing of the decoder's text output.
//!
//! Only three line shapes matter; everything else the decoder prints is
//! ignored:
//!
//! - list mode:    `... Mount point <value>`
//! - list mode:    `... "<raw path>" offset: ...`
//! - extract mode: `... Extracted "<raw path>" to ...`

use crate::error::{IoContext, PakError, Result};
use crate::mapping::{MountPoint, PakMapping, PathNormalizer};
use regex::Regex;
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

fn mount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Mount point (?P<mountpoint>.*)$").unwrap())
}

fn listed_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?P<filename>.*)" offset"#).unwrap())
}

fn extracted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"Extracted "(?P<filename>.*?)" to "#).unwrap())
}

pub fn parse_mount_point(line: &str) -> Option<&str> {
    mount_re()
        .captures(line)
        .and_then(|caps| caps.name("mountpoint"))
        .map(|m| m.as_str())
}

pub fn parse_listed_file(line: &str) -> Option<&str> {
    listed_file_re()
        .captures(line)
        .and_then(|caps| caps.name("filename"))
        .map(|m| m.as_str())
}

pub fn parse_extracted(line: &str) -> Option<&str> {
    extracted_re()
        .captures(line)
        .and_then(|caps| caps.name("filename"))
        .map(|m| m.as_str())
}

/// Call `f` for every line of `reader` as soon as it arrives.
///
/// Output is decoded lossily, and the line terminator (`\n` or `\r\n`) is
/// stripped. `source` is only used for error context.
pub fn for_each_line<R, F>(mut reader: R, source: &Path, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str) -> Result<()>,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).at(source)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        f(line.trim_end_matches(['\r', '\n']))?;
    }
}

/// Build the raw → canonical mapping from list-mode output.
///
/// The current mount point applies to every file line until the next
/// announcement. `on_entry` gets the running entry count.
pub fn parse_listing<R: BufRead>(
    reader: R,
    pak: &Path,
    normalizer: &PathNormalizer,
    mut on_entry: impl FnMut(usize),
) -> Result<PakMapping> {
    let mut mapping = PakMapping::new();
    let mut mount_point: Option<MountPoint> = None;

    for_each_line(reader, pak, |line| {
        if let Some(announced) = parse_mount_point(line) {
            mount_point = Some(MountPoint::parse(announced));
        } else if let Some(raw) = parse_listed_file(line) {
            let mount = mount_point
                .as_ref()
                .ok_or_else(|| PakError::MissingMountPoint(raw.to_string()))?;
            let canonical = normalizer.normalize(mount.as_str(), raw);
            mapping.insert(raw.to_string(), canonical);
            on_entry(mapping.len());
        }
        Ok(())
    })?;

    Ok(mapping)
}

/// Count extract-mode lines, refusing any path not in `expected`.
pub fn scan_extraction<R: BufRead>(
    reader: R,
    pak: &Path,
    expected: Option<&PakMapping>,
    mut on_entry: impl FnMut(usize),
) -> Result<usize> {
    let mut extracted = 0usize;

    for_each_line(reader, pak, |line| {
        if let Some(raw) = parse_extracted(line) {
            if let Some(expected) = expected {
                if !expected.contains(raw) {
                    return Err(PakError::UnexpectedEntry {
                        pak: pak.to_path_buf(),
                        entry: raw.to_string(),
                    });
                }
            }
            extracted += 1;
            on_entry(extracted);
        }
        Ok(())
    })?;

    Ok(extracted)
}

/// The extracted count has to match the mapping exactly, when there is one.
pub fn check_extracted_count(pak: &Path, expected: Option<&PakMapping>, found: usize) -> Result<()> {
    match expected {
        Some(expected) if expected.len() != found => Err(PakError::IncompleteExtraction {
            pak: pak.to_path_buf(),
            expected: expected.len(),
            found,
        }),
        _ => Ok(()),
    }
}
