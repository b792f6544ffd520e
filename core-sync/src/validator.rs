//! # Playlist-on-Device Validator
//!
//! Reads a playlist file back from the device and checks that every entry
//! still points at an existing file.
//!
//! Entries are mapped back to device-relative paths with the inverse of the
//! path strategy: absolute entries lose their mount prefix, relative entries
//! are resolved against the playlist's own folder (or the device root for
//! library-root playlists). A missing file and any other lookup failure both
//! count as missing. Validation never fails: a playlist that cannot be read
//! is reported through [`ValidationReport::read_error`].

use crate::path::{
    join, match_volume_prefix, normalize_device_path, normalize_relative_segments, parent_dir,
    segments,
};
use bridge_traits::{BridgeError, DeviceDirectory};
use core_library::{PathStrategy, PlaylistFormat};
use core_runtime::logging::strip_path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

static PLS_FILE_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^\s*file\d+\s*=(.*)$").ok());
static XSPF_LOCATION: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)<location>\s*(.*?)\s*</location>").ok());

/// Outcome of validating one playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub total: usize,
    pub missing: usize,
    /// Raw entries that did not resolve, capped at the configured sample size
    pub missing_samples: Vec<String>,
    /// Set when the playlist file itself could not be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing == 0 && self.read_error.is_none()
    }
}

pub struct PlaylistValidator {
    volume_prefixes: Vec<String>,
    max_missing_samples: usize,
}

impl PlaylistValidator {
    /// `volume_prefixes` are the mount prefixes stripped from absolute entries,
    /// usually from [`volume_prefix_candidates`](crate::path::volume_prefix_candidates).
    pub fn new(volume_prefixes: Vec<String>, max_missing_samples: usize) -> Self {
        Self {
            volume_prefixes,
            max_missing_samples,
        }
    }

    pub async fn validate(
        &self,
        directory: &dyn DeviceDirectory,
        playlist_path: &str,
        format: PlaylistFormat,
        strategy: PathStrategy,
    ) -> ValidationReport {
        let bytes = match directory.read_file(playlist_path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %strip_path(playlist_path), error = %err, "Could not read playlist from device");
                return ValidationReport {
                    read_error: Some(err.to_string()),
                    ..Default::default()
                };
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let entries = parse_playlist_entries(&content, format);

        let mut report = ValidationReport {
            total: entries.len(),
            ..Default::default()
        };

        for entry in entries {
            if !self.entry_exists(directory, &entry, playlist_path, strategy).await {
                debug!(entry = %strip_path(&entry), "Playlist entry missing on device");
                report.missing += 1;
                if report.missing_samples.len() < self.max_missing_samples {
                    report.missing_samples.push(entry);
                }
            }
        }

        report
    }

    async fn entry_exists(
        &self,
        directory: &dyn DeviceDirectory,
        entry: &str,
        playlist_path: &str,
        strategy: PathStrategy,
    ) -> bool {
        let mut failure: Option<(String, BridgeError)> = None;

        for device_path in self.resolve_entry_candidates(entry, playlist_path, strategy) {
            match directory.metadata(&device_path).await {
                Ok(_) => return true,
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    failure.get_or_insert((device_path, err));
                }
            }
        }

        if let Some((device_path, err)) = failure {
            warn!(
                path = %strip_path(&device_path),
                error = %err,
                "Could not check playlist entry, counting it as missing"
            );
        }
        false
    }

    /// Device-relative path an entry refers to
    pub fn resolve_entry(&self, entry: &str, playlist_path: &str, strategy: PathStrategy) -> String {
        self.resolve_entry_candidates(entry, playlist_path, strategy)
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Every device-relative path an entry may refer to, most likely first.
    ///
    /// An absolute entry written under a prefix ending in a device folder
    /// (`/WALKMAN/MUSIC`) had that folder folded into the prefix, so the
    /// remainder is also tried beneath the prefix's last segment.
    pub fn resolve_entry_candidates(
        &self,
        entry: &str,
        playlist_path: &str,
        strategy: PathStrategy,
    ) -> Vec<String> {
        let cleaned = normalize_device_path(entry);

        if let Some(absolute) = as_absolute(&cleaned) {
            let Some((prefix, rest)) = match_volume_prefix(&absolute, &self.volume_prefixes) else {
                return vec![normalize_relative_segments(&absolute)
                    .trim_start_matches('/')
                    .to_string()];
            };

            let rest = rest.trim_start_matches('/').to_string();
            let mut candidates = vec![rest.clone()];
            if let Some(leaf) = segments(&prefix).last() {
                let repeats_leaf = segments(&rest)
                    .next()
                    .is_some_and(|first| first.eq_ignore_ascii_case(leaf));
                if !repeats_leaf {
                    candidates.push(join(leaf, &rest));
                }
            }
            return candidates;
        }

        let resolved = match strategy {
            PathStrategy::RelativeToLibraryRoot => join("", &cleaned),
            PathStrategy::RelativeToPlaylist | PathStrategy::Absolute => {
                join(parent_dir(playlist_path), &cleaned)
            }
        };
        vec![resolved]
    }
}

/// `/x` stays as is, `C:/x` loses its drive letter
fn as_absolute(path: &str) -> Option<String> {
    if path.starts_with('/') {
        return Some(path.to_string());
    }

    let mut chars = path.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(drive), Some(':'), Some('/')) if drive.is_ascii_alphabetic() => {
            Some(path[2..].to_string())
        }
        _ => None,
    }
}

/// Entries of a playlist file in file order
pub fn parse_playlist_entries(content: &str, format: PlaylistFormat) -> Vec<String> {
    match format {
        PlaylistFormat::M3u => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        PlaylistFormat::Pls => {
            let Some(re) = PLS_FILE_LINE.as_ref() else {
                return Vec::new();
            };
            content
                .lines()
                .filter_map(|line| re.captures(line))
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect()
        }
        PlaylistFormat::Xspf => {
            let Some(re) = XSPF_LOCATION.as_ref() else {
                return Vec::new();
            };
            re.captures_iter(content)
                .filter_map(|caps| caps.get(1))
                .map(|m| unescape_xml(m.as_str()))
                .filter(|entry| !entry.is_empty())
                .collect()
        }
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
