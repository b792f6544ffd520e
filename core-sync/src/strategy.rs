//! # Path Strategy Transformer
//!
//! Turns a resolved device path into the exact string written inside a
//! playlist file.
//!
//! ## Strategies
//!
//! - **absolute**: `{prefix}/{path}`. When the profile has no prefix one is
//!   inferred as `/{device name}/{most common top-level folder}`. A path whose
//!   first segment repeats the prefix's last segment is not doubled up.
//! - **relative-to-playlist**: relative to the playlist file's directory.
//!   Leading segments shared with that directory are dropped, then `../`
//!   climbs out of whatever is left of it.
//! - **relative-to-library-root**: the path unchanged. A path containing `..`
//!   is rejected with [`PathStrategyError::EscapesRoot`].
//!
//! Applying a transformation to already-transformed lookups leaves them
//! unchanged for the absolute strategy, which is the one that can be re-applied
//! to its own output.

use crate::path::{
    normalize_device_path, normalize_relative_segments, segments, strip_prefix_ignore_case,
};
use crate::resolver::{DeviceMatch, DevicePathResolver};
use crate::scan::DeviceScanIndex;
use core_library::{DeviceProfile, PathStrategy, TrackLookup};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathStrategyError {
    #[error("Path escapes the library root: {path}")]
    EscapesRoot { path: String },
}

/// Tracks after device resolution
#[derive(Debug, Clone, Default)]
pub struct AppliedLookups {
    /// Lookups to export, with matched ones pointing at their device path
    pub lookups: Vec<TrackLookup>,
    /// Track ids no tier could match
    pub unmatched: Vec<String>,
    /// Matches in the same order as the matched lookups
    pub matches: Vec<DeviceMatch>,
}

/// Replace each lookup's relative path with its resolved device path.
///
/// Unmatched tracks keep their library path unless `only_matched` is set, in
/// which case they are dropped. Lookups without a file index are never matched.
pub fn apply_device_path_map(
    lookups: &[TrackLookup],
    index: &DeviceScanIndex,
    resolver: &DevicePathResolver,
    only_matched: bool,
) -> AppliedLookups {
    let mut applied = AppliedLookups::default();

    for lookup in lookups {
        match resolver.resolve(lookup, index) {
            Some(device_match) => {
                applied
                    .lookups
                    .push(lookup.with_relative_path(device_match.path.clone()));
                applied.matches.push(device_match);
            }
            None => {
                debug!(track_id = %lookup.track_id(), "No device file matched track");
                applied.unmatched.push(lookup.track_id().to_string());
                if !only_matched {
                    applied.lookups.push(lookup.clone());
                }
            }
        }
    }

    applied
}

/// Prefix every lookup's path with `prefix`, skipping ones already prefixed
pub fn apply_absolute_prefix_to_lookups(lookups: &[TrackLookup], prefix: &str) -> Vec<TrackLookup> {
    let prefix = normalize_absolute_prefix(prefix);
    lookups
        .iter()
        .map(|lookup| match lookup.relative_path() {
            Some(path) => lookup.with_relative_path(apply_absolute_prefix(&prefix, path)),
            None => lookup.clone(),
        })
        .collect()
}

/// `/` plus the trimmed segments of `prefix`, without a trailing slash
pub fn normalize_absolute_prefix(prefix: &str) -> String {
    let cleaned = normalize_relative_segments(&normalize_device_path(prefix));
    let trimmed = cleaned.trim_matches('/');
    format!("/{}", trimmed)
}

/// Prefix guess for a device without a configured one.
///
/// `/{device name}` followed by the top-level folder holding the most files.
/// Only paths with at least two segments count; ties go to the folder that
/// sorts first.
pub fn infer_absolute_prefix<'a>(
    device_name: &str,
    paths: impl IntoIterator<Item = &'a str>,
) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for path in paths {
        let normalized = normalize_relative_segments(&normalize_device_path(path));
        let mut segs = segments(&normalized);
        if let (Some(first), Some(_)) = (segs.next(), segs.next()) {
            *counts.entry(first.to_string()).or_default() += 1;
        }
    }

    let mut top: Option<(&String, usize)> = None;
    for (folder, count) in &counts {
        if top.map_or(true, |(_, best)| *count > best) {
            top = Some((folder, *count));
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    let name = device_name.trim().trim_matches('/');
    if !name.is_empty() {
        parts.push(name);
    }
    if let Some((folder, _)) = top {
        parts.push(folder);
    }
    normalize_absolute_prefix(&parts.join("/"))
}

fn apply_absolute_prefix(prefix: &str, path: &str) -> String {
    let normalized = normalize_relative_segments(&normalize_device_path(path));

    if prefix == "/" {
        return format!("/{}", normalized.trim_start_matches('/'));
    }

    if normalized.starts_with('/') {
        if let Some(rest) = strip_prefix_ignore_case(&normalized, prefix) {
            if rest.is_empty() || rest.starts_with('/') {
                return normalized;
            }
        }
    }

    let relative = normalized.trim_start_matches('/');
    let prefix_leaf = prefix.rsplit('/').next().unwrap_or("");
    let mut segs = relative.splitn(2, '/');
    let first = segs.next().unwrap_or("");
    let rest = segs.next();

    match rest {
        Some(rest) if !prefix_leaf.is_empty() && first.eq_ignore_ascii_case(prefix_leaf) => {
            format!("{}/{}", prefix, rest)
        }
        _ if relative.is_empty() => prefix.to_string(),
        _ => format!("{}/{}", prefix, relative),
    }
}

/// Result of transforming a batch of lookups
#[derive(Debug, Clone, Default)]
pub struct TransformedLookups {
    pub lookups: Vec<TrackLookup>,
    /// Track ids whose path climbed out of the library root
    pub escaped: Vec<String>,
}

/// Strategy, playlist folder and prefix for one playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStrategyTransformer {
    strategy: PathStrategy,
    playlist_folder: String,
    absolute_prefix: Option<String>,
}

impl PathStrategyTransformer {
    pub fn new(
        strategy: PathStrategy,
        playlist_folder: &str,
        absolute_prefix: Option<&str>,
    ) -> Self {
        let playlist_folder = normalize_relative_segments(&normalize_device_path(playlist_folder))
            .trim_matches('/')
            .to_string();
        Self {
            strategy,
            playlist_folder,
            absolute_prefix: absolute_prefix
                .filter(|p| !p.trim().is_empty())
                .map(normalize_absolute_prefix),
        }
    }

    /// Transformer for a profile, inferring an absolute prefix from the scan
    /// when the profile has none
    pub fn for_profile(
        profile: &DeviceProfile,
        playlist_folder: &str,
        device_name: &str,
        index: &DeviceScanIndex,
    ) -> Self {
        let prefix = match (profile.path_strategy, profile.absolute_prefix.as_deref()) {
            (PathStrategy::Absolute, None) => Some(infer_absolute_prefix(
                device_name,
                index.all_paths().iter().map(String::as_str),
            )),
            (_, Some(prefix)) => Some(prefix.to_string()),
            _ => None,
        };
        Self::new(profile.path_strategy, playlist_folder, prefix.as_deref())
    }

    pub fn strategy(&self) -> PathStrategy {
        self.strategy
    }

    pub fn playlist_folder(&self) -> &str {
        &self.playlist_folder
    }

    /// Normalized prefix used by the absolute strategy
    pub fn absolute_prefix(&self) -> Option<&str> {
        self.absolute_prefix.as_deref()
    }

    /// Transform one device-relative path
    pub fn transform(&self, path: &str) -> Result<String, PathStrategyError> {
        let cleaned = normalize_device_path(path);

        match self.strategy {
            PathStrategy::Absolute => {
                let prefix = self.absolute_prefix.as_deref().unwrap_or("/");
                Ok(apply_absolute_prefix(prefix, &cleaned))
            }
            PathStrategy::RelativeToPlaylist => Ok(self.relative_to_playlist(&cleaned)),
            PathStrategy::RelativeToLibraryRoot => {
                if segments(&cleaned).any(|s| s == "..") {
                    return Err(PathStrategyError::EscapesRoot {
                        path: path.to_string(),
                    });
                }
                Ok(normalize_relative_segments(&cleaned)
                    .trim_start_matches('/')
                    .to_string())
            }
        }
    }

    fn relative_to_playlist(&self, path: &str) -> String {
        let normalized = normalize_relative_segments(path);
        let target: Vec<&str> = segments(&normalized).collect();
        let base: Vec<&str> = segments(&self.playlist_folder).collect();

        let common = target
            .iter()
            .zip(base.iter())
            .take_while(|(a, b)| a.to_lowercase() == b.to_lowercase())
            .count();

        let mut parts: Vec<&str> = Vec::with_capacity(base.len() - common + target.len() - common);
        parts.extend(std::iter::repeat("..").take(base.len() - common));
        parts.extend_from_slice(&target[common..]);
        parts.join("/")
    }

    /// Transform every lookup with a path.
    ///
    /// Escaping paths are logged; `exclude_escaping` drops them, otherwise they
    /// are kept verbatim.
    pub fn transform_lookups(
        &self,
        lookups: Vec<TrackLookup>,
        exclude_escaping: bool,
    ) -> TransformedLookups {
        let mut out = TransformedLookups::default();

        for lookup in lookups {
            let Some(path) = lookup.relative_path() else {
                out.lookups.push(lookup);
                continue;
            };

            match self.transform(path) {
                Ok(transformed) => out.lookups.push(lookup.with_relative_path(transformed)),
                Err(err) => {
                    warn!(track_id = %lookup.track_id(), error = %err, "Playlist entry leaves the library root");
                    out.escaped.push(lookup.track_id().to_string());
                    if !exclude_escaping {
                        out.lookups.push(lookup);
                    }
                }
            }
        }

        out
    }
}
