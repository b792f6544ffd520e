//! # Match Keys & Metadata Scorer
//!
//! Builds the lookup keys stored in a [`DevicePathMap`](crate::scan::DevicePathMap)
//! and scores device paths against a library track when a filename alone is
//! ambiguous.
//!
//! ## Keys
//!
//! Legacy keys have the shape `{lowercased filename}|{size}|{mtime}` with absent
//! fields omitted. Lookups must probe the candidates in the order returned by
//! [`build_device_match_candidates`] so that maps written by older versions,
//! which used different field combinations, keep resolving.
//!
//! ## Scoring
//!
//! `score = 0.6 * path_overlap + 0.4 * metadata`, where `path_overlap` is the
//! share of device path segments also present in the library path, and
//! `metadata` adds 0.4 for the artist, 0.4 for the album and 0.2 for the title
//! appearing in the device path.

use crate::path::{normalize_device_path, segments};
use core_library::TrackLookup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const PATH_WEIGHT: f64 = 0.6;
const METADATA_WEIGHT: f64 = 0.4;
const ARTIST_SCORE: f64 = 0.4;
const ALBUM_SCORE: f64 = 0.4;
const TITLE_SCORE: f64 = 0.2;
const ACCEPT_THRESHOLD: f64 = 0.2;

static LEADING_TRACK_NUMBER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*\d{1,3}[\s._-]+").ok());
static NON_WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\W+").ok());

/// `{lowercased filename}|{size}|{mtime}` with absent fields omitted
pub fn build_device_match_key(filename: &str, size: Option<u64>, mtime: Option<i64>) -> String {
    let mut key = filename.to_lowercase();
    if let Some(size) = size {
        key.push('|');
        key.push_str(&size.to_string());
    }
    if let Some(mtime) = mtime {
        key.push('|');
        key.push_str(&mtime.to_string());
    }
    key
}

/// Legacy keys in probe order: `name|size`, `name`, `name|size|mtime`.
///
/// Duplicates (when size or mtime is absent) are removed keeping the first.
pub fn build_device_match_candidates(
    filename: &str,
    size: Option<u64>,
    mtime: Option<i64>,
) -> Vec<String> {
    let ordered = [
        build_device_match_key(filename, size, None),
        build_device_match_key(filename, None, None),
        build_device_match_key(filename, size, mtime),
    ];

    let mut out: Vec<String> = Vec::with_capacity(ordered.len());
    for key in ordered {
        if !out.contains(&key) {
            out.push(key);
        }
    }
    out
}

/// Fuzzy filename used for bucket lookups.
///
/// `"01 - Song (Live).MP3"` and `"song live.flac"` both become `"song live"`.
pub fn normalize_filename_for_match(filename: &str) -> String {
    let normalized = normalize_device_path(filename);
    let base = normalized.rsplit('/').next().unwrap_or(&normalized);
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };

    let mut name = stem.to_lowercase();
    if let Some(re) = LEADING_TRACK_NUMBER.as_ref() {
        name = re.replace(&name, "").into_owned();
    }
    name.retain(|c| !matches!(c, '(' | ')' | '[' | ']' | '{' | '}'));
    if let Some(re) = NON_WORD.as_ref() {
        name = re.replace_all(&name, " ").into_owned();
    }
    name.trim().to_string()
}

/// Score breakdown for one candidate path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathScore {
    pub path: f64,
    pub metadata: f64,
}

impl PathScore {
    pub fn total(&self) -> f64 {
        PATH_WEIGHT * self.path + METADATA_WEIGHT * self.metadata
    }

    pub fn is_acceptable(&self) -> bool {
        self.path >= ACCEPT_THRESHOLD || self.metadata >= ACCEPT_THRESHOLD
    }
}

/// Score a device path against a library track
pub fn score_device_path(lookup: &TrackLookup, device_path: &str) -> PathScore {
    let device_lower = normalize_device_path(device_path).to_lowercase();

    let path = match lookup.relative_path() {
        Some(library_path) => {
            let library_lower = normalize_device_path(library_path).to_lowercase();
            let library_count = segments(&library_lower).count();
            let library_segments: HashSet<&str> = segments(&library_lower).collect();
            let device_segments: Vec<&str> = segments(&device_lower).collect();
            let denominator = device_segments.len().max(library_count);
            if denominator == 0 {
                0.0
            } else {
                let shared = device_segments
                    .iter()
                    .filter(|s| library_segments.contains(*s))
                    .count();
                shared as f64 / denominator as f64
            }
        }
        None => 0.0,
    };

    let haystack = fold(&device_lower);
    let tags = &lookup.track.tags;
    let mut metadata = 0.0;
    if contains_tag(&haystack, tags.artist.as_deref()) {
        metadata += ARTIST_SCORE;
    }
    if contains_tag(&haystack, tags.album.as_deref()) {
        metadata += ALBUM_SCORE;
    }
    if contains_tag(&haystack, tags.title.as_deref()) {
        metadata += TITLE_SCORE;
    }

    PathScore { path, metadata }
}

/// True when the track's title appears in the device path
pub fn title_in_path(lookup: &TrackLookup, device_path: &str) -> bool {
    let haystack = fold(&normalize_device_path(device_path).to_lowercase());
    contains_tag(&haystack, lookup.track.tags.title.as_deref())
}

/// Pick the best of several device paths sharing a filename bucket.
///
/// The highest total score wins, ties keep the earlier candidate. When even the
/// winner is below both thresholds the first candidate is returned, so a result
/// is always produced for a non-empty list. Returns `None` only for an empty
/// list.
pub fn pick_best_device_path(lookup: &TrackLookup, candidates: &[String]) -> Option<String> {
    match best_scored(lookup, candidates) {
        Some((best, score)) if score.is_acceptable() => Some(best.clone()),
        Some(_) => candidates.first().cloned(),
        None => None,
    }
}

/// Like [`pick_best_device_path`] but without the first-candidate fallback.
///
/// Used when scoring every scanned path, where falling back would match any
/// track to an arbitrary file. The winner must pass the thresholds and contain
/// the track title.
pub fn pick_confident_device_path(lookup: &TrackLookup, candidates: &[String]) -> Option<String> {
    match best_scored(lookup, candidates) {
        Some((best, score)) if score.is_acceptable() && title_in_path(lookup, best) => {
            Some(best.clone())
        }
        _ => None,
    }
}

fn best_scored<'a>(lookup: &TrackLookup, candidates: &'a [String]) -> Option<(&'a String, PathScore)> {
    let mut best: Option<(&String, PathScore)> = None;
    for candidate in candidates {
        let score = score_device_path(lookup, candidate);
        let better = match &best {
            Some((_, current)) => score.total() > current.total(),
            None => true,
        };
        if better {
            best = Some((candidate, score));
        }
    }
    best
}

fn contains_tag(haystack: &str, tag: Option<&str>) -> bool {
    match tag.map(|t| fold(&t.to_lowercase())) {
        Some(needle) if !needle.is_empty() => haystack.contains(&needle),
        _ => false,
    }
}

/// Lowercased text with every run of non-alphanumerics turned into one space
fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}
