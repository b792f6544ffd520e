//! # Device Scan Index
//!
//! Per-session lookup structures built from the device listing. The index is
//! created once at the start of a sync or validation and passed by reference
//! through the call graph; nothing here is global.

use crate::matching::{build_device_match_candidates, normalize_filename_for_match};
use crate::path::{normalize_device_path, normalize_relative_segments};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One file found on the device during the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceScanEntry {
    pub name: String,
    /// Path relative to the device root
    pub relative_path: String,
    pub size: Option<u64>,
    pub mtime: Option<i64>,
    pub content_hash: Option<String>,
}

impl DeviceScanEntry {
    pub fn new(relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        let name = relative_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        Self {
            name,
            relative_path,
            size: None,
            mtime: None,
            content_hash: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_mtime(mut self, mtime: i64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    fn normalized_path(&self) -> String {
        normalize_relative_segments(&normalize_device_path(&self.relative_path))
            .trim_start_matches('/')
            .to_string()
    }
}

/// Match key to a single device-relative path.
///
/// Keys are content hashes and the legacy filename keys. When two entries
/// produce the same key the first one inserted keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevicePathMap {
    entries: HashMap<String, String>,
}

impl DevicePathMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already taken. Returns whether it was inserted.
    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<String>) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry(key.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(path.into());
                true
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct paths held by the map, sorted
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.entries.values().map(String::as_str).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Everything the resolver needs about one device listing
#[derive(Debug, Clone, Default)]
pub struct DeviceScanIndex {
    path_map: DevicePathMap,
    filename_buckets: BTreeMap<String, Vec<String>>,
    all_paths: Vec<String>,
}

impl DeviceScanIndex {
    /// Index a listing. A path listed twice keeps its first position.
    pub fn build(entries: &[DeviceScanEntry]) -> Self {
        let mut index = DeviceScanIndex::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(entries.len());

        for entry in entries {
            let path = entry.normalized_path();
            if path.is_empty() {
                continue;
            }

            if let Some(hash) = entry.content_hash.as_deref().filter(|h| !h.is_empty()) {
                index.path_map.insert(hash, path.clone());
            }
            for key in build_device_match_candidates(&entry.name, entry.size, entry.mtime) {
                index.path_map.insert(key, path.clone());
            }

            if !seen.insert(path.clone()) {
                continue;
            }

            let bucket = normalize_filename_for_match(&entry.name);
            if !bucket.is_empty() {
                index
                    .filename_buckets
                    .entry(bucket)
                    .or_default()
                    .push(path.clone());
            }
            index.all_paths.push(path);
        }

        index
    }

    pub fn path_map(&self) -> &DevicePathMap {
        &self.path_map
    }

    pub fn filename_buckets(&self) -> &BTreeMap<String, Vec<String>> {
        &self.filename_buckets
    }

    /// Every scanned path in listing order
    pub fn all_paths(&self) -> &[String] {
        &self.all_paths
    }

    pub fn is_empty(&self) -> bool {
        self.all_paths.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_from_path() {
        let entry = DeviceScanEntry::new("MUSIC\\Artist\\01 Song.mp3");
        assert_eq!(entry.name, "01 Song.mp3");
    }

    #[test]
    fn test_path_map_first_insert_wins() {
        let mut map = DevicePathMap::new();
        assert!(map.insert("k", "a.mp3"));
        assert!(!map.insert("k", "b.mp3"));
        assert_eq!(map.get("k"), Some("a.mp3"));
    }

    #[test]
    fn test_build_index() {
        let entries = vec![
            DeviceScanEntry::new("MUSIC/A/01 - Song.mp3")
                .with_size(100)
                .with_content_hash("h1"),
            DeviceScanEntry::new("/MUSIC//B/Song.mp3").with_size(200),
            DeviceScanEntry::new("MUSIC/C/Other.mp3"),
        ];
        let index = DeviceScanIndex::build(&entries);

        assert_eq!(index.path_map().get("h1"), Some("MUSIC/A/01 - Song.mp3"));
        assert_eq!(index.path_map().get("song.mp3|200"), Some("MUSIC/B/Song.mp3"));
        assert_eq!(index.path_map().get("other.mp3"), Some("MUSIC/C/Other.mp3"));
        assert_eq!(
            index.filename_buckets().get("song"),
            Some(&vec![
                "MUSIC/A/01 - Song.mp3".to_string(),
                "MUSIC/B/Song.mp3".to_string()
            ])
        );
        assert_eq!(
            index.all_paths(),
            &[
                "MUSIC/A/01 - Song.mp3".to_string(),
                "MUSIC/B/Song.mp3".to_string(),
                "MUSIC/C/Other.mp3".to_string()
            ]
        );
    }

    #[test]
    fn test_build_index_drops_repeated_paths() {
        let entries = vec![
            DeviceScanEntry::new("MUSIC/A/Song.mp3").with_size(1),
            DeviceScanEntry::new("MUSIC/B/Other.mp3"),
            DeviceScanEntry::new("music/../MUSIC/A/Song.mp3").with_content_hash("h2"),
        ];
        let index = DeviceScanIndex::build(&entries);

        assert_eq!(index.all_paths().len(), 2);
        assert_eq!(index.all_paths()[0], "MUSIC/A/Song.mp3");
        assert_eq!(index.filename_buckets().get("song").map(Vec::len), Some(1));
        assert_eq!(index.path_map().get("h2"), Some("MUSIC/A/Song.mp3"));
    }

    #[test]
    fn test_build_index_large_listing() {
        let entry = |i: usize| DeviceScanEntry::new(format!("MUSIC/Artist {}/Track {}.mp3", i % 500, i));
        let entries: Vec<DeviceScanEntry> = (0..50_000).chain(0..1_000).map(entry).collect();
        let index = DeviceScanIndex::build(&entries);

        assert_eq!(index.all_paths().len(), 50_000);
        assert_eq!(index.all_paths()[49_999], "MUSIC/Artist 499/Track 49999.mp3");
    }

    #[test]
    fn test_build_index_skips_empty_paths() {
        let index = DeviceScanIndex::build(&[DeviceScanEntry::new("./")]);
        assert!(index.is_empty());
        assert!(index.path_map().is_empty());
    }
}
