//! # Device Path Resolver
//!
//! Maps one library track to one device path by trying an ordered list of
//! match tiers. The first tier that produces a path wins.
//!
//! ## Default tiers
//!
//! 1. Full content hash
//! 2. Partial (head) content hash
//! 3. Fuzzy filename bucket, disambiguated by the scorer
//! 4. Metadata scoring over every scanned path
//! 5. Legacy `name|size|mtime` keys
//!
//! Hash tiers come first because they cannot be fooled by renames. Filename
//! tiers run from most to least reliable.
//!
//! A miss is `None`, never an error; callers decide what an unmatched track
//! means for them.

use crate::matching::{
    build_device_match_candidates, normalize_filename_for_match, pick_best_device_path,
    pick_confident_device_path,
};
use crate::scan::{DevicePathMap, DeviceScanIndex};
use core_library::{FileIndexEntry, TrackLookup};
use core_runtime::logging::strip_path;
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Optional indexes consulted by the filename and metadata tiers
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions<'a> {
    pub normalized_filename_to_paths: Option<&'a BTreeMap<String, Vec<String>>>,
    pub metadata_candidate_paths: Option<&'a [String]>,
}

impl<'a> ResolveOptions<'a> {
    /// Options backed by every index of a scan
    pub fn from_index(index: &'a DeviceScanIndex) -> Self {
        Self {
            normalized_filename_to_paths: Some(index.filename_buckets()),
            metadata_candidate_paths: Some(index.all_paths()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTierKind {
    FullContentHash,
    ContentHash,
    FilenameBucket,
    MetadataScan,
    LegacyKey,
    Custom(&'static str),
}

impl MatchTierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTierKind::FullContentHash => "full-content-hash",
            MatchTierKind::ContentHash => "content-hash",
            MatchTierKind::FilenameBucket => "filename-bucket",
            MatchTierKind::MetadataScan => "metadata-scan",
            MatchTierKind::LegacyKey => "legacy-key",
            MatchTierKind::Custom(name) => *name,
        }
    }
}

impl fmt::Display for MatchTierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature shared by every tier
pub type TierFn = fn(&FileIndexEntry, &TrackLookup, &DevicePathMap, &ResolveOptions<'_>) -> Option<String>;

/// One strategy in the resolution chain
#[derive(Clone, Copy)]
pub struct MatchTier {
    pub kind: MatchTierKind,
    pub resolve: TierFn,
}

impl fmt::Debug for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchTier").field("kind", &self.kind).finish()
    }
}

/// A resolved path and the tier that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatch {
    pub path: String,
    pub tier: MatchTierKind,
}

/// Ordered tier chain
#[derive(Debug, Clone)]
pub struct DevicePathResolver {
    tiers: Vec<MatchTier>,
}

impl Default for DevicePathResolver {
    fn default() -> Self {
        Self {
            tiers: vec![
                MatchTier {
                    kind: MatchTierKind::FullContentHash,
                    resolve: full_content_hash_tier,
                },
                MatchTier {
                    kind: MatchTierKind::ContentHash,
                    resolve: content_hash_tier,
                },
                MatchTier {
                    kind: MatchTierKind::FilenameBucket,
                    resolve: filename_bucket_tier,
                },
                MatchTier {
                    kind: MatchTierKind::MetadataScan,
                    resolve: metadata_scan_tier,
                },
                MatchTier {
                    kind: MatchTierKind::LegacyKey,
                    resolve: legacy_key_tier,
                },
            ],
        }
    }
}

impl DevicePathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier after the existing ones
    pub fn with_tier(mut self, tier: MatchTier) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn tiers(&self) -> impl Iterator<Item = MatchTierKind> + '_ {
        self.tiers.iter().map(|t| t.kind)
    }

    /// Resolve against explicit map and options
    pub fn resolve_with(
        &self,
        lookup: &TrackLookup,
        map: &DevicePathMap,
        options: &ResolveOptions<'_>,
    ) -> Option<DeviceMatch> {
        let file_index = lookup.file_index.as_ref()?;

        self.tiers.iter().find_map(|tier| {
            let path = (tier.resolve)(file_index, lookup, map, options)?;
            trace!(
                track_id = %lookup.track_id(),
                tier = %tier.kind,
                file = %strip_path(&path),
                "Resolved device path"
            );
            Some(DeviceMatch {
                path,
                tier: tier.kind,
            })
        })
    }

    /// Resolve against a full scan index
    pub fn resolve(&self, lookup: &TrackLookup, index: &DeviceScanIndex) -> Option<DeviceMatch> {
        self.resolve_with(lookup, index.path_map(), &ResolveOptions::from_index(index))
    }
}

/// Resolve with the default tier chain, returning only the path
pub fn resolve_device_path_match(
    lookup: &TrackLookup,
    map: &DevicePathMap,
    options: &ResolveOptions<'_>,
) -> Option<String> {
    DevicePathResolver::default()
        .resolve_with(lookup, map, options)
        .map(|m| m.path)
}

fn hash_lookup(map: &DevicePathMap, hash: Option<&str>) -> Option<String> {
    let hash = hash.filter(|h| !h.is_empty())?;
    map.get(hash).map(str::to_string)
}

fn full_content_hash_tier(
    file_index: &FileIndexEntry,
    _lookup: &TrackLookup,
    map: &DevicePathMap,
    _options: &ResolveOptions<'_>,
) -> Option<String> {
    hash_lookup(map, file_index.full_content_hash.as_deref())
}

fn content_hash_tier(
    file_index: &FileIndexEntry,
    _lookup: &TrackLookup,
    map: &DevicePathMap,
    _options: &ResolveOptions<'_>,
) -> Option<String> {
    hash_lookup(map, file_index.content_hash.as_deref())
}

fn filename_bucket_tier(
    file_index: &FileIndexEntry,
    lookup: &TrackLookup,
    _map: &DevicePathMap,
    options: &ResolveOptions<'_>,
) -> Option<String> {
    let buckets = options.normalized_filename_to_paths?;
    let key = normalize_filename_for_match(&file_index.name);
    if key.is_empty() {
        return None;
    }
    let candidates = buckets.get(&key)?;
    pick_best_device_path(lookup, candidates)
}

fn metadata_scan_tier(
    _file_index: &FileIndexEntry,
    lookup: &TrackLookup,
    _map: &DevicePathMap,
    options: &ResolveOptions<'_>,
) -> Option<String> {
    let candidates = options.metadata_candidate_paths?;
    pick_confident_device_path(lookup, candidates)
}

fn legacy_key_tier(
    file_index: &FileIndexEntry,
    _lookup: &TrackLookup,
    map: &DevicePathMap,
    _options: &ResolveOptions<'_>,
) -> Option<String> {
    build_device_match_candidates(&file_index.name, Some(file_index.size), Some(file_index.mtime))
        .iter()
        .find_map(|key| map.get(key).map(str::to_string))
}
