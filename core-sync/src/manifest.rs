//! Playlist file naming and the configuration hash stored in sync manifests

use crate::path::join;
use crate::Result;
use core_library::{DeviceSyncManifest, PathStrategy, PlaylistFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Inputs that determine a playlist's on-device content.
///
/// Two syncs with equal inputs write the same file, so a matching hash in the
/// stored manifest means a sync can be skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigHashInput<'a> {
    pub playlist_id: &'a str,
    pub track_ids: &'a [String],
    pub format: PlaylistFormat,
    pub folder: &'a str,
    pub strategy: PathStrategy,
    pub prefix: Option<&'a str>,
}

impl ConfigHashInput<'_> {
    /// Hex-encoded SHA-256 of the JSON encoding
    pub fn hash(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }
}

/// File name stem for a playlist title.
///
/// Lowercase ASCII letters and digits, runs of anything else become one `-`.
/// Falls back to `playlist` when nothing is left.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "playlist".to_string()
    } else {
        slug
    }
}

/// `{folder}/{slug(title)}.{extension}`
pub fn playlist_file_path(folder: &str, title: &str, extension: &str) -> String {
    let file_name = format!("{}.{}", slugify(title), extension.trim_start_matches('.'));
    join(folder, &file_name)
}

/// A playlist file written (or recorded) on a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenPlaylist {
    pub playlist_id: String,
    pub playlist_path: String,
    pub playlist_format: PlaylistFormat,
    pub track_count: usize,
    pub config_hash: String,
}

impl WrittenPlaylist {
    pub fn to_manifest(&self, device_id: &str, synced_at: i64) -> DeviceSyncManifest {
        DeviceSyncManifest {
            id: DeviceSyncManifest::manifest_id(device_id, &self.playlist_id),
            device_id: device_id.to_string(),
            playlist_id: self.playlist_id.clone(),
            playlist_path: self.playlist_path.clone(),
            playlist_format: self.playlist_format,
            track_count: i64::try_from(self.track_count).unwrap_or(i64::MAX),
            config_hash: self.config_hash.clone(),
            synced_at,
        }
    }
}
