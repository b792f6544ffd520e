//! Domain models for device sync
//!
//! Library-side inputs (track lookups, playlists) are owned upstream and read
//! only here. Device profiles, sync manifests and track mappings are persisted
//! by this crate's repositories.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// =============================================================================
// Library Inputs
// =============================================================================

/// Tag values used for heuristic matching
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// A track as seen by the library index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryTrack {
    /// Library track identifier (the indexed file id)
    pub track_file_id: String,
    /// Library root the file was indexed under
    pub library_root_id: String,
    pub tags: TrackTags,
}

/// File index record for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIndexEntry {
    /// Path relative to the library root, `/`-separated
    pub relative_path: String,
    /// File name including extension
    pub name: String,
    pub size: u64,
    /// Modification time, Unix milliseconds
    pub mtime: i64,
    /// Hash of the file head (partial content hash)
    pub content_hash: Option<String>,
    /// Hash of the complete file
    pub full_content_hash: Option<String>,
}

/// A library track together with its file index record
///
/// A lookup without `file_index` can never be matched to a device file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackLookup {
    pub track: LibraryTrack,
    pub file_index: Option<FileIndexEntry>,
}

impl TrackLookup {
    pub fn track_id(&self) -> &str {
        &self.track.track_file_id
    }

    pub fn relative_path(&self) -> Option<&str> {
        self.file_index.as_ref().map(|f| f.relative_path.as_str())
    }

    /// Copy of this lookup pointing at a different path
    ///
    /// Lookups without a file index are returned unchanged.
    pub fn with_relative_path(&self, path: impl Into<String>) -> Self {
        let mut lookup = self.clone();
        if let Some(file_index) = lookup.file_index.as_mut() {
            file_index.relative_path = path.into();
        }
        lookup
    }
}

/// Playlist being exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
}

impl Playlist {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }
}

// =============================================================================
// Device Enums
// =============================================================================

/// Family of sync target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Plain USB mass-storage folder
    Usb,
    /// Sony Walkman-style player (mass storage with a MUSIC folder)
    Walkman,
    /// iPod-class player with an on-device database
    Ipod,
    /// Export target that is just a folder, e.g. a companion app share
    Virtual,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Usb => "usb",
            DeviceType::Walkman => "walkman",
            DeviceType::Ipod => "ipod",
            DeviceType::Virtual => "virtual",
        }
    }
}

impl FromStr for DeviceType {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "usb" => Ok(DeviceType::Usb),
            "walkman" => Ok(DeviceType::Walkman),
            "ipod" => Ok(DeviceType::Ipod),
            "virtual" => Ok(DeviceType::Virtual),
            _ => Err(LibraryError::InvalidEnumValue {
                kind: "device_type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Playlist file format written to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistFormat {
    M3u,
    Pls,
    Xspf,
}

impl PlaylistFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistFormat::M3u => "m3u",
            PlaylistFormat::Pls => "pls",
            PlaylistFormat::Xspf => "xspf",
        }
    }

    /// Default file extension, without the dot
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for PlaylistFormat {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "m3u" | "m3u8" => Ok(PlaylistFormat::M3u),
            "pls" => Ok(PlaylistFormat::Pls),
            "xspf" => Ok(PlaylistFormat::Xspf),
            _ => Err(LibraryError::InvalidEnumValue {
                kind: "playlist_format",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Convention for paths written inside a playlist file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// Relative to the directory holding the playlist file
    RelativeToPlaylist,
    /// Relative to the device root (the library root as mirrored on the device)
    RelativeToLibraryRoot,
    /// Absolute, under a mount prefix
    Absolute,
}

impl PathStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathStrategy::RelativeToPlaylist => "relative-to-playlist",
            PathStrategy::RelativeToLibraryRoot => "relative-to-library-root",
            PathStrategy::Absolute => "absolute",
        }
    }
}

impl FromStr for PathStrategy {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relative-to-playlist" => Ok(PathStrategy::RelativeToPlaylist),
            "relative-to-library-root" => Ok(PathStrategy::RelativeToLibraryRoot),
            "absolute" => Ok(PathStrategy::Absolute),
            _ => Err(LibraryError::InvalidEnumValue {
                kind: "path_strategy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for PathStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Persisted Device State
// =============================================================================

/// A registered sync target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Unique identifier
    pub id: String,
    /// User-facing label
    pub name: String,
    pub device_type: DeviceType,
    /// Reference understood by the host's directory handle store
    pub handle_ref: String,
    /// Device-relative folder playlists are written into; empty means the default
    pub playlist_folder: String,
    pub playlist_format: PlaylistFormat,
    pub path_strategy: PathStrategy,
    /// Mount prefix for absolute paths; inferred at sync time when unset
    pub absolute_prefix: Option<String>,
    /// Timestamps
    pub last_sync_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DeviceProfile {
    /// Create a new profile with a fresh id
    pub fn new(name: impl Into<String>, device_type: DeviceType, handle_ref: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            device_type,
            handle_ref: handle_ref.into(),
            playlist_folder: String::new(),
            playlist_format: PlaylistFormat::M3u,
            path_strategy: PathStrategy::RelativeToPlaylist,
            absolute_prefix: None,
            last_sync_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_playlist_folder(mut self, folder: impl Into<String>) -> Self {
        self.playlist_folder = folder.into();
        self
    }

    pub fn with_format(mut self, format: PlaylistFormat) -> Self {
        self.playlist_format = format;
        self
    }

    pub fn with_path_strategy(mut self, strategy: PathStrategy) -> Self {
        self.path_strategy = strategy;
        self
    }

    pub fn with_absolute_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.absolute_prefix = Some(prefix.into());
        self
    }

    /// Validate profile data
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Device name cannot be empty".to_string());
        }

        if self.handle_ref.trim().is_empty() {
            return Err("Device handle reference cannot be empty".to_string());
        }

        if self
            .playlist_folder
            .split(['/', '\\'])
            .any(|segment| segment == "..")
        {
            return Err(format!(
                "Playlist folder must stay inside the device: {}",
                self.playlist_folder
            ));
        }

        if let Some(prefix) = &self.absolute_prefix {
            if prefix.trim().is_empty() {
                return Err("Absolute prefix cannot be blank".to_string());
            }
        }

        Ok(())
    }
}

/// Record of a playlist's last successful sync to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSyncManifest {
    /// `{device_id}-{playlist_id}`
    pub id: String,
    pub device_id: String,
    pub playlist_id: String,
    /// Device-relative path of the written playlist file
    pub playlist_path: String,
    pub playlist_format: PlaylistFormat,
    pub track_count: i64,
    /// Hash over the inputs that determine the playlist's content
    pub config_hash: String,
    pub synced_at: i64,
}

impl DeviceSyncManifest {
    pub fn manifest_id(device_id: &str, playlist_id: &str) -> String {
        format!("{}-{}", device_id, playlist_id)
    }
}

/// Library track to on-device track id, for database-backed devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DeviceTrackMapping {
    /// `{device_id}-{library_track_id}`
    pub id: String,
    pub device_id: String,
    pub library_track_id: String,
    pub device_track_id: String,
    pub updated_at: i64,
}

impl DeviceTrackMapping {
    pub fn new(
        device_id: impl Into<String>,
        library_track_id: impl Into<String>,
        device_track_id: impl Into<String>,
    ) -> Self {
        let device_id = device_id.into();
        let library_track_id = library_track_id.into();
        Self {
            id: Self::mapping_id(&device_id, &library_track_id),
            device_id,
            library_track_id,
            device_track_id: device_track_id.into(),
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn mapping_id(device_id: &str, library_track_id: &str) -> String {
        format!("{}-{}", device_id, library_track_id)
    }
}
