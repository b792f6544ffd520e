//! # External Collaborators
//!
//! Interfaces for the work this crate hands off: rendering playlist files and
//! syncing devices that keep their own track database.

use crate::Result;
use async_trait::async_trait;
use bridge_traits::DeviceDirectory;
use core_library::{
    DeviceProfile, DeviceTrackMapping, PathStrategy, Playlist, PlaylistFormat, TrackLookup,
};
use std::sync::Arc;

/// Where a playlist is going and how its entries are addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistLocationConfig {
    pub playlist_format: PlaylistFormat,
    /// Device-relative folder the file is written into
    pub playlist_folder: String,
    pub path_strategy: PathStrategy,
    /// Prefix used for absolute entries, after inference
    pub absolute_prefix: Option<String>,
}

/// Rendered playlist file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPlaylist {
    pub content: String,
    /// File extension without the dot
    pub extension: String,
}

/// Renders a playlist in one of the supported formats.
///
/// Lookups arrive with their paths already transformed; the exporter writes
/// each `relative_path` verbatim.
pub trait PlaylistExporter: Send + Sync {
    fn export(
        &self,
        playlist: &Playlist,
        lookups: &[TrackLookup],
        location: &PlaylistLocationConfig,
    ) -> Result<ExportedPlaylist>;
}

/// One playlist handed to a database-backed device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSyncTarget {
    pub playlist: Playlist,
    pub lookups: Vec<TrackLookup>,
}

/// Everything a database-backed device sync needs
#[derive(Clone)]
pub struct DatabaseSyncRequest {
    pub profile: DeviceProfile,
    pub directory: Arc<dyn DeviceDirectory>,
    pub targets: Vec<DatabaseSyncTarget>,
    /// Mappings recorded by earlier syncs, so tracks are reused not re-copied
    pub existing_mappings: Vec<DeviceTrackMapping>,
    pub only_reference_existing_tracks: bool,
    pub overwrite_existing_playlist: bool,
}

/// A playlist the device database now holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePlaylistWrite {
    pub playlist_id: String,
    /// Location of the playlist as the device reports it
    pub playlist_path: String,
    /// Library track ids included, in playlist order
    pub track_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseSyncResult {
    pub written: Vec<DatabasePlaylistWrite>,
    /// New or changed library-to-device track ids
    pub track_mappings: Vec<DeviceTrackMapping>,
}

/// Owns the on-device database protocol of iPod-class devices
#[async_trait]
pub trait DatabaseDeviceSync: Send + Sync {
    async fn sync(&self, request: DatabaseSyncRequest) -> Result<DatabaseSyncResult>;
}
