use bridge_traits::BridgeError;
use core_library::{DeviceType, LibraryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Permission denied for device folder")]
    PermissionDenied,

    #[error("Device folder handle not found")]
    HandleNotFound,

    #[error("Device folders are not supported in this environment")]
    UnsupportedEnvironment,

    #[error("Device {device_id} not found")]
    DeviceNotFound { device_id: String },

    #[error("No sync support registered for {device_type} devices")]
    UnsupportedDeviceType { device_type: DeviceType },

    #[error("No sync manifest for playlist {playlist_id} on device {device_id}")]
    ManifestNotFound {
        device_id: String,
        playlist_id: String,
    },

    #[error("Playlist export failed: {0}")]
    Export(String),

    #[error("Database-backed device sync failed: {0}")]
    DatabaseDevice(String),

    #[error("Sync of playlist {playlist_id} failed: {source}")]
    TargetFailed {
        playlist_id: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap a per-playlist failure with the playlist it belongs to
    pub fn for_target(playlist_id: impl Into<String>, source: SyncError) -> Self {
        SyncError::TargetFailed {
            playlist_id: playlist_id.into(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
