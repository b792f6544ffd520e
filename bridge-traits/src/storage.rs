//! Device Storage Abstractions
//!
//! Provides platform-agnostic traits for reaching a sync target's root folder:
//! a directory handle scoped to the device root, and a store that turns a
//! persisted handle reference back into a live handle.
//!
//! All paths passed to a [`DeviceDirectory`] are device-relative and use `/`
//! as the separator, regardless of host platform.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// Access level requested on a device directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::ReadWrite => "readwrite",
        }
    }
}

/// Outcome of a permission query or request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The host would have to ask the user
    Prompt,
}

/// Directory handle rooted at a device folder
///
/// Abstracts the device root across platforms:
/// - Desktop: a mounted volume or folder accessed through the filesystem
/// - Web: a `FileSystemDirectoryHandle` obtained from a directory picker
/// - Mobile: a storage-access-framework tree URI
///
/// Implementations resolve paths by walking from the root one segment at a
/// time and must never let a path escape the root.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{AccessMode, DeviceDirectory, PermissionState};
///
/// async fn write_list(dir: &dyn DeviceDirectory, body: bytes::Bytes) -> Result<()> {
///     if dir.request_permission(AccessMode::ReadWrite).await? == PermissionState::Granted {
///         dir.create_dir_all("PLAYLISTS").await?;
///         dir.write_file("PLAYLISTS/road-trip.m3u", body).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Display name of the root folder (the volume or folder name)
    fn name(&self) -> &str;

    /// Check the current permission without prompting
    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState>;

    /// Request permission, prompting the user where the host supports it
    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState>;

    /// Get metadata for a file or directory
    ///
    /// Returns `BridgeError::NotFound` when any segment of the path is missing.
    async fn metadata(&self, relative_path: &str) -> Result<FileMetadata>;

    /// Check whether a file or directory exists
    async fn exists(&self, relative_path: &str) -> Result<bool> {
        match self.metadata(relative_path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, relative_path: &str) -> Result<()>;

    /// Read entire file contents into memory
    async fn read_file(&self, relative_path: &str) -> Result<Bytes>;

    /// Write data to a file, replacing any previous contents
    async fn write_file(&self, relative_path: &str, data: Bytes) -> Result<()>;
}

/// Lookup of persisted directory handles
///
/// Device profiles store an opaque handle reference; the store turns it back
/// into a live [`DeviceDirectory`] for the duration of a session.
#[async_trait]
pub trait DirectoryHandleStore: Send + Sync {
    /// Whether this environment can open device directories at all
    ///
    /// Callers check this up front and fail before touching any device.
    fn is_supported(&self) -> bool {
        true
    }

    /// Resolve a stored handle reference
    ///
    /// Returns `Ok(None)` if the reference is unknown.
    async fn resolve(&self, handle_ref: &str) -> Result<Option<Arc<dyn DeviceDirectory>>>;

    /// Drop a stored handle reference
    async fn forget(&self, handle_ref: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    struct MissingEverything;

    #[async_trait]
    impl DeviceDirectory for MissingEverything {
        fn name(&self) -> &str {
            "EMPTY"
        }

        async fn query_permission(&self, _mode: AccessMode) -> Result<PermissionState> {
            Ok(PermissionState::Granted)
        }

        async fn request_permission(&self, _mode: AccessMode) -> Result<PermissionState> {
            Ok(PermissionState::Granted)
        }

        async fn metadata(&self, relative_path: &str) -> Result<FileMetadata> {
            if relative_path == "locked" {
                return Err(BridgeError::PermissionDenied(relative_path.to_string()));
            }
            Err(BridgeError::NotFound {
                path: relative_path.to_string(),
            })
        }

        async fn create_dir_all(&self, _relative_path: &str) -> Result<()> {
            Ok(())
        }

        async fn read_file(&self, relative_path: &str) -> Result<Bytes> {
            Err(BridgeError::NotFound {
                path: relative_path.to_string(),
            })
        }

        async fn write_file(&self, _relative_path: &str, _data: Bytes) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_false() {
        let dir = MissingEverything;
        assert!(!dir.exists("MUSIC/a.mp3").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_propagates_other_errors() {
        let dir = MissingEverything;
        let err = dir.exists("locked").await.unwrap_err();
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_access_mode_str() {
        assert_eq!(AccessMode::ReadWrite.as_str(), "readwrite");
        assert_eq!(AccessMode::Read.as_str(), "read");
    }
}
