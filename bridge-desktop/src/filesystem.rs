//! Device Directory Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{AccessMode, DeviceDirectory, FileMetadata, PermissionState},
};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Tokio-based device directory
///
/// Treats a mounted volume or plain folder as a device root:
/// - `tokio::fs` for async operations
/// - device-relative `/`-separated paths joined one segment at a time
/// - `..` segments rejected so no path can leave the root
pub struct TokioDeviceDirectory {
    root: PathBuf,
    name: String,
}

impl TokioDeviceDirectory {
    /// Create a directory handle for the given root, named after its last component
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { root, name }
    }

    /// Create a directory handle with an explicit display name
    pub fn with_name(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in relative_path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(BridgeError::OperationFailed(format!(
                        "Path escapes device root: {}",
                        relative_path
                    )))
                }
                other => path.push(other),
            }
        }
        Ok(path)
    }

    /// Convert std::io::Error to BridgeError, keeping the device-relative path
    fn map_io_error(relative_path: &str, e: std::io::Error) -> BridgeError {
        match e.kind() {
            ErrorKind::NotFound => BridgeError::NotFound {
                path: relative_path.to_string(),
            },
            ErrorKind::PermissionDenied => {
                BridgeError::PermissionDenied(relative_path.to_string())
            }
            _ => BridgeError::Io(e),
        }
    }
}

#[async_trait]
impl DeviceDirectory for TokioDeviceDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query_permission(&self, mode: AccessMode) -> Result<PermissionState> {
        let metadata = fs::metadata(&self.root)
            .await
            .map_err(|e| Self::map_io_error("", e))?;

        if !metadata.is_dir() {
            return Err(BridgeError::NotFound {
                path: self.root.display().to_string(),
            });
        }

        let state = match mode {
            AccessMode::Read => PermissionState::Granted,
            AccessMode::ReadWrite if metadata.permissions().readonly() => PermissionState::Denied,
            AccessMode::ReadWrite => PermissionState::Granted,
        };
        debug!(root = ?self.root, mode = mode.as_str(), ?state, "Queried device permission");
        Ok(state)
    }

    async fn request_permission(&self, mode: AccessMode) -> Result<PermissionState> {
        // Desktop hosts have no prompt; the answer is whatever the filesystem says.
        self.query_permission(mode).await
    }

    async fn metadata(&self, relative_path: &str) -> Result<FileMetadata> {
        let path = self.resolve(relative_path)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| Self::map_io_error(relative_path, e))?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, relative_path: &str) -> Result<()> {
        let path = self.resolve(relative_path)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| Self::map_io_error(relative_path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, relative_path: &str) -> Result<Bytes> {
        let path = self.resolve(relative_path)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_io_error(relative_path, e))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, relative_path: &str, data: Bytes) -> Result<()> {
        let path = self.resolve(relative_path)?;
        fs::write(&path, data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(relative_path, e))?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }
}
