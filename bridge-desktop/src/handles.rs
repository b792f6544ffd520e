//! Device Handle Storage using SQLite

use crate::filesystem::TokioDeviceDirectory;
use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DeviceDirectory, DirectoryHandleStore},
};
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// SQLite-backed directory handle store
///
/// Maps opaque handle references to mount paths so a device profile can find
/// its folder again after a restart. A resolved handle is a
/// [`TokioDeviceDirectory`] rooted at the stored path.
pub struct SqliteHandleStore {
    pool: SqlitePool,
}

impl SqliteHandleStore {
    /// Create a new handle store with the given database path
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        // Convert path to string, replacing backslashes with forward slashes for SQLite URL
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;
        debug!(path = ?db_path, "Initialized device handle store");

        Ok(Self { pool })
    }

    /// Create an in-memory handle store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // a single connection that never expires, or the table is lost
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to connect to DB: {}", e)))?;

        Self::create_table(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_table(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_handles (
                handle_ref TEXT PRIMARY KEY,
                root_path TEXT NOT NULL,
                display_name TEXT,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }

    /// Remember a mount path under a handle reference
    ///
    /// `display_name` overrides the folder name reported by the handle, for
    /// mounts whose last path component is not the volume label.
    pub async fn register(
        &self,
        handle_ref: &str,
        root_path: PathBuf,
        display_name: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device_handles (handle_ref, root_path, display_name, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(handle_ref) DO UPDATE SET
                root_path = excluded.root_path,
                display_name = excluded.display_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(handle_ref)
        .bind(root_path.to_string_lossy().into_owned())
        .bind(display_name)
        .bind(Self::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to store handle: {}", e)))?;

        debug!(handle_ref = handle_ref, root = ?root_path, "Stored device handle");
        Ok(())
    }
}

#[async_trait]
impl DirectoryHandleStore for SqliteHandleStore {
    async fn resolve(&self, handle_ref: &str) -> Result<Option<Arc<dyn DeviceDirectory>>> {
        let row = sqlx::query("SELECT root_path, display_name FROM device_handles WHERE handle_ref = ?")
            .bind(handle_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to get handle: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let root_path: String = row.get(0);
        let display_name: Option<String> = row.get(1);
        let directory = match display_name {
            Some(name) => TokioDeviceDirectory::with_name(root_path, name),
            None => TokioDeviceDirectory::new(root_path),
        };

        debug!(handle_ref = handle_ref, "Resolved device handle");
        Ok(Some(Arc::new(directory)))
    }

    async fn forget(&self, handle_ref: &str) -> Result<()> {
        sqlx::query("DELETE FROM device_handles WHERE handle_ref = ?")
            .bind(handle_ref)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to delete handle: {}", e))
            })?;

        debug!(handle_ref = handle_ref, "Forgot device handle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_handle_resolves_to_none() {
        let store = SqliteHandleStore::in_memory().await.unwrap();
        assert!(store.resolve("missing").await.unwrap().is_none());
        assert!(store.is_supported());
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let store = SqliteHandleStore::in_memory().await.unwrap();
        store
            .register("walkman", PathBuf::from("/media/user/WALKMAN"), None)
            .await
            .unwrap();

        let handle = store.resolve("walkman").await.unwrap().unwrap();
        assert_eq!(handle.name(), "WALKMAN");
    }

    #[tokio::test]
    async fn test_display_name_override() {
        let store = SqliteHandleStore::in_memory().await.unwrap();
        store
            .register("usb", PathBuf::from("/run/media/sdb1"), Some("MY_USB"))
            .await
            .unwrap();

        let handle = store.resolve("usb").await.unwrap().unwrap();
        assert_eq!(handle.name(), "MY_USB");
    }

    #[tokio::test]
    async fn test_forget() {
        let store = SqliteHandleStore::in_memory().await.unwrap();
        store
            .register("usb", PathBuf::from("/mnt/usb"), None)
            .await
            .unwrap();
        store.forget("usb").await.unwrap();

        assert!(store.resolve("usb").await.unwrap().is_none());
    }
}
