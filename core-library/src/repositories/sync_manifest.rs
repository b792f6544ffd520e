//! Device sync manifest repository

use crate::error::{LibraryError, Result};
use crate::models::DeviceSyncManifest;
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, SqlitePool};

/// Repository for per-device, per-playlist sync records
#[async_trait]
pub trait DeviceSyncManifestRepository: Send + Sync {
    /// Insert or replace the manifest for `(device_id, playlist_id)`
    async fn upsert(&self, manifest: &DeviceSyncManifest) -> Result<()>;

    /// Find the manifest for a playlist on a device
    async fn find(&self, device_id: &str, playlist_id: &str)
        -> Result<Option<DeviceSyncManifest>>;

    /// All manifests recorded for a device, ordered by playlist id
    async fn find_by_device(&self, device_id: &str) -> Result<Vec<DeviceSyncManifest>>;

    /// Remove every manifest for a device, returning how many were removed
    async fn delete_by_device(&self, device_id: &str) -> Result<u64>;
}

/// SQLite implementation of DeviceSyncManifestRepository
pub struct SqliteDeviceSyncManifestRepository {
    pool: SqlitePool,
}

impl SqliteDeviceSyncManifestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ManifestRow {
    id: String,
    device_id: String,
    playlist_id: String,
    playlist_path: String,
    playlist_format: String,
    track_count: i64,
    config_hash: String,
    synced_at: i64,
}

impl TryFrom<ManifestRow> for DeviceSyncManifest {
    type Error = LibraryError;

    fn try_from(row: ManifestRow) -> Result<Self> {
        Ok(DeviceSyncManifest {
            id: row.id,
            device_id: row.device_id,
            playlist_id: row.playlist_id,
            playlist_path: row.playlist_path,
            playlist_format: row.playlist_format.parse()?,
            track_count: row.track_count,
            config_hash: row.config_hash,
            synced_at: row.synced_at,
        })
    }
}

#[async_trait]
impl DeviceSyncManifestRepository for SqliteDeviceSyncManifestRepository {
    async fn upsert(&self, manifest: &DeviceSyncManifest) -> Result<()> {
        if manifest.id != DeviceSyncManifest::manifest_id(&manifest.device_id, &manifest.playlist_id)
        {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: format!(
                    "manifest id must be '{}-{}'",
                    manifest.device_id, manifest.playlist_id
                ),
            });
        }

        query(
            r#"
            INSERT INTO device_sync_manifests (
                id, device_id, playlist_id, playlist_path, playlist_format,
                track_count, config_hash, synced_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                playlist_path = excluded.playlist_path,
                playlist_format = excluded.playlist_format,
                track_count = excluded.track_count,
                config_hash = excluded.config_hash,
                synced_at = excluded.synced_at
            "#,
        )
        .bind(&manifest.id)
        .bind(&manifest.device_id)
        .bind(&manifest.playlist_id)
        .bind(&manifest.playlist_path)
        .bind(manifest.playlist_format.as_str())
        .bind(manifest.track_count)
        .bind(&manifest.config_hash)
        .bind(manifest.synced_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(
        &self,
        device_id: &str,
        playlist_id: &str,
    ) -> Result<Option<DeviceSyncManifest>> {
        let row = query_as::<_, ManifestRow>("SELECT * FROM device_sync_manifests WHERE id = ?")
            .bind(DeviceSyncManifest::manifest_id(device_id, playlist_id))
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeviceSyncManifest::try_from).transpose()
    }

    async fn find_by_device(&self, device_id: &str) -> Result<Vec<DeviceSyncManifest>> {
        let rows = query_as::<_, ManifestRow>(
            "SELECT * FROM device_sync_manifests WHERE device_id = ? ORDER BY playlist_id ASC",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeviceSyncManifest::try_from).collect()
    }

    async fn delete_by_device(&self, device_id: &str) -> Result<u64> {
        let result = query("DELETE FROM device_sync_manifests WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
