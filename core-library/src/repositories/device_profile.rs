//! Device profile repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::DeviceProfile;
use async_trait::async_trait;
use sqlx::{query, query_as, FromRow, SqlitePool};

/// Device profile repository interface for data access operations
#[async_trait]
pub trait DeviceProfileRepository: Send + Sync {
    /// Find a device profile by its ID
    ///
    /// # Returns
    /// - `Ok(Some(profile))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<DeviceProfile>>;

    /// Insert a new device profile
    ///
    /// # Errors
    /// Returns error if:
    /// - A profile with the same ID already exists
    /// - Profile validation fails
    /// - Database error occurs
    async fn insert(&self, profile: &DeviceProfile) -> Result<()>;

    /// Update an existing device profile
    ///
    /// # Errors
    /// Returns error if:
    /// - Profile does not exist
    /// - Profile validation fails
    /// - Database error occurs
    async fn update(&self, profile: &DeviceProfile) -> Result<()>;

    /// List all device profiles, oldest first
    async fn list(&self) -> Result<Vec<DeviceProfile>>;

    /// Record a completed sync
    async fn touch_last_sync(&self, id: &str, synced_at: i64) -> Result<()>;

    /// Delete a device profile and everything recorded against it
    ///
    /// # Returns
    /// - `Ok(true)` if the profile was deleted
    /// - `Ok(false)` if the profile was not found
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLite implementation of DeviceProfileRepository
pub struct SqliteDeviceProfileRepository {
    pool: SqlitePool,
}

impl SqliteDeviceProfileRepository {
    /// Create a new SqliteDeviceProfileRepository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a device profile
#[derive(Debug, FromRow)]
struct DeviceProfileRow {
    id: String,
    name: String,
    device_type: String,
    handle_ref: String,
    playlist_folder: String,
    playlist_format: String,
    path_strategy: String,
    absolute_prefix: Option<String>,
    last_sync_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<DeviceProfileRow> for DeviceProfile {
    type Error = LibraryError;

    fn try_from(row: DeviceProfileRow) -> Result<Self> {
        Ok(DeviceProfile {
            id: row.id,
            name: row.name,
            device_type: row.device_type.parse()?,
            handle_ref: row.handle_ref,
            playlist_folder: row.playlist_folder,
            playlist_format: row.playlist_format.parse()?,
            path_strategy: row.path_strategy.parse()?,
            absolute_prefix: row.absolute_prefix,
            last_sync_at: row.last_sync_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn validate(profile: &DeviceProfile) -> Result<()> {
    profile
        .validate()
        .map_err(|e| LibraryError::InvalidInput {
            field: "DeviceProfile".to_string(),
            message: e,
        })
}

#[async_trait]
impl DeviceProfileRepository for SqliteDeviceProfileRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<DeviceProfile>> {
        let row = query_as::<_, DeviceProfileRow>("SELECT * FROM device_profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeviceProfile::try_from).transpose()
    }

    async fn insert(&self, profile: &DeviceProfile) -> Result<()> {
        validate(profile)?;

        query(
            r#"
            INSERT INTO device_profiles (
                id, name, device_type, handle_ref, playlist_folder, playlist_format,
                path_strategy, absolute_prefix, last_sync_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(profile.device_type.as_str())
        .bind(&profile.handle_ref)
        .bind(&profile.playlist_folder)
        .bind(profile.playlist_format.as_str())
        .bind(profile.path_strategy.as_str())
        .bind(&profile.absolute_prefix)
        .bind(profile.last_sync_at)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, profile: &DeviceProfile) -> Result<()> {
        validate(profile)?;

        let result = query(
            r#"
            UPDATE device_profiles
            SET name = ?, device_type = ?, handle_ref = ?, playlist_folder = ?,
                playlist_format = ?, path_strategy = ?, absolute_prefix = ?,
                last_sync_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.name)
        .bind(profile.device_type.as_str())
        .bind(&profile.handle_ref)
        .bind(&profile.playlist_folder)
        .bind(profile.playlist_format.as_str())
        .bind(profile.path_strategy.as_str())
        .bind(&profile.absolute_prefix)
        .bind(profile.last_sync_at)
        .bind(profile.updated_at)
        .bind(&profile.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "DeviceProfile".to_string(),
                id: profile.id.clone(),
            });
        }

        Ok(())
    }

    async fn list(&self) -> Result<Vec<DeviceProfile>> {
        let rows = query_as::<_, DeviceProfileRow>(
            "SELECT * FROM device_profiles ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DeviceProfile::try_from).collect()
    }

    async fn touch_last_sync(&self, id: &str, synced_at: i64) -> Result<()> {
        let result =
            query("UPDATE device_profiles SET last_sync_at = ?, updated_at = ? WHERE id = ?")
                .bind(synced_at)
                .bind(synced_at)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "DeviceProfile".to_string(),
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        // Explicit child deletes keep the cascade even if foreign keys are off.
        query("DELETE FROM device_sync_manifests WHERE device_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        query("DELETE FROM device_track_mappings WHERE device_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = query("DELETE FROM device_profiles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
