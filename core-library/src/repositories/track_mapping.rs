//! Device track mapping repository
//!
//! Mappings exist only for database-backed devices, where the device assigns
//! its own id to every track it stores.

use crate::error::Result;
use crate::models::DeviceTrackMapping;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

#[async_trait]
pub trait DeviceTrackMappingRepository: Send + Sync {
    /// Insert or replace a single mapping
    async fn upsert(&self, mapping: &DeviceTrackMapping) -> Result<()>;

    /// Insert or replace many mappings in one transaction
    async fn upsert_many(&self, mappings: &[DeviceTrackMapping]) -> Result<()>;

    /// Find the mapping for a library track on a device
    async fn find(
        &self,
        device_id: &str,
        library_track_id: &str,
    ) -> Result<Option<DeviceTrackMapping>>;

    /// All mappings for a device, ordered by library track id
    async fn find_by_device(&self, device_id: &str) -> Result<Vec<DeviceTrackMapping>>;

    /// Remove every mapping for a device
    async fn delete_by_device(&self, device_id: &str) -> Result<u64>;
}

pub struct SqliteDeviceTrackMappingRepository {
    pool: SqlitePool,
}

impl SqliteDeviceTrackMappingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPSERT_SQL: &str = r#"
    INSERT INTO device_track_mappings (
        id, device_id, library_track_id, device_track_id, updated_at
    )
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        device_track_id = excluded.device_track_id,
        updated_at = excluded.updated_at
"#;

#[async_trait]
impl DeviceTrackMappingRepository for SqliteDeviceTrackMappingRepository {
    async fn upsert(&self, mapping: &DeviceTrackMapping) -> Result<()> {
        query(UPSERT_SQL)
            .bind(&mapping.id)
            .bind(&mapping.device_id)
            .bind(&mapping.library_track_id)
            .bind(&mapping.device_track_id)
            .bind(mapping.updated_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn upsert_many(&self, mappings: &[DeviceTrackMapping]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for mapping in mappings {
            query(UPSERT_SQL)
                .bind(&mapping.id)
                .bind(&mapping.device_id)
                .bind(&mapping.library_track_id)
                .bind(&mapping.device_track_id)
                .bind(mapping.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find(
        &self,
        device_id: &str,
        library_track_id: &str,
    ) -> Result<Option<DeviceTrackMapping>> {
        let mapping = query_as::<_, DeviceTrackMapping>(
            "SELECT * FROM device_track_mappings WHERE id = ?",
        )
        .bind(DeviceTrackMapping::mapping_id(device_id, library_track_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    async fn find_by_device(&self, device_id: &str) -> Result<Vec<DeviceTrackMapping>> {
        let mappings = query_as::<_, DeviceTrackMapping>(
            "SELECT * FROM device_track_mappings WHERE device_id = ? ORDER BY library_track_id ASC",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(mappings)
    }

    async fn delete_by_device(&self, device_id: &str) -> Result<u64> {
        let result = query("DELETE FROM device_track_mappings WHERE device_id = ?")
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
