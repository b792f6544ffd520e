//! SQLite pool for device sync state.
//!
//! One database holds device profiles, sync manifests and iPod track
//! mappings. Opening a pool turns on foreign keys (manifests and mappings
//! cascade from their profile), switches file databases to WAL and applies
//! the embedded migrations.
//!
//! ```rust,ignore
//! let pool = create_pool(DatabaseConfig::new("devices.db")).await?;
//! let profiles = SqliteDeviceProfileRepository::new(pool.clone());
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the device state lives and how many connections may touch it
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: format!("sqlite:{}", database_path.into().display()),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            // each in-memory connection is its own database
            max_connections: 1,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the pool, migrate it and check it answers
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening device sync database"
    );

    let mut options = SqliteConnectOptions::from_str(&config.database_url)?
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(config.busy_timeout);
    if !config.is_in_memory() {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
    if config.is_in_memory() {
        // dropping the last connection would drop the database with it
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        warn!(error = %e, "Failed to open device sync database");
        LibraryError::Database(e)
    })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;
    Ok(pool)
}

/// In-memory pool with migrations applied
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

/// Apply the migrations embedded from `migrations/`
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Device sync migration failed");
        LibraryError::Migration(e.to_string())
    })?;

    debug!("Device sync migrations applied");
    Ok(())
}

pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceProfile, DeviceType};
    use crate::repositories::{DeviceProfileRepository, SqliteDeviceProfileRepository};

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["device_profiles", "device_sync_manifests", "device_track_mappings"] {
            let (count,): (i32,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = create_test_pool().await.unwrap();
        let (enabled,): (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_file_database_uses_wal_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.db");
        let profile = DeviceProfile::new("Walkman", DeviceType::Walkman, "walkman-1");

        {
            let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
            let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
                .fetch_one(&pool)
                .await
                .unwrap();
            assert_eq!(mode.to_lowercase(), "wal");

            SqliteDeviceProfileRepository::new(pool.clone())
                .insert(&profile)
                .await
                .unwrap();
            pool.close().await;
        }

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        let found = SqliteDeviceProfileRepository::new(pool)
            .find_by_id(&profile.id)
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.name), Some("Walkman".to_string()));
    }

    #[test]
    fn test_max_connections_floor() {
        assert_eq!(DatabaseConfig::new("x.db").with_max_connections(0).max_connections, 1);
        assert_eq!(DatabaseConfig::in_memory().max_connections, 1);
    }
}
