//! Device sync façade and bootstrap helpers.
//!
//! Re-exports the workspace crates and wires a host's directory handle store,
//! database pool and playlist renderer into a ready-to-use [`DeviceSyncService`].
//! Desktop hosts enable the `desktop` feature (on by default) and call
//! [`bootstrap_desktop`].

pub use bridge_traits;
pub use core_library;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop")]
pub use bridge_desktop;

pub use core_sync::{Result, SyncError};

use core_library::{
    SqliteDeviceProfileRepository, SqliteDeviceSyncManifestRepository,
    SqliteDeviceTrackMappingRepository,
};
use core_runtime::config::DeviceSyncConfig;
use core_sync::{
    DatabaseDeviceSync, DeviceFamilyRegistry, DeviceRegistry, DeviceSyncCoordinator,
    PlaylistExporter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Registry and coordinator sharing one database and configuration.
pub struct DeviceSyncService {
    registry: DeviceRegistry,
    coordinator: DeviceSyncCoordinator,
}

impl DeviceSyncService {
    /// Build the service over an already migrated pool.
    ///
    /// Filesystem devices render through `exporter`. iPod-class devices are
    /// only supported when `database_device` is given.
    pub fn new(
        pool: SqlitePool,
        config: DeviceSyncConfig,
        exporter: Arc<dyn PlaylistExporter>,
        database_device: Option<Arc<dyn DatabaseDeviceSync>>,
    ) -> Self {
        let profiles = Arc::new(SqliteDeviceProfileRepository::new(pool.clone()));
        let manifests = Arc::new(SqliteDeviceSyncManifestRepository::new(pool.clone()));

        let mut families = DeviceFamilyRegistry::with_filesystem_exporter(exporter);
        if let Some(device_sync) = database_device {
            let mappings = Arc::new(SqliteDeviceTrackMappingRepository::new(pool));
            families = families.with_database_device(device_sync, mappings);
        }

        let registry = DeviceRegistry::new(
            profiles.clone(),
            Arc::clone(&config.handle_store),
            Arc::clone(&config.clock),
        );
        let coordinator = DeviceSyncCoordinator::new(config, families, profiles, manifests);

        Self {
            registry,
            coordinator,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &DeviceSyncCoordinator {
        &self.coordinator
    }
}

/// Open the sync database and the desktop handle store, then build the service.
///
/// ```ignore
/// use device_sync::{bootstrap_desktop, core_library::DatabaseConfig};
///
/// # async fn example(exporter: std::sync::Arc<dyn device_sync::core_sync::PlaylistExporter>) -> device_sync::Result<()> {
/// let service = bootstrap_desktop(
///     DatabaseConfig::new("devices.db"),
///     "handles.db".into(),
///     exporter,
/// )
/// .await?;
/// let devices = service.registry().list_devices().await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop")]
pub async fn bootstrap_desktop(
    database: core_library::DatabaseConfig,
    handles_path: std::path::PathBuf,
    exporter: Arc<dyn PlaylistExporter>,
) -> Result<DeviceSyncService> {
    let pool = core_library::create_pool(database).await?;
    let handles = bridge_desktop::SqliteHandleStore::new(handles_path).await?;
    let config = DeviceSyncConfig::builder()
        .handle_store(Arc::new(handles))
        .build()?;

    Ok(DeviceSyncService::new(pool, config, exporter, None))
}
