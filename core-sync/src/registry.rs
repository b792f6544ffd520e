//! Device registry: the profiles of known devices and their stored folder handles

use crate::{Result, SyncError};
use bridge_traits::{Clock, DirectoryHandleStore};
use core_library::{DeviceProfile, DeviceProfileRepository};
use std::sync::Arc;
use tracing::{info, warn};

pub struct DeviceRegistry {
    profiles: Arc<dyn DeviceProfileRepository>,
    handle_store: Arc<dyn DirectoryHandleStore>,
    clock: Arc<dyn Clock>,
}

impl DeviceRegistry {
    pub fn new(
        profiles: Arc<dyn DeviceProfileRepository>,
        handle_store: Arc<dyn DirectoryHandleStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profiles,
            handle_store,
            clock,
        }
    }

    /// Persist a new device. Timestamps are taken from the clock.
    pub async fn add_device(&self, mut profile: DeviceProfile) -> Result<DeviceProfile> {
        let now = self.clock.unix_timestamp();
        profile.created_at = now;
        profile.updated_at = now;
        profile.last_sync_at = None;

        self.profiles.insert(&profile).await?;
        info!(device_id = %profile.id, device_type = %profile.device_type, "Registered device");
        Ok(profile)
    }

    pub async fn get_device(&self, device_id: &str) -> Result<DeviceProfile> {
        self.profiles
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| SyncError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceProfile>> {
        Ok(self.profiles.list().await?)
    }

    pub async fn update_device(&self, mut profile: DeviceProfile) -> Result<DeviceProfile> {
        profile.updated_at = self.clock.unix_timestamp();
        self.profiles.update(&profile).await?;
        Ok(profile)
    }

    /// Remove a device with its manifests and track mappings, then forget its
    /// folder handle
    pub async fn remove_device(&self, device_id: &str) -> Result<()> {
        let profile = self.get_device(device_id).await?;

        if !self.profiles.delete(device_id).await? {
            return Err(SyncError::DeviceNotFound {
                device_id: device_id.to_string(),
            });
        }

        // The profile is gone either way; a stale handle is harmless
        if let Err(err) = self.handle_store.forget(&profile.handle_ref).await {
            warn!(device_id = %device_id, error = %err, "Failed to forget device handle");
        }

        info!(device_id = %device_id, "Removed device");
        Ok(())
    }
}
